//! Quadhost Command-Line Interface
//!
//! Runs browser-targeted WebAssembly games headless:
//! - Running a guest's entry point and frame loop against the bridge
//! - Inspecting which bridge functions a module imports
//! - Listing every function the bridge provides

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use quadhost_bridge::wasm::{BRIDGE_IMPORTS, IMPORT_MODULE};
use quadhost_bridge::{Bridge, GuestInstance, HeadlessAudio, HostConfig, QuadHost};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "quadhost")]
#[command(author, version, about = "Headless host for sandboxed WebAssembly games", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a guest module headless and report the bridge state
    Run {
        /// Guest module (.wasm or .wat)
        module: PathBuf,

        /// Page URL the guest starts at
        #[arg(long)]
        url: Option<String>,

        /// Entry point called once before the frame loop
        #[arg(long, default_value = "main")]
        entry: String,

        /// Export called once per frame
        #[arg(long, default_value = "frame")]
        frame_export: String,

        /// Number of frames to run
        #[arg(long, default_value = "60")]
        frames: usize,

        /// Fuel limit for the guest store
        #[arg(long)]
        fuel: Option<u64>,

        /// JSON host configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show a module's exports and bridge imports
    Inspect {
        /// Guest module (.wasm or .wat)
        module: PathBuf,
    },

    /// List every function the bridge provides
    Imports,
}

fn load_config(path: Option<&PathBuf>) -> Result<HostConfig> {
    match path {
        Some(path) => HostConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(HostConfig::default()),
    }
}

fn cmd_run(
    module: PathBuf,
    url: Option<String>,
    entry: String,
    frame_export: String,
    frames: usize,
    fuel: Option<u64>,
    config: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config.as_ref())?;
    if let Some(url) = url {
        config.bridge.initial_url = url;
    }
    if let Some(fuel) = fuel {
        config.wasm.fuel_limit = Some(fuel);
    }

    let host = QuadHost::new(config.wasm.clone()).context("Failed to create host")?;
    let guest_module = host
        .load_module(&module)
        .with_context(|| format!("Failed to load {}", module.display()))?;

    let unknown = guest_module.unknown_imports();
    if !unknown.is_empty() {
        bail!(
            "{} imports functions the bridge does not provide: {}",
            guest_module.name(),
            unknown.join(", ")
        );
    }

    let audio = HeadlessAudio::new();
    let bridge = Bridge::new(config.bridge.clone(), Box::new(audio.clone()))
        .context("Failed to create bridge")?;
    let mut guest = host
        .instantiate(&guest_module, bridge)
        .context("Failed to instantiate guest")?;

    println!("=== Quadhost Run ===");
    println!();
    println!("Module:            {}", guest_module.name());
    println!("Start URL:         {}", config.bridge.initial_url);

    let has_export = |name: &str| guest_module.exports().any(|e| e == name);

    if has_export(entry.as_str()) {
        let result = guest
            .call_entry(&entry)
            .with_context(|| format!("Entry point '{}' failed", entry))?;
        info!(entry = entry.as_str(), us = result.execution_time_us, "entry point returned");
        println!("Entry:             {} ({} us)", entry, result.execution_time_us);
    } else {
        warn!(entry = entry.as_str(), "entry point not exported, skipping");
    }

    if has_export(frame_export.as_str()) && frames > 0 {
        let stats = guest
            .run_frames(&frame_export, frames)
            .with_context(|| format!("Frame loop '{}' failed", frame_export))?;
        println!("Frames:            {}", stats.summary());
    } else {
        warn!(export = frame_export.as_str(), "frame loop skipped");
        guest.pump_events();
    }

    print_report(&guest, &audio);

    guest.shutdown();
    Ok(())
}

fn print_report(guest: &GuestInstance, audio: &HeadlessAudio) {
    let bridge = guest.bridge();
    let page = bridge.page();

    if let Some(fuel) = guest.remaining_fuel() {
        println!("Remaining fuel:    {}", fuel);
    }
    println!();
    println!("Objects:");
    println!("  Live handles:    {}", bridge.objects().len());
    println!();
    println!("Audio:");
    println!("  Initialized:     {}", bridge.audio().is_initialized());
    println!("  Slots:           {}", bridge.audio().slots().len());
    println!("  Active:          {}", bridge.audio().active_playbacks());
    println!("  Voices playing:  {}", audio.playing_count());
    println!();
    println!("Page:");
    println!("  Final URL:       {}", page.href());
    println!("  History entries: {}", page.history().len());
    if page.link_requests().is_empty() {
        println!("  Link requests:   none");
    } else {
        println!("  Link requests:");
        for request in page.link_requests() {
            println!("    {:?} {}", request.target, request.url);
        }
    }
}

fn cmd_inspect(module: PathBuf) -> Result<()> {
    let host = QuadHost::new(Default::default()).context("Failed to create host")?;
    let guest_module = host
        .load_module(&module)
        .with_context(|| format!("Failed to load {}", module.display()))?;

    println!("=== Module {} ===", guest_module.name());
    println!();
    println!("Exports:");
    for name in guest_module.exports() {
        println!("  {}", name);
    }

    let bridge_imports = guest_module.bridge_imports();
    println!();
    println!("Bridge imports ({}/{}):", bridge_imports.len(), BRIDGE_IMPORTS.len());
    for name in &bridge_imports {
        println!("  {}", name);
    }

    let unknown = guest_module.unknown_imports();
    if !unknown.is_empty() {
        println!();
        println!("Unknown '{}' imports (instantiation will fail):", IMPORT_MODULE);
        for name in &unknown {
            println!("  {}", name);
        }
    }

    Ok(())
}

fn cmd_imports() -> Result<()> {
    println!("=== Bridge Imports (module '{}') ===", IMPORT_MODULE);
    println!();
    println!("{:<36} {:<10}", "Function", "Plugin");
    for name in BRIDGE_IMPORTS {
        let plugin = if name.starts_with("js_") {
            "objects"
        } else if name.starts_with("audio_") {
            "audio"
        } else {
            "url"
        };
        println!("{:<36} {:<10}", name, plugin);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            module,
            url,
            entry,
            frame_export,
            frames,
            fuel,
            config,
        } => cmd_run(module, url, entry, frame_export, frames, fuel, config),

        Commands::Inspect { module } => cmd_inspect(module),

        Commands::Imports => cmd_imports(),
    }
}
