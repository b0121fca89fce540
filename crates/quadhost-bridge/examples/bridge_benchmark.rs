//! Bridge Call Benchmarks
//!
//! Run with: cargo run -p quadhost-bridge --example bridge_benchmark --release

use quadhost_bridge::{Bridge, BridgeConfig, FrameStats, GuestInstance, QuadHost, WasmConfig};
use std::time::Instant;

const GUEST_WAT: &str = r#"
(module
  (import "env" "js_create_string" (func $create_string (param i32 i32) (result i32)))
  (import "env" "js_free_object" (func $free_object (param i32)))
  (import "env" "audio_init" (func $audio_init))
  (import "env" "audio_add_buffer" (func $audio_add_buffer (param i32 i32) (result i32)))
  (import "env" "audio_play_buffer" (func $audio_play_buffer (param i32 f32 i32) (result i32)))
  (import "env" "audio_playback_stop" (func $audio_playback_stop (param i32)))
  (import "env" "quad_url_get_hash" (func $get_hash (result i32)))

  (memory (export "memory") 1)
  (data (i32.const 16) "player-one")
  (data (i32.const 64) "RIFFdata")

  (func (export "main") (result i32)
    (call $audio_init)
    (call $audio_add_buffer (i32.const 64) (i32.const 8)))

  ;; allocate and release one string
  (func (export "string_frame")
    (call $free_object (call $create_string (i32.const 16) (i32.const 10))))

  ;; start and stop one playback of sound 1
  (func (export "audio_frame")
    (call $audio_playback_stop
      (call $audio_play_buffer (i32.const 1) (f32.const 1.0) (i32.const 0))))

  ;; read and release the hash
  (func (export "url_frame")
    (call $free_object (call $get_hash)))

  (func (export "empty_frame"))
)
"#;

fn main() {
    println!("=== Bridge Benchmarks ===\n");

    bench_module_loading();
    bench_instantiation();
    bench_frames();
    bench_memory_operations();

    println!("\n=== Benchmark Complete ===");
}

fn new_guest(host: &QuadHost) -> GuestInstance {
    let module = host.load_module_bytes("bench", GUEST_WAT).unwrap();
    let bridge = Bridge::headless(BridgeConfig::default().initial_url("http://localhost/#menu")).unwrap();
    host.instantiate(&module, bridge).unwrap()
}

fn bench_module_loading() {
    println!("## Module Loading");

    let host = QuadHost::new(WasmConfig::default()).unwrap();
    let _ = host.load_module_bytes("bench", GUEST_WAT).unwrap();

    let mut stats = FrameStats::new();
    for _ in 0..100 {
        let start = Instant::now();
        let _ = host.load_module_bytes("bench", GUEST_WAT).unwrap();
        stats.record(start.elapsed().as_micros() as u64);
    }

    println!("  load_module_bytes: {}", stats.summary());
    println!();
}

fn bench_instantiation() {
    println!("## Instantiation");

    let host = QuadHost::new(WasmConfig::default()).unwrap();
    let module = host.load_module_bytes("bench", GUEST_WAT).unwrap();

    let mut stats = FrameStats::new();
    for _ in 0..100 {
        let bridge = Bridge::headless(BridgeConfig::default()).unwrap();
        let start = Instant::now();
        let _ = host.instantiate(&module, bridge).unwrap();
        stats.record(start.elapsed().as_micros() as u64);
    }

    println!("  instantiate: {}", stats.summary());
    println!();
}

fn bench_frames() {
    println!("## Frame Call Overhead");

    let host = QuadHost::new(WasmConfig::default()).unwrap();
    let mut guest = new_guest(&host);
    guest.call::<(), i32>("main", ()).unwrap();

    let frames = 10_000;
    for export in ["empty_frame", "string_frame", "audio_frame", "url_frame"] {
        // warm up
        guest.run_frames(export, 100).unwrap();

        let stats = guest.run_frames(export, frames).unwrap();
        println!("  {:<14} {}", export, stats.summary());
    }

    let bridge = guest.bridge();
    println!();
    println!("  live handles after run: {}", bridge.objects().len());
    println!("  audio slots after run:  {}", bridge.audio().slots().len());
    println!();
}

fn bench_memory_operations() {
    println!("## Memory Operations");

    let host = QuadHost::new(WasmConfig::default()).unwrap();
    let mut guest = new_guest(&host);

    let iterations = 1000;
    let data: Vec<u8> = (0..4096).map(|i| (i % 256) as u8).collect();

    let mut write_times = Vec::new();
    let mut read_times = Vec::new();

    for _ in 0..iterations {
        let start = Instant::now();
        guest.write_memory(1024, &data).unwrap();
        write_times.push(start.elapsed().as_nanos() as u64);

        let start = Instant::now();
        let _ = guest.read_memory(1024, 4096).unwrap();
        read_times.push(start.elapsed().as_nanos() as u64);
    }

    let write_mean = write_times.iter().sum::<u64>() as f64 / write_times.len() as f64;
    let read_mean = read_times.iter().sum::<u64>() as f64 / read_times.len() as f64;

    println!("  write_memory(4096):       mean={:.0}ns ({:.1} MB/s)",
             write_mean, 4096.0 / write_mean * 1000.0);
    println!("  read_memory(4096):        mean={:.0}ns ({:.1} MB/s)",
             read_mean, 4096.0 / read_mean * 1000.0);
}
