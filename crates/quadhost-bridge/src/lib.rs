//! # Quadhost Bridge
//!
//! Host-side bridge plugins for browser-targeted WebAssembly games.
//!
//! A sandboxed guest cannot hold host values directly, so everything it
//! touches on the host side crosses through small integer keys:
//!
//! | Plugin | Import prefix | Keys |
//! |--------|---------------|------|
//! | Object table | `js_*` | object handles |
//! | Audio | `audio_*` | sound keys, playback keys |
//! | Page URL | `quad_url_*`, `miniquad_parameters_*` | object handles for text |
//!
//! Text and bytes are copied across the boundary through `(ptr, len)`
//! regions of the guest's linear memory; see [`marshal`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quadhost_bridge::{Bridge, BridgeConfig};
//! use quadhost_bridge::wasm::{QuadHost, WasmConfig};
//!
//! let host = QuadHost::new(WasmConfig::default())?;
//! let module = host.load_module("game.wasm")?;
//! let bridge = Bridge::headless(
//!     BridgeConfig::default().initial_url("https://example.com/play?level=2"),
//! )?;
//! let mut guest = host.instantiate(&module, bridge)?;
//! guest.call_entry("main")?;
//! guest.run_frames("frame", 600)?;
//! ```
//!
//! The plugins also work without a wasm runtime: [`Bridge`] exposes the
//! same operations to native callers and tests.
//!
//! ## Features
//!
//! - `wasm` - wasmtime guest runtime and host function linking (default)

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod audio;
pub mod bridge;
pub mod error;
pub mod marshal;
pub mod objects;
pub mod page;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export main types
pub use audio::{AudioBackend, AudioBridge, HeadlessAudio, PlaybackKey, SoundKey, SoundState};
pub use bridge::{Bridge, BridgeConfig};
pub use error::{BridgeError, Result};
pub use objects::{Handle, HostValue, ObjectTable, Record};
pub use page::{LinkRequest, LinkTarget, PageBridge};

#[cfg(feature = "wasm")]
pub use wasm::{
    CallResult, FrameStats, GuestInstance, GuestModule, HostConfig, QuadHost, WasiCapabilities,
    WasmConfig,
};
