//! Guest hosting on wasmtime.
//!
//! This module loads a browser-targeted guest module, links the bridge
//! functions it imports from `env`, and drives its exports the way a page
//! would: an entry call at startup, then one call per frame.
//!
//! ## Host Model
//!
//! - **One bridge per guest**: each [`GuestInstance`] owns its [`Bridge`](crate::Bridge)
//! - **Single-threaded**: host functions run synchronously on the calling thread
//! - **Cooperative events**: audio completions apply between frames, never mid-call
//! - **Loud failures**: misuse of a handle or buffer traps the guest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quadhost_bridge::{Bridge, BridgeConfig};
//! use quadhost_bridge::wasm::{QuadHost, WasmConfig};
//!
//! let host = QuadHost::new(WasmConfig::default())?;
//! let module = host.load_module("game.wasm")?;
//! let bridge = Bridge::headless(BridgeConfig::default())?;
//! let mut guest = host.instantiate(&module, bridge)?;
//!
//! guest.call_entry("main")?;
//! let stats = guest.run_frames("frame", 60)?;
//! println!("{}", stats.summary());
//! ```

mod config;
mod host_functions;
mod runtime;

pub use config::{HostConfig, WasiCapabilities, WasmConfig};
pub use host_functions::{BRIDGE_IMPORTS, IMPORT_MODULE};
pub use runtime::{CallResult, FrameStats, GuestInstance, GuestModule, HostState, QuadHost};

#[cfg(test)]
mod tests;
