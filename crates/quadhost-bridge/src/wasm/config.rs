//! Runtime and host configuration.
//!
//! A [`HostConfig`] is what `quadhost run --config` reads: engine and store
//! limits under `wasm`, page and object behaviour under `bridge`. Every
//! field is optional in JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::bridge::BridgeConfig;
use crate::error::{BridgeError, Result};

/// Standard streams a guest may inherit from the host process.
///
/// Only guests built for `wasm32-wasip1` write to these; browser-targeted
/// guests talk to the page through the bridge imports instead. Nothing is
/// inherited unless enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WasiCapabilities {
    /// Guest reads host stdin
    pub stdin: bool,

    /// Guest writes reach host stdout
    pub stdout: bool,

    /// Guest writes reach host stderr
    pub stderr: bool,
}

impl WasiCapabilities {
    /// No streams.
    pub fn none() -> Self {
        Self::default()
    }

    /// Output streams only, so guest `println!`/`eprintln!` show up.
    pub fn console() -> Self {
        Self {
            stdout: true,
            stderr: true,
            ..Self::none()
        }
    }

    /// Builder: inherit stdin
    pub fn stdin(mut self, allow: bool) -> Self {
        self.stdin = allow;
        self
    }

    /// Builder: inherit stdout
    pub fn stdout(mut self, allow: bool) -> Self {
        self.stdout = allow;
        self
    }

    /// Builder: inherit stderr
    pub fn stderr(mut self, allow: bool) -> Self {
        self.stderr = allow;
        self
    }
}

/// Engine and store settings for guests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WasmConfig {
    /// Streams the guest inherits
    pub capabilities: WasiCapabilities,

    /// Linear memory ceiling per guest, in bytes
    pub max_memory: usize,

    /// Fuel per guest store; `None` disables metering
    pub fuel_limit: Option<u64>,

    /// Cranelift optimization level, 0 to 2
    pub optimization_level: u8,

    /// Accept modules using the SIMD proposal
    pub enable_simd: bool,
}

impl Default for WasmConfig {
    fn default() -> Self {
        Self {
            capabilities: WasiCapabilities::console(),
            max_memory: 256 * 1024 * 1024,
            fuel_limit: None,
            optimization_level: 2,
            enable_simd: true,
        }
    }
}

impl WasmConfig {
    /// Tight limits for untrusted guests: 64 MB, metered, no streams.
    pub fn minimal() -> Self {
        Self {
            capabilities: WasiCapabilities::none(),
            max_memory: 64 * 1024 * 1024,
            fuel_limit: Some(1_000_000_000),
            ..Self::default()
        }
    }

    /// Fast compiles and every stream, for iterating on a guest.
    pub fn development() -> Self {
        Self {
            capabilities: WasiCapabilities::console().stdin(true),
            optimization_level: 0,
            ..Self::default()
        }
    }

    /// Builder: set streams
    pub fn capabilities(mut self, caps: WasiCapabilities) -> Self {
        self.capabilities = caps;
        self
    }

    /// Builder: set memory ceiling
    pub fn max_memory(mut self, bytes: usize) -> Self {
        self.max_memory = bytes;
        self
    }

    /// Builder: meter with `fuel`
    pub fn fuel_limit(mut self, fuel: u64) -> Self {
        self.fuel_limit = Some(fuel);
        self
    }

    /// Builder: toggle SIMD
    pub fn simd(mut self, enable: bool) -> Self {
        self.enable_simd = enable;
        self
    }

    /// Builder: set optimization level, clamped to 2
    pub fn optimize(mut self, level: u8) -> Self {
        self.optimization_level = level.min(2);
        self
    }
}

/// Complete host configuration: runtime plus bridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Engine and store settings
    pub wasm: WasmConfig,

    /// Bridge settings
    pub bridge: BridgeConfig,
}

impl HostConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            BridgeError::ConfigError(format!("{}: {}", path.display(), e))
        })
    }
}
