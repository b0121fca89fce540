//! Bridge host functions for guest modules.
//!
//! Every function is imported from the `env` module, the namespace
//! browser-targeted guests already use for their host plugins:
//! ```wat
//! (import "env" "js_create_string" (func $js_create_string (param i32 i32) (result i32)))
//! ```
//!
//! ## Calling Convention
//!
//! - Handles, sound keys and playback keys are `i32` (unsigned on the host)
//! - Text and bytes cross as `(ptr, len)` pairs into the guest's `memory` export
//! - Booleans are `i32` (0 = false)
//! - Volumes and numeric fields are `f32`
//!
//! A [`BridgeError`] raised inside a call traps the guest: unknown or stale
//! handles, out-of-bounds regions and destination buffers that are too
//! small all fail loudly instead of being papered over.

mod audio;
mod objects;
mod url;

use wasmtime::{Caller, Linker, Memory};

use super::runtime::HostState;
use crate::bridge::Bridge;
use crate::error::{BridgeError, Result};

/// Import module every bridge function is registered under.
pub const IMPORT_MODULE: &str = "env";

/// Names of every function the bridge provides.
pub const BRIDGE_IMPORTS: &[&str] = &[
    // object table
    "js_create_string",
    "js_create_buffer",
    "js_create_object",
    "js_set_field_f32",
    "js_set_field_string",
    "js_unwrap_to_str",
    "js_unwrap_to_buf",
    "js_string_length",
    "js_buf_length",
    "js_free_object",
    "js_have_field",
    "js_field_num",
    "js_field",
    // audio
    "audio_init",
    "audio_add_buffer",
    "audio_play_buffer",
    "audio_source_is_loaded",
    "audio_source_set_volume",
    "audio_source_stop",
    "audio_source_delete",
    "audio_playback_stop",
    "audio_playback_set_volume",
    // page URL
    "quad_url_path",
    "quad_url_param_count",
    "quad_url_get_key",
    "quad_url_get_value",
    "quad_url_link_open",
    "quad_url_set_program_parameter",
    "quad_url_delete_program_parameter",
    "quad_url_get_hash",
    "quad_url_set_hash",
    "miniquad_parameters_param_count",
    "miniquad_parameters_get_key",
    "miniquad_parameters_get_value",
];

/// Bridge host functions exposed to guest modules.
///
/// Marker struct for organizing host function registration; all state
/// lives in the store's [`HostState`].
pub struct BridgeHostFunctions;

impl BridgeHostFunctions {
    /// Register every bridge function with the wasmtime linker.
    pub fn register(linker: &mut Linker<HostState>) -> Result<()> {
        objects::register(linker)?;
        audio::register(linker)?;
        url::register(linker)?;
        Ok(())
    }
}

/// Wrap a linker definition failure.
fn link_error(name: &str, e: impl std::fmt::Display) -> BridgeError {
    BridgeError::WasmError(format!("failed to register {}: {}", name, e))
}

/// Get the memory export from the caller.
fn get_memory(caller: &mut Caller<'_, HostState>) -> Result<Memory> {
    caller
        .get_export("memory")
        .and_then(|e| e.into_memory())
        .ok_or_else(|| BridgeError::WasmError("no memory export found".to_string()))
}

/// Run `f` with the guest's linear memory and its bridge borrowed together.
fn with_memory<R>(
    caller: &mut Caller<'_, HostState>,
    f: impl FnOnce(&mut [u8], &mut Bridge) -> Result<R>,
) -> Result<R> {
    let memory = get_memory(caller)?;
    let (mem, state) = memory.data_and_store_mut(&mut *caller);
    f(mem, &mut state.bridge)
}

/// The caller's bridge.
fn bridge<'a>(caller: &'a mut Caller<'_, HostState>) -> &'a mut Bridge {
    &mut caller.data_mut().bridge
}
