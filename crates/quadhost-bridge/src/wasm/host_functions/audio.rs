//! Audio functions (`audio_*`).

use wasmtime::{Caller, Linker};

use super::{bridge, link_error, with_memory, IMPORT_MODULE};
use crate::audio::{PlaybackKey, SoundKey};
use crate::error::Result;
use crate::marshal;
use crate::wasm::runtime::HostState;

pub(super) fn register(linker: &mut Linker<HostState>) -> Result<()> {
    linker
        .func_wrap(
            IMPORT_MODULE,
            "audio_init",
            |mut caller: Caller<'_, HostState>| -> wasmtime::Result<()> {
                bridge(&mut caller).audio_mut().init()?;
                Ok(())
            },
        )
        .map_err(|e| link_error("audio_init", e))?;

    // Returns the sound key before decoding finishes.
    linker
        .func_wrap(
            IMPORT_MODULE,
            "audio_add_buffer",
            |mut caller: Caller<'_, HostState>, content: u32, len: u32| -> wasmtime::Result<u32> {
                let key = with_memory(&mut caller, |mem, bridge| {
                    let data = marshal::clone_bytes_from(mem, content, len)?;
                    bridge.audio_mut().register_sound(data)
                })?;
                Ok(key.0)
            },
        )
        .map_err(|e| link_error("audio_add_buffer", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "audio_play_buffer",
            |mut caller: Caller<'_, HostState>,
             sound: u32,
             volume: f32,
             repeat: i32|
             -> wasmtime::Result<u32> {
                let playback = bridge(&mut caller)
                    .audio_mut()
                    .play(SoundKey(sound), volume, repeat != 0)?;
                Ok(playback.0)
            },
        )
        .map_err(|e| link_error("audio_play_buffer", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "audio_source_is_loaded",
            |mut caller: Caller<'_, HostState>, sound: u32| -> i32 {
                i32::from(bridge(&mut caller).audio_mut().is_ready(SoundKey(sound)))
            },
        )
        .map_err(|e| link_error("audio_source_is_loaded", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "audio_source_set_volume",
            |mut caller: Caller<'_, HostState>, sound: u32, volume: f32| {
                bridge(&mut caller)
                    .audio_mut()
                    .set_volume(SoundKey(sound), volume);
            },
        )
        .map_err(|e| link_error("audio_source_set_volume", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "audio_source_stop",
            |mut caller: Caller<'_, HostState>, sound: u32| {
                bridge(&mut caller).audio_mut().stop_all(SoundKey(sound));
            },
        )
        .map_err(|e| link_error("audio_source_stop", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "audio_source_delete",
            |mut caller: Caller<'_, HostState>, sound: u32| {
                bridge(&mut caller).audio_mut().delete_sound(SoundKey(sound));
            },
        )
        .map_err(|e| link_error("audio_source_delete", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "audio_playback_stop",
            |mut caller: Caller<'_, HostState>, playback: u32| {
                bridge(&mut caller).audio_mut().stop(PlaybackKey(playback));
            },
        )
        .map_err(|e| link_error("audio_playback_stop", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "audio_playback_set_volume",
            |mut caller: Caller<'_, HostState>, playback: u32, volume: f32| {
                bridge(&mut caller)
                    .audio_mut()
                    .set_playback_volume(PlaybackKey(playback), volume);
            },
        )
        .map_err(|e| link_error("audio_playback_set_volume", e))?;

    Ok(())
}
