//! Object table functions (`js_*`).

use wasmtime::{Caller, Linker};

use super::{bridge, link_error, with_memory, IMPORT_MODULE};
use crate::error::{BridgeError, Result};
use crate::marshal;
use crate::objects::{Handle, HostValue};
use crate::wasm::runtime::HostState;

pub(super) fn register(linker: &mut Linker<HostState>) -> Result<()> {
    linker
        .func_wrap(
            IMPORT_MODULE,
            "js_create_string",
            |mut caller: Caller<'_, HostState>, buf: u32, max_len: u32| -> wasmtime::Result<u32> {
                let handle = with_memory(&mut caller, |mem, bridge| {
                    bridge.create_text_from(mem, buf, max_len)
                })?;
                Ok(handle.raw())
            },
        )
        .map_err(|e| link_error("js_create_string", e))?;

    // Copies the bytes; the guest may reuse its buffer right after the call.
    linker
        .func_wrap(
            IMPORT_MODULE,
            "js_create_buffer",
            |mut caller: Caller<'_, HostState>, buf: u32, len: u32| -> wasmtime::Result<u32> {
                let handle = with_memory(&mut caller, |mem, bridge| {
                    bridge.clone_bytes_from(mem, buf, len)
                })?;
                Ok(handle.raw())
            },
        )
        .map_err(|e| link_error("js_create_buffer", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "js_create_object",
            |mut caller: Caller<'_, HostState>| -> wasmtime::Result<u32> {
                let handle = bridge(&mut caller)
                    .objects_mut()
                    .create(HostValue::record())?;
                Ok(handle.raw())
            },
        )
        .map_err(|e| link_error("js_create_object", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "js_set_field_f32",
            |mut caller: Caller<'_, HostState>,
             object: u32,
             buf: u32,
             max_len: u32,
             data: f32|
             -> wasmtime::Result<()> {
                with_memory(&mut caller, |mem, bridge| {
                    let field = marshal::decode_text(mem, buf, max_len)?;
                    bridge.objects_mut().set_field(Handle(object), &field, data)
                })?;
                Ok(())
            },
        )
        .map_err(|e| link_error("js_set_field_f32", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "js_set_field_string",
            |mut caller: Caller<'_, HostState>,
             object: u32,
             buf: u32,
             max_len: u32,
             data_buf: u32,
             data_len: u32|
             -> wasmtime::Result<()> {
                with_memory(&mut caller, |mem, bridge| {
                    let field = marshal::decode_text(mem, buf, max_len)?;
                    let data = marshal::decode_text(mem, data_buf, data_len)?;
                    bridge.objects_mut().set_field(Handle(object), &field, data)
                })?;
                Ok(())
            },
        )
        .map_err(|e| link_error("js_set_field_string", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "js_unwrap_to_str",
            |mut caller: Caller<'_, HostState>,
             object: u32,
             buf: u32,
             max_len: u32|
             -> wasmtime::Result<()> {
                with_memory(&mut caller, |mem, bridge| {
                    let text = bridge.objects().get_str(Handle(object))?;
                    marshal::encode_text_into(mem, text, buf, max_len)
                })?;
                Ok(())
            },
        )
        .map_err(|e| link_error("js_unwrap_to_str", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "js_unwrap_to_buf",
            |mut caller: Caller<'_, HostState>,
             object: u32,
             buf: u32,
             max_len: u32|
             -> wasmtime::Result<()> {
                with_memory(&mut caller, |mem, bridge| {
                    let bytes = bridge.objects().get_bytes(Handle(object))?;
                    marshal::copy_bytes_into(mem, bytes, buf, max_len)
                })?;
                Ok(())
            },
        )
        .map_err(|e| link_error("js_unwrap_to_buf", e))?;

    // UTF-8 byte length, the size the guest must allocate for js_unwrap_to_str
    linker
        .func_wrap(
            IMPORT_MODULE,
            "js_string_length",
            |mut caller: Caller<'_, HostState>, object: u32| -> wasmtime::Result<u32> {
                let text = bridge(&mut caller).objects().get_str(Handle(object))?;
                Ok(text.len() as u32)
            },
        )
        .map_err(|e| link_error("js_string_length", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "js_buf_length",
            |mut caller: Caller<'_, HostState>, object: u32| -> wasmtime::Result<u32> {
                let bytes = bridge(&mut caller).objects().get_bytes(Handle(object))?;
                Ok(bytes.len() as u32)
            },
        )
        .map_err(|e| link_error("js_buf_length", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "js_free_object",
            |mut caller: Caller<'_, HostState>, object: u32| -> wasmtime::Result<()> {
                bridge(&mut caller).objects_mut().release(Handle(object))?;
                Ok(())
            },
        )
        .map_err(|e| link_error("js_free_object", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "js_have_field",
            |mut caller: Caller<'_, HostState>,
             object: u32,
             buf: u32,
             len: u32|
             -> wasmtime::Result<i32> {
                let present = with_memory(&mut caller, |mem, bridge| {
                    let field = marshal::decode_text(mem, buf, len)?;
                    bridge.have_field(Handle(object), &field)
                })?;
                Ok(i32::from(present))
            },
        )
        .map_err(|e| link_error("js_have_field", e))?;

    // Missing or non-numeric fields read as NaN.
    linker
        .func_wrap(
            IMPORT_MODULE,
            "js_field_num",
            |mut caller: Caller<'_, HostState>,
             object: u32,
             buf: u32,
             len: u32|
             -> wasmtime::Result<f32> {
                let value = with_memory(&mut caller, |mem, bridge| {
                    let field = marshal::decode_text(mem, buf, len)?;
                    match bridge.objects().get_field(Handle(object), &field) {
                        Ok(value) => Ok(value.as_f32()),
                        Err(BridgeError::MissingField { .. }) => Ok(f32::NAN),
                        Err(e) => Err(e),
                    }
                })?;
                Ok(value)
            },
        )
        .map_err(|e| link_error("js_field_num", e))?;

    // Registers a copy of the field value under a new handle.
    linker
        .func_wrap(
            IMPORT_MODULE,
            "js_field",
            |mut caller: Caller<'_, HostState>,
             object: u32,
             buf: u32,
             len: u32|
             -> wasmtime::Result<u32> {
                let handle = with_memory(&mut caller, |mem, bridge| {
                    let field = marshal::decode_text(mem, buf, len)?;
                    let value = bridge.objects().get_field(Handle(object), &field)?.clone();
                    bridge.objects_mut().create(value)
                })?;
                Ok(handle.raw())
            },
        )
        .map_err(|e| link_error("js_field", e))?;

    Ok(())
}
