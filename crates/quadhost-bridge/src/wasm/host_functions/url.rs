//! Page URL functions (`quad_url_*`, `miniquad_parameters_*`).
//!
//! Text results are returned as new object handles; text arguments are
//! object handles holding strings.

use wasmtime::{Caller, Linker};

use super::{bridge, link_error, IMPORT_MODULE};
use crate::bridge::Bridge;
use crate::error::Result;
use crate::objects::Handle;
use crate::page::LinkTarget;
use crate::wasm::runtime::HostState;

/// Register `text` and return its raw handle.
fn text_handle(bridge: &mut Bridge, text: String) -> Result<u32> {
    Ok(bridge.objects_mut().create(text)?.raw())
}

/// Owned copy of the string behind a guest-supplied handle.
fn string_arg(bridge: &Bridge, handle: u32) -> Result<String> {
    Ok(bridge.objects().get_str(Handle(handle))?.to_string())
}

pub(super) fn register(linker: &mut Linker<HostState>) -> Result<()> {
    linker
        .func_wrap(
            IMPORT_MODULE,
            "quad_url_path",
            |mut caller: Caller<'_, HostState>, full: i32| -> wasmtime::Result<u32> {
                let bridge = bridge(&mut caller);
                let path = bridge.page().path(full == 1);
                Ok(text_handle(bridge, path)?)
            },
        )
        .map_err(|e| link_error("quad_url_path", e))?;

    // Snapshots the query; get_key/get_value index that snapshot.
    linker
        .func_wrap(
            IMPORT_MODULE,
            "quad_url_param_count",
            |mut caller: Caller<'_, HostState>| -> i32 {
                bridge(&mut caller).page_mut().snapshot_query() as i32
            },
        )
        .map_err(|e| link_error("quad_url_param_count", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "quad_url_get_key",
            |mut caller: Caller<'_, HostState>, index: i32| -> wasmtime::Result<u32> {
                let bridge = bridge(&mut caller);
                let key = bridge.page().query_key(index)?.to_string();
                Ok(text_handle(bridge, key)?)
            },
        )
        .map_err(|e| link_error("quad_url_get_key", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "quad_url_get_value",
            |mut caller: Caller<'_, HostState>, index: i32| -> wasmtime::Result<u32> {
                let bridge = bridge(&mut caller);
                let value = bridge.page().query_value(index)?.to_string();
                Ok(text_handle(bridge, value)?)
            },
        )
        .map_err(|e| link_error("quad_url_get_value", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "quad_url_link_open",
            |mut caller: Caller<'_, HostState>, url: u32, new_tab: i32| -> wasmtime::Result<()> {
                let bridge = bridge(&mut caller);
                let url = string_arg(bridge, url)?;
                let target = if new_tab == 0 {
                    LinkTarget::SameTab
                } else {
                    LinkTarget::NewTab
                };
                bridge.page_mut().open_link(&url, target);
                Ok(())
            },
        )
        .map_err(|e| link_error("quad_url_link_open", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "quad_url_set_program_parameter",
            |mut caller: Caller<'_, HostState>, name: u32, value: u32| -> wasmtime::Result<()> {
                let bridge = bridge(&mut caller);
                let name = string_arg(bridge, name)?;
                let value = string_arg(bridge, value)?;
                bridge.page_mut().set_query_param(&name, &value);
                Ok(())
            },
        )
        .map_err(|e| link_error("quad_url_set_program_parameter", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "quad_url_delete_program_parameter",
            |mut caller: Caller<'_, HostState>, name: u32| -> wasmtime::Result<()> {
                let bridge = bridge(&mut caller);
                let name = string_arg(bridge, name)?;
                bridge.page_mut().delete_query_param(&name);
                Ok(())
            },
        )
        .map_err(|e| link_error("quad_url_delete_program_parameter", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "quad_url_get_hash",
            |mut caller: Caller<'_, HostState>| -> wasmtime::Result<u32> {
                let bridge = bridge(&mut caller);
                let hash = bridge.page().hash();
                Ok(text_handle(bridge, hash)?)
            },
        )
        .map_err(|e| link_error("quad_url_get_hash", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "quad_url_set_hash",
            |mut caller: Caller<'_, HostState>, hash: u32| -> wasmtime::Result<()> {
                let bridge = bridge(&mut caller);
                let hash = string_arg(bridge, hash)?;
                bridge.page_mut().set_hash(&hash);
                Ok(())
            },
        )
        .map_err(|e| link_error("quad_url_set_hash", e))?;

    // Parameters as they were when the page was opened.
    linker
        .func_wrap(
            IMPORT_MODULE,
            "miniquad_parameters_param_count",
            |mut caller: Caller<'_, HostState>| -> i32 {
                bridge(&mut caller).page().startup_param_count() as i32
            },
        )
        .map_err(|e| link_error("miniquad_parameters_param_count", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "miniquad_parameters_get_key",
            |mut caller: Caller<'_, HostState>, index: i32| -> wasmtime::Result<u32> {
                let bridge = bridge(&mut caller);
                let key = bridge.page().startup_key(index)?.to_string();
                Ok(text_handle(bridge, key)?)
            },
        )
        .map_err(|e| link_error("miniquad_parameters_get_key", e))?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            "miniquad_parameters_get_value",
            |mut caller: Caller<'_, HostState>, index: i32| -> wasmtime::Result<u32> {
                let bridge = bridge(&mut caller);
                let value = bridge.page().startup_value(index)?.to_string();
                Ok(text_handle(bridge, value)?)
            },
        )
        .map_err(|e| link_error("miniquad_parameters_get_value", e))?;

    Ok(())
}
