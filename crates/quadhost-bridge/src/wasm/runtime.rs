//! Guest runtime implementation using wasmtime.
//!
//! Uses wasmtime-wasi preview1 so guests built for `wasm32-wasip1` link as
//! well as browser-targeted ones.

use super::config::{WasiCapabilities, WasmConfig};
use super::host_functions::{BridgeHostFunctions, BRIDGE_IMPORTS, IMPORT_MODULE};
use crate::bridge::Bridge;
use crate::error::{BridgeError, Result};

use std::path::Path;
use std::time::Instant;

use wasmtime::*;

/// Host state for the wasm store: the guest's bridge plus WASI context.
pub struct HostState {
    pub(crate) bridge: Bridge,
    preview1: wasmtime_wasi::preview1::WasiP1Ctx,
    limits: StoreLimits,
}

impl HostState {
    /// Get the preview1 context.
    fn preview1(&mut self) -> &mut wasmtime_wasi::preview1::WasiP1Ctx {
        &mut self.preview1
    }
}

/// Engine shared by every guest loaded through it.
pub struct QuadHost {
    engine: Engine,
    config: WasmConfig,
}

/// A compiled guest module.
pub struct GuestModule {
    module: Module,
    name: String,
}

/// An instantiated guest with its own bridge.
pub struct GuestInstance {
    store: Store<HostState>,
    instance: Instance,
}

/// Result of a guest call with timing information.
#[derive(Debug, Clone)]
pub struct CallResult<T> {
    /// The return value
    pub value: T,
    /// Execution time in microseconds
    pub execution_time_us: u64,
    /// Fuel consumed (if fuel metering enabled)
    pub fuel_consumed: Option<u64>,
}

impl QuadHost {
    /// Create a new host engine with the given configuration.
    pub fn new(config: WasmConfig) -> Result<Self> {
        let mut engine_config = Config::new();

        engine_config.cranelift_opt_level(match config.optimization_level {
            0 => OptLevel::None,
            1 => OptLevel::Speed,
            _ => OptLevel::SpeedAndSize,
        });
        engine_config.wasm_simd(config.enable_simd);

        if config.fuel_limit.is_some() {
            engine_config.consume_fuel(true);
        }

        let engine = Engine::new(&engine_config)
            .map_err(|e| BridgeError::WasmError(format!("engine creation failed: {}", e)))?;

        Ok(Self { engine, config })
    }

    /// Load a guest module from a file (binary or text format).
    pub fn load_module(&self, path: impl AsRef<Path>) -> Result<GuestModule> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        let module = Module::from_file(&self.engine, path)
            .map_err(|e| BridgeError::WasmError(format!("module load failed: {}", e)))?;

        Ok(GuestModule { module, name })
    }

    /// Load a guest module from bytes (binary or text format).
    pub fn load_module_bytes(&self, name: &str, bytes: impl AsRef<[u8]>) -> Result<GuestModule> {
        let module = Module::new(&self.engine, bytes)
            .map_err(|e| BridgeError::WasmError(format!("module creation failed: {}", e)))?;

        Ok(GuestModule {
            module,
            name: name.to_string(),
        })
    }

    /// Instantiate a module, handing it `bridge` as its host environment.
    pub fn instantiate(&self, module: &GuestModule, bridge: Bridge) -> Result<GuestInstance> {
        let host_state = self.build_host_state(&self.config.capabilities, bridge)?;
        let mut store = Store::new(&self.engine, host_state);

        store.limiter(|state| &mut state.limits);

        if let Some(fuel) = self.config.fuel_limit {
            store
                .set_fuel(fuel)
                .map_err(|e| BridgeError::WasmError(format!("fuel setup failed: {}", e)))?;
        }

        let mut linker: Linker<HostState> = Linker::new(&self.engine);
        wasmtime_wasi::preview1::add_to_linker_sync(&mut linker, |state| state.preview1())
            .map_err(|e| BridgeError::WasmError(format!("WASI link failed: {}", e)))?;

        BridgeHostFunctions::register(&mut linker)?;

        let instance = linker
            .instantiate(&mut store, &module.module)
            .map_err(|e| BridgeError::WasmError(format!("instantiation failed: {}", e)))?;

        tracing::debug!(module = module.name.as_str(), "guest instantiated");
        Ok(GuestInstance { store, instance })
    }

    /// Build host state from capabilities.
    fn build_host_state(&self, caps: &WasiCapabilities, bridge: Bridge) -> Result<HostState> {
        let mut builder = wasmtime_wasi::WasiCtxBuilder::new();

        if caps.stdin {
            builder.inherit_stdin();
        }
        if caps.stdout {
            builder.inherit_stdout();
        }
        if caps.stderr {
            builder.inherit_stderr();
        }

        let preview1 = builder.build_p1();

        let limits = StoreLimitsBuilder::new()
            .memory_size(self.config.max_memory)
            .build();

        Ok(HostState {
            bridge,
            preview1,
            limits,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &WasmConfig {
        &self.config
    }
}

impl GuestModule {
    /// Get the module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get exported function names.
    pub fn exports(&self) -> impl Iterator<Item = &str> {
        self.module.exports().filter_map(|e| {
            if matches!(e.ty(), ExternType::Func(_)) {
                Some(e.name())
            } else {
                None
            }
        })
    }

    /// Bridge functions this module imports.
    pub fn bridge_imports(&self) -> Vec<&str> {
        self.env_imports()
            .filter(|name| BRIDGE_IMPORTS.contains(name))
            .collect()
    }

    /// Functions imported from `env` that the bridge does not provide.
    /// Instantiation fails while this is non-empty.
    pub fn unknown_imports(&self) -> Vec<&str> {
        self.env_imports()
            .filter(|name| !BRIDGE_IMPORTS.contains(name))
            .collect()
    }

    fn env_imports(&self) -> impl Iterator<Item = &str> {
        self.module
            .imports()
            .filter(|i| i.module() == IMPORT_MODULE)
            .map(|i| i.name())
    }
}

impl GuestInstance {
    /// Call a typed export.
    pub fn call<P, R>(&mut self, name: &str, params: P) -> Result<CallResult<R>>
    where
        P: WasmParams,
        R: WasmResults,
    {
        let func = self.get_typed_func::<P, R>(name)?;
        let start = Instant::now();
        let fuel_before = self.store.get_fuel().ok();

        let value = func
            .call(&mut self.store, params)
            .map_err(|e| BridgeError::WasmError(format!("call to '{}' failed: {:#}", name, e)))?;

        let fuel_after = self.store.get_fuel().ok();
        let fuel_consumed = fuel_before.zip(fuel_after).map(|(b, a)| b - a);

        Ok(CallResult {
            value,
            execution_time_us: start.elapsed().as_micros() as u64,
            fuel_consumed,
        })
    }

    /// Call an entry point, passing zero for every parameter and
    /// discarding results. Accepts `() -> ()` as well as C-style
    /// `main(argc, argv) -> i32`.
    pub fn call_entry(&mut self, name: &str) -> Result<CallResult<()>> {
        let func = self
            .instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| BridgeError::WasmError(format!("function '{}' not found", name)))?;

        let ty = func.ty(&self.store);
        let params = ty
            .params()
            .map(|t| match t {
                ValType::I32 => Ok(Val::I32(0)),
                ValType::I64 => Ok(Val::I64(0)),
                ValType::F32 => Ok(Val::F32(0)),
                ValType::F64 => Ok(Val::F64(0)),
                other => Err(BridgeError::WasmError(format!(
                    "entry '{}' takes unsupported parameter type {}",
                    name, other
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        let mut results = vec![Val::I32(0); ty.results().len()];

        let start = Instant::now();
        let fuel_before = self.store.get_fuel().ok();

        func.call(&mut self.store, &params, &mut results)
            .map_err(|e| BridgeError::WasmError(format!("call to '{}' failed: {:#}", name, e)))?;

        let fuel_after = self.store.get_fuel().ok();
        Ok(CallResult {
            value: (),
            execution_time_us: start.elapsed().as_micros() as u64,
            fuel_consumed: fuel_before.zip(fuel_after).map(|(b, a)| b - a),
        })
    }

    /// Call a `() -> ()` export once per frame, applying audio completions
    /// before each frame.
    pub fn run_frames(&mut self, name: &str, frames: usize) -> Result<FrameStats> {
        let func = self.get_typed_func::<(), ()>(name)?;
        let mut stats = FrameStats::new();

        for frame in 0..frames {
            self.pump_events();
            let start = Instant::now();
            func.call(&mut self.store, ()).map_err(|e| {
                BridgeError::WasmError(format!("frame {} of '{}' failed: {:#}", frame, name, e))
            })?;
            stats.record(start.elapsed().as_micros() as u64);
        }
        self.pump_events();

        Ok(stats)
    }

    /// Apply pending audio completions.
    pub fn pump_events(&mut self) {
        self.store.data_mut().bridge.pump();
    }

    /// The guest's bridge.
    pub fn bridge(&self) -> &Bridge {
        &self.store.data().bridge
    }

    /// The guest's bridge, mutably.
    pub fn bridge_mut(&mut self) -> &mut Bridge {
        &mut self.store.data_mut().bridge
    }

    /// Stop audio and release every object the guest still holds.
    pub fn shutdown(&mut self) {
        self.bridge_mut().shutdown();
    }

    /// Get a typed function from the instance.
    fn get_typed_func<P, R>(&mut self, name: &str) -> Result<TypedFunc<P, R>>
    where
        P: WasmParams,
        R: WasmResults,
    {
        self.instance
            .get_typed_func::<P, R>(&mut self.store, name)
            .map_err(|e| BridgeError::WasmError(format!("function '{}' not found: {}", name, e)))
    }

    /// Write bytes to guest memory at the given offset.
    pub fn write_memory(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let memory = self.get_memory()?;
        let mem_data = memory.data_mut(&mut self.store);

        if offset + data.len() > mem_data.len() {
            return Err(BridgeError::WasmError(
                "memory write out of bounds".to_string(),
            ));
        }

        mem_data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Read bytes from guest memory at the given offset.
    pub fn read_memory(&mut self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let memory = self.get_memory()?;
        let mem_data = memory.data(&self.store);

        if offset + len > mem_data.len() {
            return Err(BridgeError::WasmError(
                "memory read out of bounds".to_string(),
            ));
        }

        Ok(mem_data[offset..offset + len].to_vec())
    }

    /// Get the memory export.
    fn get_memory(&mut self) -> Result<Memory> {
        self.instance
            .get_memory(&mut self.store, "memory")
            .ok_or_else(|| BridgeError::WasmError("no memory export found".to_string()))
    }

    /// Get remaining fuel (if fuel metering enabled).
    pub fn remaining_fuel(&self) -> Option<u64> {
        self.store.get_fuel().ok()
    }
}

/// Per-frame timing collector.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    samples: Vec<u64>,
}

impl FrameStats {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self { samples: Vec::new() }
    }

    /// Record a frame time in microseconds.
    pub fn record(&mut self, us: u64) {
        self.samples.push(us);
    }

    /// Get the number of frames.
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// Get the mean frame time in microseconds.
    pub fn mean_us(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<u64>() as f64 / self.samples.len() as f64
    }

    /// Get the p50 (median) frame time in microseconds.
    pub fn p50_us(&self) -> u64 {
        self.percentile(50)
    }

    /// Get the p99 frame time in microseconds.
    pub fn p99_us(&self) -> u64 {
        self.percentile(99)
    }

    /// Get a percentile value.
    pub fn percentile(&self, p: usize) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        let idx = (p * sorted.len() / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Get min frame time.
    pub fn min_us(&self) -> u64 {
        self.samples.iter().copied().min().unwrap_or(0)
    }

    /// Get max frame time.
    pub fn max_us(&self) -> u64 {
        self.samples.iter().copied().max().unwrap_or(0)
    }

    /// One-line summary of the collected frames.
    pub fn summary(&self) -> String {
        format!(
            "n={} min={}us mean={:.1}us p50={}us p99={}us max={}us",
            self.count(),
            self.min_us(),
            self.mean_us(),
            self.p50_us(),
            self.p99_us(),
            self.max_us()
        )
    }
}
