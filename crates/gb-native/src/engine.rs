//! Compiling the module and linking the host function table into it
//!
//! Linking is driven by the module's own import list: every import that
//! resolves to a host table entry is defined with the exact function type the
//! module declares and forwarded to [`HostFunctionTable::dispatch`]. The
//! syscall-shaped stubs therefore take whatever signature the toolchain gave
//! them and still share one code path.

use std::sync::Arc;

use gb_host::abi::{resolve_import, ExportNames, HostImport};
use gb_host::memory::BorrowedMemory;
use gb_host::{HostError, HostFunctionTable, ModuleRuntime, Result};
use wasmtime::{Caller, Engine, Extern, ExternType, FuncType, Linker, Module, Store, Val, ValType};

use crate::instance::NativeInstance;

/// Data owned by the wasmtime store
pub struct HostState {
    pub(crate) host: HostFunctionTable,
}

/// Turn an engine error back into the host error that caused it, if any
pub(crate) fn host_error(err: wasmtime::Error, fallback: impl FnOnce(String) -> HostError) -> HostError {
    match err.downcast_ref::<HostError>() {
        Some(host) => host.clone(),
        None => fallback(format!("{err:#}")),
    }
}

/// wasmtime-backed [`ModuleRuntime`]
#[derive(Clone)]
pub struct NativeRuntime {
    engine: Engine,
    exports: ExportNames,
}

impl NativeRuntime {
    pub fn new() -> Self {
        Self::with_exports(ExportNames::default())
    }

    pub fn with_exports(exports: ExportNames) -> Self {
        Self {
            engine: Engine::default(),
            exports,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Define every host-provided import `module` declares
    fn link(&self, module: &Module) -> Result<Linker<HostState>> {
        let mut linker = Linker::new(&self.engine);
        linker.allow_shadowing(true);
        let memory_export: Arc<str> = Arc::from(self.exports.memory.as_str());

        for import in module.imports() {
            let Some(entry) = resolve_import(import.module(), import.name()) else {
                // Left undefined; instantiation reports it.
                continue;
            };
            let ExternType::Func(ty) = import.ty() else {
                return Err(HostError::Instantiate(format!(
                    "import {}.{} must be a function",
                    import.module(),
                    import.name()
                )));
            };
            check_signature(entry, &ty, import.module(), import.name())?;

            let memory_export = Arc::clone(&memory_export);
            linker
                .func_new(import.module(), import.name(), ty, move |mut caller, params, results| {
                    call_host(&mut caller, &memory_export, entry, params, results)
                })
                .map_err(|err| HostError::Instantiate(format!("{err:#}")))?;
        }
        Ok(linker)
    }
}

impl Default for NativeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn check_signature(entry: HostImport, ty: &FuncType, namespace: &str, name: &str) -> Result<()> {
    let Some(count) = entry.param_count() else {
        return Ok(());
    };
    let params_ok = ty.params().len() == count && ty.params().all(|p| matches!(p, ValType::I32));
    let results: Vec<ValType> = ty.results().collect();
    let results_ok = if entry.returns_i32() {
        results.len() == 1 && matches!(results[0], ValType::I32)
    } else {
        results.is_empty()
    };
    if params_ok && results_ok {
        Ok(())
    } else {
        Err(HostError::Instantiate(format!(
            "import {namespace}.{name} has signature {ty:?}, which does not match the host function"
        )))
    }
}

fn call_host(
    caller: &mut Caller<'_, HostState>,
    memory_export: &str,
    entry: HostImport,
    params: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    if let HostImport::Unsupported(name) = entry {
        return Err(caller.data().host.unsupported(name).into());
    }

    let memory = caller
        .get_export(memory_export)
        .and_then(Extern::into_memory)
        .ok_or_else(|| HostError::MissingExport(memory_export.to_string()))?;
    let args: Vec<i32> = params.iter().map(|val| val.i32().unwrap_or_default()).collect();

    let (data, state) = memory.data_and_store_mut(&mut *caller);
    let mut memory = BorrowedMemory::new(data);
    if let Some(value) = state.host.dispatch(&mut memory, entry, &args)? {
        if let Some(slot) = results.first_mut() {
            *slot = Val::I32(value);
        }
    }
    Ok(())
}

impl ModuleRuntime for NativeRuntime {
    type Module = Module;
    type Instance = NativeInstance;

    async fn compile(&self, binary: &[u8]) -> Result<Module> {
        Module::new(&self.engine, binary).map_err(|err| HostError::Compile(format!("{err:#}")))
    }

    async fn instantiate(&self, module: Module, host: HostFunctionTable) -> Result<NativeInstance> {
        let linker = self.link(&module)?;
        let mut store = Store::new(&self.engine, HostState { host });
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|err| host_error(err, HostError::Instantiate))?;
        NativeInstance::new(store, instance, &self.exports)
    }
}
