//! The instantiated module's exports

use std::cell::RefCell;

use gb_host::abi::ExportNames;
use gb_host::memory::BorrowedMemory;
use gb_host::render::TargetId;
use gb_host::{HostError, HostFunctionTable, ModuleInstance, Result};
use wasmtime::{Instance, Memory, Store, TypedFunc, Val};

use crate::engine::{host_error, HostState};

/// A module instance living in its own wasmtime store
///
/// Host imports run through the `Caller` wasmtime hands them, so the store
/// is never borrowed twice even though exports call back into the host.
pub struct NativeInstance {
    store: RefCell<Store<HostState>>,
    instance: Instance,
    memory: Memory,
    malloc: TypedFunc<i32, i32>,
    free: TypedFunc<i32, ()>,
    create_emulator: TypedFunc<(i32, i32), i32>,
    run_frame: TypedFunc<i32, i32>,
}

impl NativeInstance {
    /// Resolve the exports named by `exports`
    pub fn new(mut store: Store<HostState>, instance: Instance, exports: &ExportNames) -> Result<Self> {
        let exported: Vec<String> = instance
            .exports(&mut store)
            .map(|export| export.name().to_string())
            .collect();
        let exists = |name: &str| exported.iter().any(|export| export == name);

        let memory = instance
            .get_memory(&mut store, &exports.memory)
            .ok_or_else(|| HostError::MissingExport(exports.memory.clone()))?;
        let malloc = typed(&mut store, &instance, &exports.malloc)?;
        let free = typed(&mut store, &instance, &exports.free)?;

        let create_name = ExportNames::pick(&exports.create_emulator, exists)
            .ok_or_else(|| missing(&exports.create_emulator))?;
        let create_emulator = typed(&mut store, &instance, create_name)?;
        let run_name =
            ExportNames::pick(&exports.run_frame, exists).ok_or_else(|| missing(&exports.run_frame))?;
        let run_frame = typed(&mut store, &instance, run_name)?;

        tracing::debug!(
            target: "gb_native::instance",
            create = create_name,
            run = run_name,
            pages = memory.size(&store),
            "module exports resolved"
        );

        Ok(Self {
            store: RefCell::new(store),
            instance,
            memory,
            malloc,
            free,
            create_emulator,
            run_frame,
        })
    }

    /// Call any function export with i32 arguments
    ///
    /// Returns the first result, if the export has one.
    pub fn invoke(&self, name: &str, args: &[i32]) -> Result<Option<i32>> {
        let mut store = self.store.borrow_mut();
        let func = self
            .instance
            .get_func(&mut *store, name)
            .ok_or_else(|| HostError::MissingExport(name.to_string()))?;
        let params: Vec<Val> = args.iter().copied().map(Val::I32).collect();
        let mut results = vec![Val::I32(0); func.ty(&*store).results().len()];
        func.call(&mut *store, &params, &mut results)
            .map_err(|err| host_error(err, HostError::Trap))?;
        Ok(results.first().and_then(Val::i32))
    }

    /// Copy `len` bytes of linear memory starting at `offset`
    pub fn read_memory(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let store = self.store.borrow();
        let mut bytes = vec![0u8; len];
        self.memory
            .read(&*store, offset, &mut bytes)
            .map_err(|_| HostError::OutOfBounds {
                offset,
                len,
                memory_len: self.memory.data_size(&*store),
            })?;
        Ok(bytes)
    }

    /// Run `f` against the store's host function table
    pub fn with_host<T>(&self, f: impl FnOnce(&mut HostFunctionTable) -> T) -> T {
        f(&mut self.store.borrow_mut().data_mut().host)
    }
}

fn typed<P, R>(store: &mut Store<HostState>, instance: &Instance, name: &str) -> Result<TypedFunc<P, R>>
where
    P: wasmtime::WasmParams,
    R: wasmtime::WasmResults,
{
    let func = instance
        .get_func(&mut *store, name)
        .ok_or_else(|| HostError::MissingExport(name.to_string()))?;
    func.typed(&*store)
        .map_err(|err| HostError::Instantiate(format!("export `{name}`: {err:#}")))
}

fn missing(candidates: &[String]) -> HostError {
    HostError::MissingExport(candidates.first().cloned().unwrap_or_default())
}

impl ModuleInstance for NativeInstance {
    fn notify_memory_growth(&self, memory_index: i32) -> Result<()> {
        let mut store = self.store.borrow_mut();
        let (data, state) = self.memory.data_and_store_mut(&mut *store);
        state
            .host
            .notify_memory_growth(&BorrowedMemory::new(data), memory_index);
        Ok(())
    }

    fn memory_byte_length(&self) -> usize {
        self.memory.data_size(&*self.store.borrow())
    }

    fn write_memory(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        let mut store = self.store.borrow_mut();
        let memory_len = self.memory.data_size(&*store);
        self.memory
            .write(&mut *store, offset, bytes)
            .map_err(|_| HostError::OutOfBounds {
                offset,
                len: bytes.len(),
                memory_len,
            })
    }

    fn malloc(&self, size: i32) -> Result<i32> {
        self.malloc
            .call(&mut *self.store.borrow_mut(), size)
            .map_err(|err| host_error(err, HostError::Trap))
    }

    fn free(&self, ptr: i32) -> Result<()> {
        self.free
            .call(&mut *self.store.borrow_mut(), ptr)
            .map_err(|err| host_error(err, HostError::Trap))
    }

    fn create_emulator(&self, rom_ptr: i32, target: TargetId) -> Result<i32> {
        self.create_emulator
            .call(&mut *self.store.borrow_mut(), (rom_ptr, target))
            .map_err(|err| host_error(err, HostError::Trap))
    }

    fn run_frame(&self, handle: i32) -> Result<bool> {
        let keep_running = self
            .run_frame
            .call(&mut *self.store.borrow_mut(), handle)
            .map_err(|err| host_error(err, HostError::Trap))?;
        Ok(keep_running != 0)
    }
}
