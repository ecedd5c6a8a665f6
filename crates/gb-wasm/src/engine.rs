//! Running the module on the page's `WebAssembly` object
//!
//! Every host import becomes a JS closure over one shared
//! [`HostFunctionTable`]. A host error raised inside an import is parked in a
//! slot before it is thrown, so the export call that trapped can report the
//! original [`HostError`] instead of an opaque JS exception.

use std::cell::RefCell;
use std::rc::Rc;

use gb_host::abi::{ExportNames, HostImport, IMPORTS};
use gb_host::memory::check_bounds;
use gb_host::render::TargetId;
use gb_host::{HostError, HostFunctionTable, LinearMemory, ModuleInstance, ModuleRuntime, Result};
use js_sys::{ArrayBuffer, Function, Object, Reflect, Uint8Array, WebAssembly};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::artifact::js_message;

/// The module's exported memory
///
/// Growth detaches the old `ArrayBuffer`; the buffer's byte length doubles as
/// the generation since memory only ever grows.
#[derive(Debug, Clone)]
pub struct WebMemory {
    memory: WebAssembly::Memory,
}

impl WebMemory {
    pub fn new(memory: WebAssembly::Memory) -> Self {
        Self { memory }
    }

    fn buffer(&self) -> ArrayBuffer {
        self.memory.buffer().unchecked_into()
    }

    fn window(&self, offset: usize, len: usize) -> Result<Uint8Array> {
        let buffer = self.buffer();
        check_bounds(offset, len, buffer.byte_length() as usize)?;
        Ok(Uint8Array::new_with_byte_offset_and_length(
            &buffer,
            offset as u32,
            len as u32,
        ))
    }
}

impl LinearMemory for WebMemory {
    fn generation(&self) -> u64 {
        self.buffer().byte_length() as u64
    }

    fn byte_length(&self) -> usize {
        self.buffer().byte_length() as usize
    }

    fn read(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        self.window(offset, dst.len())?.copy_to(dst);
        Ok(())
    }

    fn write(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        self.window(offset, src.len())?.copy_from(src);
        Ok(())
    }
}

type ImportClosure = Closure<dyn FnMut(i32, i32, i32, i32) -> std::result::Result<i32, JsValue>>;

/// State the import closures share
#[derive(Clone)]
struct Shared {
    host: Rc<RefCell<HostFunctionTable>>,
    memory: Rc<RefCell<Option<WebMemory>>>,
    failure: Rc<RefCell<Option<HostError>>>,
}

impl Shared {
    fn call(&self, entry: HostImport, args: [i32; 4]) -> Result<i32> {
        if let HostImport::Unsupported(name) = entry {
            return Err(self.host.borrow().unsupported(name));
        }
        let mut memory = self
            .memory
            .borrow()
            .clone()
            .ok_or_else(|| HostError::MissingExport("memory".into()))?;
        let count = entry.param_count().unwrap_or(0);
        let value = self
            .host
            .borrow_mut()
            .dispatch(&mut memory, entry, &args[..count])?;
        Ok(value.unwrap_or(0))
    }

    fn closure(&self, entry: HostImport) -> ImportClosure {
        let shared = self.clone();
        Closure::new(move |a, b, c, d| {
            shared.call(entry, [a, b, c, d]).map_err(|err| {
                let thrown = JsError::new(&err.to_string()).into();
                *shared.failure.borrow_mut() = Some(err);
                thrown
            })
        })
    }

    /// The error behind a failed export call
    fn take_failure(&self, thrown: &JsValue) -> HostError {
        self.failure
            .borrow_mut()
            .take()
            .unwrap_or_else(|| HostError::Trap(js_message(thrown)))
    }
}

/// `WebAssembly`-backed [`ModuleRuntime`]
#[derive(Debug, Clone, Default)]
pub struct WebRuntime {
    exports: ExportNames,
}

impl WebRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exports(exports: ExportNames) -> Self {
        Self { exports }
    }
}

fn import_object(shared: &Shared) -> std::result::Result<(Object, Vec<ImportClosure>), JsValue> {
    let imports = Object::new();
    let mut closures = Vec::with_capacity(IMPORTS.len());
    for (namespace, name, entry) in IMPORTS {
        let key = JsValue::from_str(namespace);
        let table = match Reflect::get(&imports, &key)?.dyn_into::<Object>() {
            Ok(table) => table,
            Err(_) => {
                let table = Object::new();
                Reflect::set(&imports, &key, &table)?;
                table
            }
        };
        let closure = shared.closure(entry);
        Reflect::set(&table, &JsValue::from_str(name), closure.as_ref())?;
        closures.push(closure);
    }
    Ok((imports, closures))
}

fn export(exports: &Object, name: &str) -> Result<JsValue> {
    let value = Reflect::get(exports, &JsValue::from_str(name)).unwrap_or(JsValue::UNDEFINED);
    if value.is_undefined() {
        return Err(HostError::MissingExport(name.to_string()));
    }
    Ok(value)
}

fn function(exports: &Object, name: &str) -> Result<Function> {
    export(exports, name)?
        .dyn_into()
        .map_err(|_| HostError::Instantiate(format!("export `{name}` is not a function")))
}

fn pick(exports: &Object, candidates: &[String]) -> Result<Function> {
    let exists = |name: &str| Reflect::has(exports, &JsValue::from_str(name)).unwrap_or(false);
    let name = ExportNames::pick(candidates, exists)
        .ok_or_else(|| HostError::MissingExport(candidates.first().cloned().unwrap_or_default()))?;
    function(exports, name)
}

impl ModuleRuntime for WebRuntime {
    type Module = WebAssembly::Module;
    type Instance = WebInstance;

    async fn compile(&self, binary: &[u8]) -> Result<WebAssembly::Module> {
        let bytes = Uint8Array::from(binary);
        JsFuture::from(WebAssembly::compile(&bytes))
            .await
            .and_then(|module| module.dyn_into())
            .map_err(|e| HostError::Compile(js_message(&e)))
    }

    async fn instantiate(&self, module: WebAssembly::Module, host: HostFunctionTable) -> Result<WebInstance> {
        let shared = Shared {
            host: Rc::new(RefCell::new(host)),
            memory: Rc::new(RefCell::new(None)),
            failure: Rc::new(RefCell::new(None)),
        };
        let (imports, closures) =
            import_object(&shared).map_err(|e| HostError::Instantiate(js_message(&e)))?;

        let instance: WebAssembly::Instance = JsFuture::from(WebAssembly::instantiate_module(&module, &imports))
            .await
            .and_then(|instance| instance.dyn_into())
            .map_err(|e| shared.take_failure(&e))
            .map_err(|err| match err {
                HostError::Trap(message) => HostError::Instantiate(message),
                other => other,
            })?;
        let exports = instance.exports();

        let memory = WebMemory::new(
            export(&exports, &self.exports.memory)?
                .dyn_into()
                .map_err(|_| HostError::Instantiate(format!("export `{}` is not a memory", self.exports.memory)))?,
        );
        *shared.memory.borrow_mut() = Some(memory.clone());

        Ok(WebInstance {
            malloc: function(&exports, &self.exports.malloc)?,
            free: function(&exports, &self.exports.free)?,
            create_emulator: pick(&exports, &self.exports.create_emulator)?,
            run_frame: pick(&exports, &self.exports.run_frame)?,
            memory,
            exports,
            shared,
            _closures: closures,
        })
    }
}

/// An instantiated module and the closures backing its imports
pub struct WebInstance {
    shared: Shared,
    memory: WebMemory,
    exports: Object,
    malloc: Function,
    free: Function,
    create_emulator: Function,
    run_frame: Function,
    _closures: Vec<ImportClosure>,
}

impl WebInstance {
    pub fn memory(&self) -> &WebMemory {
        &self.memory
    }

    /// Call any function export with i32 arguments
    ///
    /// Returns the result as an i32, if the export has one.
    pub fn invoke(&self, name: &str, args: &[i32]) -> Result<Option<i32>> {
        let func = function(&self.exports, name)?;
        Ok(self.call_raw(&func, args)?.as_f64().map(|v| v as i32))
    }

    fn call(&self, func: &Function, args: &[i32]) -> Result<i32> {
        Ok(self.call_raw(func, args)?.as_f64().map_or(0, |v| v as i32))
    }

    fn call_raw(&self, func: &Function, args: &[i32]) -> Result<JsValue> {
        let result = match args {
            [] => func.call0(&JsValue::NULL),
            [a] => func.call1(&JsValue::NULL, &(*a).into()),
            [a, b] => func.call2(&JsValue::NULL, &(*a).into(), &(*b).into()),
            _ => return Err(HostError::Trap(format!("unsupported call arity {}", args.len()))),
        };
        result.map_err(|e| self.shared.take_failure(&e))
    }
}

impl ModuleInstance for WebInstance {
    fn notify_memory_growth(&self, memory_index: i32) -> Result<()> {
        self.shared
            .host
            .borrow_mut()
            .notify_memory_growth(&self.memory, memory_index);
        Ok(())
    }

    fn memory_byte_length(&self) -> usize {
        self.memory.byte_length()
    }

    fn write_memory(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.memory.clone().write(offset, bytes)
    }

    fn malloc(&self, size: i32) -> Result<i32> {
        self.call(&self.malloc, &[size])
    }

    fn free(&self, ptr: i32) -> Result<()> {
        self.call(&self.free, &[ptr]).map(|_| ())
    }

    fn create_emulator(&self, rom_ptr: i32, target: TargetId) -> Result<i32> {
        self.call(&self.create_emulator, &[rom_ptr, target])
    }

    fn run_frame(&self, handle: i32) -> Result<bool> {
        Ok(self.call(&self.run_frame, &[handle])? != 0)
    }
}
