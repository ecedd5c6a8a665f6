//! A stand-in module for exercising the bridge without a wasm engine
//!
//! `FakeInstance` behaves like the real emulator module from the host's point
//! of view: it owns linear memory, grows it (and notifies the host) when its
//! allocator runs out, and calls `renderCanvas`/`printAsciiBuffer` while
//! running a frame.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use gb_host::memory::{HeapMemory, PAGE_SIZE};
use gb_host::render::{TargetId, FRAME_LEN};
use gb_host::{
    ArtifactSource, FetchResponse, HostError, HostFunctionTable, LinearMemory, ModuleInstance,
    ModuleRuntime, Result,
};

/// Where the fake module keeps its framebuffer
pub const FRAMEBUFFER_PTR: i32 = 256;

/// First address handed out by the fake allocator
pub const HEAP_BASE: i32 = 32 * 1024;

/// A valid-looking module binary
pub const WASM_MAGIC: &[u8] = b"\0asm\x01\0\0\0";

/// Returns `Pending` once, so awaiting callers really do suspend
pub struct YieldNow(bool);

pub fn yield_now() -> YieldNow {
    YieldNow(false)
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// What a [`CountingSource`] answers with
#[derive(Debug, Clone)]
pub enum Reply {
    Body(Vec<u8>),
    Status(u16),
    Transport(String),
}

/// Artifact source that counts fetches
#[derive(Debug, Clone)]
pub struct CountingSource {
    pub fetches: Rc<Cell<u32>>,
    reply: Reply,
}

impl CountingSource {
    pub fn new(reply: Reply) -> Self {
        Self {
            fetches: Rc::new(Cell::new(0)),
            reply,
        }
    }

    pub fn wasm() -> Self {
        Self::new(Reply::Body(WASM_MAGIC.to_vec()))
    }
}

impl ArtifactSource for CountingSource {
    fn location(&self) -> &str {
        "memory://gb.wasm"
    }

    async fn fetch(&self) -> Result<FetchResponse> {
        self.fetches.set(self.fetches.get() + 1);
        yield_now().await;
        match &self.reply {
            Reply::Body(body) => Ok(FetchResponse::ok(body.clone())),
            Reply::Status(status) => Ok(FetchResponse::failed(*status)),
            Reply::Transport(message) => Err(HostError::Fetch {
                location: self.location().to_string(),
                message: message.clone(),
            }),
        }
    }
}

/// Runtime that "compiles" anything starting with the wasm magic
#[derive(Debug, Clone, Default)]
pub struct FakeRuntime {
    pub compiles: Rc<Cell<u32>>,
    pub instantiations: Rc<Cell<u32>>,
    /// Frames each emulator runs before reporting it wants to stop
    pub frame_limit: u32,
}

impl FakeRuntime {
    pub fn new(frame_limit: u32) -> Self {
        Self {
            frame_limit,
            ..Self::default()
        }
    }
}

impl ModuleRuntime for FakeRuntime {
    type Module = Vec<u8>;
    type Instance = FakeInstance;

    async fn compile(&self, binary: &[u8]) -> Result<Vec<u8>> {
        self.compiles.set(self.compiles.get() + 1);
        yield_now().await;
        if !binary.starts_with(b"\0asm") {
            return Err(HostError::Compile("magic header not detected".into()));
        }
        Ok(binary.to_vec())
    }

    async fn instantiate(&self, _module: Vec<u8>, host: HostFunctionTable) -> Result<FakeInstance> {
        self.instantiations.set(self.instantiations.get() + 1);
        Ok(FakeInstance::new(host, self.frame_limit))
    }
}

/// A host-side imitation of the emulator module
pub struct FakeInstance {
    host: RefCell<HostFunctionTable>,
    memory: RefCell<HeapMemory>,
    heap_top: Cell<i32>,
    emulators: RefCell<Vec<(i32, TargetId, u32)>>,
    frame_limit: u32,
}

impl FakeInstance {
    pub fn new(host: HostFunctionTable, frame_limit: u32) -> Self {
        Self {
            host: RefCell::new(host),
            memory: RefCell::new(HeapMemory::new(1)),
            heap_top: Cell::new(HEAP_BASE),
            emulators: RefCell::new(Vec::new()),
            frame_limit,
        }
    }

    /// Grow memory the way the module does: replace the buffer, then notify
    pub fn grow(&self, pages: usize) {
        self.memory.borrow_mut().grow(pages);
        let memory = self.memory.borrow();
        self.host.borrow_mut().notify_memory_growth(&*memory, 0);
    }

    pub fn memory(&self) -> std::cell::Ref<'_, HeapMemory> {
        self.memory.borrow()
    }

    pub fn host(&self) -> std::cell::RefMut<'_, HostFunctionTable> {
        self.host.borrow_mut()
    }

    fn log(&self, text: &str) -> Result<()> {
        let ptr = 64;
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        self.memory.borrow_mut().write(ptr, &bytes)?;
        let memory = self.memory.borrow();
        self.host.borrow_mut().print_ascii_buffer(&*memory, ptr as i32)
    }
}

impl ModuleInstance for FakeInstance {
    fn notify_memory_growth(&self, memory_index: i32) -> Result<()> {
        let memory = self.memory.borrow();
        self.host.borrow_mut().notify_memory_growth(&*memory, memory_index);
        Ok(())
    }

    fn memory_byte_length(&self) -> usize {
        self.memory.borrow().byte_length()
    }

    fn write_memory(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.memory.borrow_mut().write(offset, bytes)
    }

    fn malloc(&self, size: i32) -> Result<i32> {
        let ptr = self.heap_top.get();
        let end = ptr as usize + size as usize;
        let len = self.memory_byte_length();
        if end > len {
            self.grow((end - len).div_ceil(PAGE_SIZE));
        }
        self.heap_top.set(end as i32);
        Ok(ptr)
    }

    fn free(&self, _ptr: i32) -> Result<()> {
        Ok(())
    }

    fn create_emulator(&self, rom_ptr: i32, target: TargetId) -> Result<i32> {
        let mut emulators = self.emulators.borrow_mut();
        emulators.push((rom_ptr, target, 0));
        Ok(emulators.len() as i32)
    }

    fn run_frame(&self, handle: i32) -> Result<bool> {
        let (rom_ptr, target, frame) = self
            .emulators
            .borrow()
            .get((handle - 1) as usize)
            .copied()
            .ok_or_else(|| HostError::Trap(format!("bad emulator handle {handle}")))?;

        let mut first = [0u8; 1];
        self.memory.borrow().read(rom_ptr as usize, &mut first)?;
        let shade = first[0].wrapping_add(frame as u8);
        self.memory
            .borrow_mut()
            .write(FRAMEBUFFER_PTR as usize, &vec![shade; FRAME_LEN])?;
        {
            let memory = self.memory.borrow();
            self.host
                .borrow_mut()
                .render_canvas(&*memory, target, FRAMEBUFFER_PTR)?;
        }
        self.log(&format!("FRAME {frame}"))?;

        let next = frame + 1;
        self.emulators.borrow_mut()[(handle - 1) as usize].2 = next;
        Ok(next < self.frame_limit)
    }
}
