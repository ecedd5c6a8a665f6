//! The host function table
//!
//! Everything the module calls back into while it runs. Each function reads
//! the current memory views at the moment of the call and completes
//! synchronously: the module cannot yield to an asynchronous host, and a
//! growth notification must finish rebuilding the views before the module's
//! next instruction touches memory.

use std::cell::Cell;
use std::rc::Rc;

use crate::abi::HostImport;
use crate::clock::{timespec_words, SystemClock, WallClock};
use crate::console::{Console, TracingConsole};
use crate::error::{HostError, Result};
use crate::memory::{LinearMemory, MemoryViews};
use crate::render::{FrameRenderer, RenderTarget, TargetId};

/// When the module last grew its memory; clones share the same record
#[derive(Debug, Default, Clone)]
pub struct GrowthObservation {
    last_millis: Rc<Cell<u64>>,
    notifications: Rc<Cell<u64>>,
}

impl GrowthObservation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp of the most recent growth notification, 0 if none yet
    pub fn last_timestamp(&self) -> u64 {
        self.last_millis.get()
    }

    /// Number of growth notifications seen so far
    pub fn notifications(&self) -> u64 {
        self.notifications.get()
    }

    fn record(&self, millis: u64) {
        self.last_millis.set(millis);
        self.notifications.set(self.notifications.get() + 1);
    }
}

fn address(ptr: i32) -> usize {
    ptr as u32 as usize
}

/// windows-1252 code points for 0x80..=0x9F; unassigned bytes map to C1 controls
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

/// Decode the module's "ASCII" text the way a browser's `TextDecoder("ascii")` does
///
/// That label is windows-1252: Latin-1 everywhere except 0x80..=0x9F.
fn decode_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => WINDOWS_1252_HIGH[(b - 0x80) as usize],
            _ => char::from(b),
        })
        .collect()
}

/// Host-side state and behavior behind every module import
pub struct HostFunctionTable {
    views: MemoryViews,
    growth: GrowthObservation,
    renderer: FrameRenderer,
    clock: Box<dyn WallClock>,
    console: Box<dyn Console>,
    target: Box<dyn RenderTarget>,
}

impl HostFunctionTable {
    /// Table using the system clock and the tracing console
    pub fn new(target: impl RenderTarget + 'static) -> Self {
        Self::with_parts(SystemClock, TracingConsole, target)
    }

    pub fn with_parts(
        clock: impl WallClock + 'static,
        console: impl Console + 'static,
        target: impl RenderTarget + 'static,
    ) -> Self {
        Self {
            views: MemoryViews::new(),
            growth: GrowthObservation::new(),
            renderer: FrameRenderer::new(),
            clock: Box::new(clock),
            console: Box::new(console),
            target: Box::new(target),
        }
    }

    /// Shared handle to the growth record
    pub fn growth(&self) -> GrowthObservation {
        self.growth.clone()
    }

    pub fn views(&self) -> &MemoryViews {
        &self.views
    }

    /// Where diagnostics for the module end up
    pub fn console(&self) -> &dyn Console {
        self.console.as_ref()
    }

    /// `clock_gettime`: store wall time as `(seconds, nanoseconds)` at `timespec_ptr`
    pub fn clock_gettime<M: LinearMemory + ?Sized>(
        &mut self,
        memory: &mut M,
        _clock_id: i32,
        timespec_ptr: i32,
    ) -> Result<i32> {
        let (seconds, nanos) = timespec_words(self.clock.now_millis());
        let base = address(timespec_ptr);
        let words = self.views.words(memory);
        words.set(memory, base >> 2, seconds)?;
        words.set(memory, (base + 4) >> 2, nanos)?;
        Ok(0)
    }

    /// `notify_memory_growth`: the buffer was replaced, rebuild the views
    ///
    /// The very first notification (the one issued right after instantiation)
    /// is not logged.
    pub fn notify_memory_growth<M: LinearMemory + ?Sized>(&mut self, memory: &M, memory_index: i32) {
        if self.growth.notifications() > 0 {
            self.console
                .info(&format!("gb.wasm: Memory Grow: {}", memory.byte_length()));
        }
        self.growth.record(self.clock.now_millis());
        self.views.rebuild(memory);
        tracing::debug!(
            target: "gb_host::host",
            memory_index,
            byte_length = memory.byte_length(),
            "memory growth notification"
        );
    }

    /// `printAsciiBuffer`: log the null-terminated string at `ptr`
    ///
    /// Bytes are decoded as windows-1252, so every byte yields one char.
    pub fn print_ascii_buffer<M: LinearMemory + ?Sized>(&mut self, memory: &M, ptr: i32) -> Result<()> {
        let start = address(ptr);
        let bytes = self.views.bytes(memory);
        let end = bytes
            .position(memory, start, 0)?
            .ok_or(HostError::UnterminatedString { ptr: ptr as u32 })?;
        let mut raw = vec![0u8; end - start];
        bytes.read(memory, start, &mut raw)?;
        self.console.log(&decode_ascii(&raw));
        Ok(())
    }

    /// `renderCanvas`: render the framebuffer at `framebuffer_ptr` to `target_id`
    pub fn render_canvas<M: LinearMemory + ?Sized>(
        &mut self,
        memory: &M,
        target_id: TargetId,
        framebuffer_ptr: i32,
    ) -> Result<()> {
        let bytes = self.views.bytes(memory);
        bytes.read(memory, address(framebuffer_ptr), self.renderer.luma_mut())?;
        let rgba = self.renderer.render();
        self.target.present(target_id, rgba);
        Ok(())
    }

    /// A syscall-shaped import was called: log once and fail
    pub fn unsupported(&self, name: &'static str) -> HostError {
        self.console
            .error(&format!("gb.wasm: unsupported import `{name}` was called"));
        HostError::Unsupported { name }
    }

    /// Run one table entry with raw i32 arguments
    ///
    /// Returns the entry's i32 result, if it has one.
    pub fn dispatch<M: LinearMemory + ?Sized>(
        &mut self,
        memory: &mut M,
        import: HostImport,
        args: &[i32],
    ) -> Result<Option<i32>> {
        if let Some(expected) = import.param_count() {
            if args.len() != expected {
                return Err(HostError::Trap(format!(
                    "{import:?} expects {expected} arguments, got {}",
                    args.len()
                )));
            }
        }
        match import {
            HostImport::RenderCanvas => {
                self.render_canvas(memory, args[0], args[1])?;
                Ok(None)
            }
            HostImport::ClockGettime => self.clock_gettime(memory, args[0], args[1]).map(Some),
            HostImport::NotifyMemoryGrowth => {
                self.notify_memory_growth(memory, args[0]);
                Ok(None)
            }
            HostImport::PrintAsciiBuffer => {
                self.print_ascii_buffer(memory, args[0])?;
                Ok(None)
            }
            HostImport::Unsupported(name) => Err(self.unsupported(name)),
        }
    }
}
