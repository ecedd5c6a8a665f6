//! A tiny emulator module written in WAT, and the host wiring around it
//!
//! The module keeps the real module's ABI: a bump `malloc` that grows memory
//! and notifies the host, `createEmulator`/`runFrame`, and calls into every
//! implemented import while running a frame.

#![allow(dead_code)]

use gb_host::clock::FixedClock;
use gb_host::console::RecordingConsole;
use gb_host::render::FrameCapture;
use gb_host::{EmbeddedArtifact, HostFunctionTable, InstanceManager, ModuleLoader};
use gb_native::{NativeInstance, NativeRuntime};

/// Wall time the host clock reports, in epoch milliseconds
pub const CLOCK_MILLIS: u64 = 1_700_000_123;

/// First address handed out by the module's allocator
pub const HEAP_BASE: i32 = 32 * 1024;

/// Where the module keeps its framebuffer
pub const FRAMEBUFFER_PTR: usize = 1024;

/// Where `runFrame` asks the host to store the time
pub const TIMESPEC_PTR: usize = 8;

pub const EMULATOR_WAT: &str = include_str!("../emulator.wat");

/// An instance manager plus the host pieces the tests inspect
pub struct Harness {
    pub console: RecordingConsole,
    pub capture: FrameCapture,
    pub manager: InstanceManager<NativeInstance>,
}

impl Harness {
    pub fn new(source: &str) -> Self {
        Self::from_bytes(source.as_bytes().to_vec())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let console = RecordingConsole::new();
        let capture = FrameCapture::new();
        let host = HostFunctionTable::with_parts(
            FixedClock::new(CLOCK_MILLIS),
            console.clone(),
            capture.clone(),
        );
        let loader = ModuleLoader::new(EmbeddedArtifact::new("memory://gb.wasm", bytes), NativeRuntime::new());
        Self {
            console,
            capture,
            manager: InstanceManager::new(loader, host),
        }
    }
}

pub fn read_word(instance: &NativeInstance, offset: usize) -> i32 {
    let bytes = instance.read_memory(offset, 4).unwrap();
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
