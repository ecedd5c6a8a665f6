//! Memory views across growth driven by the module

mod common;

use common::{FakeInstance, HEAP_BASE};
use gb_host::clock::FixedClock;
use gb_host::console::{ConsoleLevel, RecordingConsole};
use gb_host::memory::{View, PAGE_SIZE};
use gb_host::render::FrameCapture;
use gb_host::{HostError, HostFunctionTable, LinearMemory, ModuleInstance};

fn instance(console: RecordingConsole) -> FakeInstance {
    let host = HostFunctionTable::with_parts(FixedClock::new(7), console, FrameCapture::new());
    let instance = FakeInstance::new(host, 10);
    instance.notify_memory_growth(0).unwrap();
    instance
}

#[test]
fn test_growth_rebuilds_views_and_stales_captured_ones() {
    let console = RecordingConsole::new();
    let instance = instance(console.clone());
    let captured = instance.host().views().generation();
    let stale = View::<u8>::bind(&*instance.memory());

    // Allocate past the end of the first page; the module grows and notifies.
    let ptr = instance.malloc(PAGE_SIZE as i32).unwrap();
    assert_eq!(ptr, HEAP_BASE);
    assert_eq!(instance.memory_byte_length(), 2 * PAGE_SIZE);
    assert_ne!(instance.host().views().generation(), captured);

    instance.write_memory(PAGE_SIZE + 16, b"LATE\0").unwrap();
    let memory = instance.memory();
    assert_eq!(
        stale.get(&*memory, PAGE_SIZE + 16),
        Err(HostError::StaleView { view: 0, current: 1 })
    );
    let fresh = View::<u8>::bind(&*memory);
    assert_eq!(fresh.get(&*memory, PAGE_SIZE + 16).unwrap(), b'L');
    drop(memory);

    instance
        .host()
        .print_ascii_buffer(&*instance.memory(), (PAGE_SIZE + 16) as i32)
        .unwrap();
    assert_eq!(console.messages(ConsoleLevel::Log), vec!["LATE".to_string()]);
    assert_eq!(
        console.messages(ConsoleLevel::Info),
        vec![format!("gb.wasm: Memory Grow: {}", 2 * PAGE_SIZE)]
    );
}

#[test]
fn test_clock_writes_into_grown_region() {
    let instance = instance(RecordingConsole::new());
    instance.grow(1);
    let ptr = (PAGE_SIZE + 40) as i32;
    {
        let mut memory = instance.memory().clone();
        assert_eq!(instance.host().clock_gettime(&mut memory, 0, ptr).unwrap(), 0);
        let words = View::<i32>::bind(&memory);
        assert_eq!(words.get(&memory, (PAGE_SIZE + 40) / 4).unwrap(), 0);
        assert_eq!(words.get(&memory, (PAGE_SIZE + 44) / 4).unwrap(), 7_000_000);
    }
    assert_eq!(instance.memory().generation(), 1);
}
