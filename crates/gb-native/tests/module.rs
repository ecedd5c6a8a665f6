//! Running the WAT emulator module on wasmtime through the host bridge

mod common;

use std::rc::Rc;

use common::{read_word, Harness, CLOCK_MILLIS, EMULATOR_WAT, FRAMEBUFFER_PTR, HEAP_BASE, TIMESPEC_PTR};
use futures::executor::block_on;
use gb_host::console::ConsoleLevel;
use gb_host::memory::PAGE_SIZE;
use gb_host::render::RGBA_LEN;
use gb_host::{HostError, ModuleInstance, Session};

#[test]
fn test_instance_starts_with_silent_growth_notification() {
    let harness = Harness::new(EMULATOR_WAT);
    assert_eq!(harness.manager.memory_grow_timestamp(), 0);

    let instance = block_on(harness.manager.instance()).unwrap();
    assert_eq!(instance.memory_byte_length(), PAGE_SIZE);
    assert_eq!(harness.manager.memory_grow_timestamp(), CLOCK_MILLIS);
    assert_eq!(instance.with_host(|host| host.views().rebuild_count()), 1);
    assert!(harness.console.is_empty());
}

#[test]
fn test_boot_and_run_until_the_module_stops() {
    let harness = Harness::new(EMULATOR_WAT);
    let instance = block_on(harness.manager.instance()).unwrap();

    let mut rom = vec![0u8; 70_000];
    rom[0] = 0x10;
    let mut session = Session::boot(Rc::clone(&instance), &rom, 7).unwrap();
    assert_eq!(session.rom_ptr(), HEAP_BASE);
    assert_eq!(session.handle(), 1);
    assert_eq!(instance.memory_byte_length(), 2 * PAGE_SIZE);
    assert_eq!(
        harness.console.messages(ConsoleLevel::Info),
        vec!["gb.wasm: Memory Grow: 131072"]
    );
    assert_eq!(instance.read_memory(HEAP_BASE as usize, 1).unwrap(), vec![0x10]);

    assert_eq!(session.run(None).unwrap(), 3);
    assert!(!session.is_running());
    assert_eq!(harness.console.messages(ConsoleLevel::Log), vec!["HELLO"; 3]);

    let frame = harness.capture.last_frame().unwrap();
    assert_eq!(harness.capture.frames_presented(), 3);
    assert_eq!(frame.target, 7);
    assert_eq!(frame.rgba.len(), RGBA_LEN);
    assert!(frame.rgba.chunks_exact(4).all(|pixel| pixel == [0x12, 0x12, 0x12, 0xFF]));
    assert_eq!(instance.read_memory(FRAMEBUFFER_PTR, 1).unwrap(), vec![0x12]);

    assert_eq!(read_word(&instance, TIMESPEC_PTR), 1_700_000);
    assert_eq!(read_word(&instance, TIMESPEC_PTR + 4), 123_000_000);
}

#[test]
fn test_growth_through_export_rebuilds_views() {
    let harness = Harness::new(EMULATOR_WAT);
    let instance = block_on(harness.manager.instance()).unwrap();

    assert_eq!(instance.invoke("grow", &[1]).unwrap(), None);
    assert_eq!(instance.memory_byte_length(), 2 * PAGE_SIZE);
    assert_eq!(instance.with_host(|host| host.views().rebuild_count()), 2);
    assert_eq!(
        harness.console.messages(ConsoleLevel::Info),
        vec!["gb.wasm: Memory Grow: 131072"]
    );

    // Past the end of the original page.
    instance.write_memory(70_000, b"GROWN\0").unwrap();
    instance.invoke("print", &[70_000]).unwrap();
    assert_eq!(harness.console.messages(ConsoleLevel::Log), vec!["GROWN"]);
}

#[test]
fn test_unsupported_import_fails_the_call() {
    let harness = Harness::new(EMULATOR_WAT);
    let instance = block_on(harness.manager.instance()).unwrap();

    let err = instance.invoke("write_stdout", &[]).unwrap_err();
    assert_eq!(err, HostError::Unsupported { name: "fd_write" });
    let errors = harness.console.messages(ConsoleLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("fd_write"));

    let err = instance.invoke("exit", &[0]).unwrap_err();
    assert_eq!(err, HostError::Unsupported { name: "proc_exit" });
    assert_eq!(harness.console.messages(ConsoleLevel::Error).len(), 2);
}

#[test]
fn test_unterminated_string_is_not_logged() {
    let harness = Harness::new(EMULATOR_WAT);
    let instance = block_on(harness.manager.instance()).unwrap();

    instance.invoke("poison", &[60_000]).unwrap();
    let err = instance.invoke("print", &[60_000]).unwrap_err();
    assert_eq!(err, HostError::UnterminatedString { ptr: 60_000 });
    assert!(harness.console.messages(ConsoleLevel::Log).is_empty());
}

#[test]
fn test_instance_survives_a_failed_call() {
    let harness = Harness::new(EMULATOR_WAT);
    let instance = block_on(harness.manager.instance()).unwrap();

    assert!(instance.invoke("write_stdout", &[]).is_err());
    instance.invoke("print", &[16]).unwrap();
    assert_eq!(harness.console.messages(ConsoleLevel::Log), vec!["HELLO"]);
}

#[test]
fn test_out_of_bounds_write_is_rejected() {
    let harness = Harness::new(EMULATOR_WAT);
    let instance = block_on(harness.manager.instance()).unwrap();

    let err = instance.write_memory(PAGE_SIZE - 2, b"ABCD").unwrap_err();
    assert_eq!(
        err,
        HostError::OutOfBounds {
            offset: PAGE_SIZE - 2,
            len: 4,
            memory_len: PAGE_SIZE,
        }
    );
    assert!(instance.read_memory(PAGE_SIZE, 1).is_err());
}
