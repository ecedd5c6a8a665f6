//! Emulator sessions
//!
//! A session is one emulator created inside the module: the ROM is copied
//! into a `malloc`ed buffer and handed to `createEmulator`. The module keeps
//! pointing at that buffer, so it is never freed.

use std::rc::Rc;

use crate::error::{HostError, Result};
use crate::instance::ModuleInstance;
use crate::render::TargetId;

/// One emulator running inside the module
pub struct Session<I: ModuleInstance> {
    instance: Rc<I>,
    handle: i32,
    rom_ptr: i32,
    target: TargetId,
    frames: u64,
    running: bool,
}

impl<I: ModuleInstance> Session<I> {
    /// Copy `rom` into linear memory and create an emulator presenting to `target`
    pub fn boot(instance: Rc<I>, rom: &[u8], target: TargetId) -> Result<Self> {
        let size = i32::try_from(rom.len())
            .map_err(|_| HostError::Trap(format!("ROM of {} bytes does not fit in wasm32", rom.len())))?;
        let rom_ptr = instance.malloc(size)?;
        if rom_ptr == 0 {
            return Err(HostError::Trap(format!("malloc({size}) returned a null pointer")));
        }
        instance.write_memory(rom_ptr as u32 as usize, rom)?;
        let handle = instance.create_emulator(rom_ptr, target)?;

        tracing::info!(
            target: "gb_host::session",
            rom_bytes = rom.len(),
            rom_ptr,
            handle,
            target,
            "emulator created"
        );

        Ok(Self {
            instance,
            handle,
            rom_ptr,
            target,
            frames: 0,
            running: true,
        })
    }

    /// Run one frame; returns whether the emulator wants to continue
    pub fn run_frame(&mut self) -> Result<bool> {
        if !self.running {
            return Ok(false);
        }
        self.running = self.instance.run_frame(self.handle)?;
        self.frames += 1;
        Ok(self.running)
    }

    /// Run until the emulator stops or `max_frames` frames have run
    ///
    /// Returns the number of frames run by this call.
    pub fn run(&mut self, max_frames: Option<u64>) -> Result<u64> {
        let start = self.frames;
        while max_frames.map_or(true, |max| self.frames - start < max) {
            if !self.run_frame()? {
                break;
            }
        }
        Ok(self.frames - start)
    }

    pub fn handle(&self) -> i32 {
        self.handle
    }

    pub fn rom_ptr(&self) -> i32 {
        self.rom_ptr
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    /// Frames run so far
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn instance(&self) -> &Rc<I> {
        &self.instance
    }
}
