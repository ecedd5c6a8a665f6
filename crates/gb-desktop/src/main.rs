//! GB Desktop - the emulator module in a window
//!
//! Frames the module presents through `renderCanvas` are packed into a
//! minifb buffer and shown at an integer scale.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use futures::executor::block_on;
use gb_host::config::DEFAULT_ARTIFACT;
use gb_host::render::{TargetId, FRAME_LEN, SCREEN_HEIGHT, SCREEN_WIDTH};
use gb_host::{HostConfig, HostFunctionTable, RenderTarget, Session};
use gb_native::logging::{init_logging, LogLevel};
use minifb::{Key, Window, WindowOptions};

/// Game Boy emulator module desktop app
#[derive(Parser, Debug)]
#[command(name = "gb-desktop")]
#[command(about = "Run the Game Boy emulator module in a window", long_about = None)]
struct Args {
    /// Path to the emulator wasm module
    #[arg(short, long, default_value = DEFAULT_ARTIFACT)]
    module: PathBuf,

    /// Path to the Game Boy ROM file
    #[arg(short, long)]
    rom: PathBuf,

    /// Screen scale factor (1-4)
    #[arg(short, long, default_value = "3")]
    scale: usize,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    log_level: LogLevel,
}

/// The window's pixel buffer, in minifb's 0RGB layout
struct WindowTarget {
    pixels: Vec<u32>,
    presented: u64,
}

impl WindowTarget {
    fn new() -> Self {
        Self {
            pixels: vec![0; FRAME_LEN],
            presented: 0,
        }
    }
}

impl RenderTarget for WindowTarget {
    fn present(&mut self, _target: TargetId, rgba: &[u8]) {
        for (pixel, rgba) in self.pixels.iter_mut().zip(rgba.chunks_exact(4)) {
            *pixel = pack_0rgb(rgba[0], rgba[1], rgba[2]);
        }
        self.presented += 1;
    }
}

fn pack_0rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}

fn main() {
    let args = Args::parse();
    init_logging(args.log_level);

    let rom_data = match fs::read(&args.rom) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Failed to read ROM file: {}", e);
            std::process::exit(1);
        }
    };

    let config = HostConfig::with_artifact(args.module.display().to_string());
    let target = Rc::new(RefCell::new(WindowTarget::new()));
    let manager = gb_native::configured_manager(&config, HostFunctionTable::new(Rc::clone(&target)));

    let instance = match block_on(manager.instance()) {
        Ok(instance) => instance,
        Err(e) => {
            eprintln!("Failed to load module: {}", e);
            std::process::exit(1);
        }
    };

    let mut session = match Session::boot(instance, &rom_data, config.target) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Failed to boot ROM: {}", e);
            std::process::exit(1);
        }
    };

    let scale = args.scale.clamp(1, 4);
    let mut window = match Window::new(
        "Game Boy",
        SCREEN_WIDTH * scale,
        SCREEN_HEIGHT * scale,
        WindowOptions {
            resize: false,
            ..WindowOptions::default()
        },
    ) {
        Ok(window) => window,
        Err(e) => {
            eprintln!("Failed to create window: {}", e);
            std::process::exit(1);
        }
    };
    window.set_target_fps(60);

    println!("Starting emulation of {}...", args.rom.display());
    println!("Press ESC or close the window to exit.");

    while window.is_open() && !window.is_key_down(Key::Escape) && session.is_running() {
        if let Err(e) = session.run_frame() {
            if e.is_protocol_violation() {
                eprintln!("Emulator module broke the host ABI: {}", e);
            } else {
                eprintln!("Error running emulator: {}", e);
            }
            std::process::exit(1);
        }

        let screen = target.borrow();
        if let Err(e) = window.update_with_buffer(&screen.pixels, SCREEN_WIDTH, SCREEN_HEIGHT) {
            tracing::error!("failed to update window: {e}");
            break;
        }
    }

    println!(
        "Emulator closed after {} frames ({} presented).",
        session.frame_count(),
        target.borrow().presented
    );
}
