//! GB CLI - run the emulator module headless

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::Parser;
use futures::executor::block_on;
use gb_host::config::DEFAULT_ARTIFACT;
use gb_host::render::{CapturedFrame, FrameCapture, SCREEN_HEIGHT, SCREEN_WIDTH};
use gb_host::{HostConfig, HostError, HostFunctionTable, ModuleInstance, Session};
use gb_native::logging::{init_logging, LogLevel};

/// Game Boy emulator module runner
#[derive(Parser, Debug)]
#[command(name = "gb-cli")]
#[command(about = "Run the Game Boy emulator module without a window", long_about = None)]
struct Args {
    /// Path to the emulator wasm module
    #[arg(short, long, default_value = DEFAULT_ARTIFACT)]
    module: PathBuf,

    /// Path to the Game Boy ROM file
    #[arg(short, long)]
    rom: PathBuf,

    /// Number of frames to run (0 runs until the emulator stops)
    #[arg(short, long, default_value = "60")]
    frames: u64,

    /// Render target id handed to the emulator
    #[arg(short, long, default_value = "0")]
    target: i32,

    /// Write the last frame to this file as a PAM image
    #[arg(short, long)]
    dump: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    log_level: LogLevel,
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

    let config = HostConfig::with_artifact(args.module.display().to_string()).target(args.target);
    let capture = FrameCapture::new();
    let manager = gb_native::configured_manager(&config, HostFunctionTable::new(capture.clone()));

    let instance = match block_on(manager.instance()) {
        Ok(instance) => instance,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("Failed to load module: {}", e);
            std::process::exit(1);
        }
    };

    let mut session = match Session::boot(Rc::clone(&instance), &rom_data, config.target) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Failed to boot ROM: {}", e);
            std::process::exit(1);
        }
    };

    println!("Loaded module {}", manager.location());
    println!("  Memory: {} bytes", instance.memory_byte_length());
    println!("  ROM: {} bytes at 0x{:08X}", rom_data.len(), session.rom_ptr());

    let budget = (args.frames > 0).then_some(args.frames);
    match budget {
        Some(frames) => println!("\nRunning {} frames...", frames),
        None => println!("\nRunning until the emulator stops..."),
    }

    if let Err(e) = session.run(budget) {
        eprintln!("{}", run_failure(&e));
        std::process::exit(1);
    }

    println!("Completed {} frames.", session.frame_count());
    if !session.is_running() {
        println!("The emulator asked to stop.");
    }
    println!("  Frames presented: {}", capture.frames_presented());
    println!("  Memory: {} bytes", instance.memory_byte_length());

    if let Some(path) = &args.dump {
        match capture.last_frame() {
            Some(frame) => {
                if let Err(e) = dump_frame(path, &frame) {
                    eprintln!("Failed to write {}: {}", path.display(), e);
                    std::process::exit(1);
                }
                println!("\nWrote frame for target {} to {}", frame.target, path.display());
            }
            None => println!("\nNo frame was presented; nothing to dump."),
        }
    }
}

/// Message for a failed frame; ABI violations mean the module and host are mismatched
fn run_failure(err: &HostError) -> String {
    if err.is_protocol_violation() {
        format!("Emulator module broke the host ABI: {}", err)
    } else {
        format!("Error running emulator: {}", err)
    }
}

/// Write `frame` as a PAM (P7) RGB_ALPHA image
fn dump_frame(path: &Path, frame: &CapturedFrame) -> std::io::Result<()> {
    let mut image = format!(
        "P7\nWIDTH {SCREEN_WIDTH}\nHEIGHT {SCREEN_HEIGHT}\nDEPTH 4\nMAXVAL 255\nTUPLTYPE RGB_ALPHA\nENDHDR\n"
    )
    .into_bytes();
    image.extend_from_slice(&frame.rgba);
    fs::write(path, image)
}
