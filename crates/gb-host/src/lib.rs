//! GB Host - bridge between a Game Boy emulator module and its runtime
//!
//! The emulator itself is a precompiled wasm module. This crate is the host
//! side of its ABI:
//! - views over the module's growable linear memory (`memory`)
//! - the host function table the module imports (`host`, `abi`)
//! - the luminance framebuffer -> RGBA rendering path (`render`)
//! - loading the module once and sharing the instance (`loader`, `instance`)
//!
//! It contains no engine, WASM or web dependencies; `gb-native` and `gb-wasm`
//! plug real engines in through [`loader::ModuleRuntime`].

#![forbid(unsafe_code)]

/// Import/export surface of the module
pub mod abi;
/// Wall-clock sources
pub mod clock;
/// Host configuration
pub mod config;
/// Diagnostic sinks
pub mod console;
/// Error types
pub mod error;
/// The host function table
pub mod host;
/// Shared, lazily loaded module instance
pub mod instance;
/// Artifact sources and the module loader
pub mod loader;
/// Linear memory and typed views
pub mod memory;
/// Framebuffer rendering and render targets
pub mod render;
/// Emulator sessions inside a loaded module
pub mod session;

pub use config::HostConfig;
pub use error::{HostError, Result};
pub use host::{GrowthObservation, HostFunctionTable};
pub use instance::{InstanceManager, ModuleInstance};
pub use loader::{ArtifactSource, EmbeddedArtifact, FetchResponse, ModuleLoader, ModuleRuntime};
pub use memory::{LinearMemory, MemoryViews, View};
pub use render::{FrameRenderer, RenderTarget, TargetId};
pub use session::Session;
