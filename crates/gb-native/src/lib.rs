//! GB Native - run the emulator module on wasmtime
//!
//! Plugs wasmtime into the `gb-host` bridge:
//! - [`NativeRuntime`] compiles the module and links every import it
//!   declares to the host function table
//! - [`NativeInstance`] wraps the instantiated module's exports
//! - [`FileArtifact`] reads the module binary from disk
//! - [`logging`] sets up the tracing subscriber for the binaries

pub mod artifact;
pub mod engine;
pub mod instance;
pub mod logging;

use std::path::PathBuf;

use gb_host::{HostConfig, HostFunctionTable, InstanceManager, ModuleLoader};

pub use artifact::FileArtifact;
pub use engine::{HostState, NativeRuntime};
pub use instance::NativeInstance;

/// The shared instance handle for a natively hosted module
pub type NativeManager = InstanceManager<NativeInstance>;

/// Instance manager loading the module at `path` with wasmtime
pub fn instance_manager(path: impl Into<PathBuf>, host: HostFunctionTable) -> NativeManager {
    let loader = ModuleLoader::new(FileArtifact::new(path), NativeRuntime::new());
    InstanceManager::new(loader, host)
}

/// Instance manager for the module and export names in `config`
pub fn configured_manager(config: &HostConfig, host: HostFunctionTable) -> NativeManager {
    let runtime = NativeRuntime::with_exports(config.exports.clone());
    let loader = ModuleLoader::new(FileArtifact::new(&config.artifact), runtime);
    InstanceManager::new(loader, host)
}
