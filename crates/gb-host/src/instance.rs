//! The shared module instance
//!
//! [`InstanceManager`] owns the one load of the module. The load starts the
//! first time anyone asks for the instance; every caller, concurrent or
//! later, awaits the same shared future and sees the same outcome.

use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture, Shared};

use crate::error::{HostError, Result};
use crate::host::{GrowthObservation, HostFunctionTable};
use crate::loader::{ArtifactSource, ModuleLoader, ModuleRuntime};
use crate::render::TargetId;

/// The exports of an instantiated module
///
/// Calls are synchronous; the module may call back into the host function
/// table (and grow its memory) during any of them.
pub trait ModuleInstance {
    /// Run the host's growth handler against the instance's memory
    fn notify_memory_growth(&self, memory_index: i32) -> Result<()>;

    /// Current size of the instance's linear memory in bytes
    fn memory_byte_length(&self) -> usize;

    /// Copy `bytes` into linear memory at `offset`
    fn write_memory(&self, offset: usize, bytes: &[u8]) -> Result<()>;

    fn malloc(&self, size: i32) -> Result<i32>;

    fn free(&self, ptr: i32) -> Result<()>;

    /// `createEmulator(romPtr, targetId) -> handle`
    fn create_emulator(&self, rom_ptr: i32, target: TargetId) -> Result<i32>;

    /// `runFrame(handle)`; `false` once the emulator wants to stop
    fn run_frame(&self, handle: i32) -> Result<bool>;
}

type SharedLoad<I> = Shared<LocalBoxFuture<'static, Result<Rc<I>>>>;

/// Lazily loads the module once and hands out the shared instance
pub struct InstanceManager<I: ModuleInstance + 'static> {
    load: SharedLoad<I>,
    growth: GrowthObservation,
    location: String,
}

impl<I: ModuleInstance + 'static> InstanceManager<I> {
    /// Prepare (but do not start) the load of `loader` wired to `host`
    pub fn new<S, R>(loader: ModuleLoader<S, R>, host: HostFunctionTable) -> Self
    where
        S: ArtifactSource + 'static,
        R: ModuleRuntime<Instance = I> + 'static,
    {
        let growth = host.growth();
        let location = loader.source().location().to_string();
        let not_loaded = location.clone();
        let load = async move {
            let instance = loader
                .load(host)
                .await?
                .ok_or(HostError::NotLoaded { location: not_loaded })?;
            // Build the views before anything else touches memory.
            instance.notify_memory_growth(0)?;
            Ok(Rc::new(instance))
        }
        .boxed_local()
        .shared();

        Self {
            load,
            growth,
            location,
        }
    }

    /// The instance, loading it on first use
    pub async fn instance(&self) -> Result<Rc<I>> {
        let outcome = self.load.clone().await;
        if let Err(err) = &outcome {
            tracing::debug!(target: "gb_host::instance", location = %self.location, %err, "instance unavailable");
        }
        outcome
    }

    /// The outcome of the load, if it has already finished
    pub fn try_instance(&self) -> Option<Result<Rc<I>>> {
        self.load.peek().cloned()
    }

    /// Timestamp of the most recent memory growth, 0 if none yet
    pub fn memory_grow_timestamp(&self) -> u64 {
        self.growth.last_timestamp()
    }

    /// Where the module is loaded from
    pub fn location(&self) -> &str {
        &self.location
    }
}
