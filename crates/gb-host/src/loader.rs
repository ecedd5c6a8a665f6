//! Module loading
//!
//! Loading is split along the two things that differ between hosts: where
//! the binary comes from ([`ArtifactSource`]) and which engine compiles and
//! instantiates it ([`ModuleRuntime`]). [`ModuleLoader`] strings them
//! together with the host function table.

use std::borrow::Cow;

use crate::error::Result;
use crate::host::HostFunctionTable;
use crate::instance::ModuleInstance;

/// A transport-level response for the artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Whether the transport reported success
    pub ok: bool,
    /// Transport status code (HTTP status, or 200/404 for local sources)
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            ok: true,
            status: 200,
            body,
        }
    }

    pub fn failed(status: u16) -> Self {
        Self {
            ok: false,
            status,
            body: Vec::new(),
        }
    }
}

/// Where the module binary comes from
#[allow(async_fn_in_trait)]
pub trait ArtifactSource {
    /// Human-readable location for diagnostics
    fn location(&self) -> &str;

    /// Retrieve the artifact; `Err` only for transport failures
    async fn fetch(&self) -> Result<FetchResponse>;
}

/// An artifact bundled into the host binary
#[derive(Debug, Clone)]
pub struct EmbeddedArtifact {
    name: String,
    bytes: Cow<'static, [u8]>,
}

impl EmbeddedArtifact {
    pub fn new(name: impl Into<String>, bytes: impl Into<Cow<'static, [u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

impl ArtifactSource for EmbeddedArtifact {
    fn location(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<FetchResponse> {
        Ok(FetchResponse::ok(self.bytes.to_vec()))
    }
}

/// An engine able to compile and instantiate the module
#[allow(async_fn_in_trait)]
pub trait ModuleRuntime {
    /// Compiled, not yet instantiated module
    type Module;
    type Instance: ModuleInstance;

    async fn compile(&self, binary: &[u8]) -> Result<Self::Module>;

    /// Instantiate `module` with `host` providing every import
    async fn instantiate(&self, module: Self::Module, host: HostFunctionTable) -> Result<Self::Instance>;
}

/// Fetches, compiles and instantiates the module
#[derive(Debug)]
pub struct ModuleLoader<S, R> {
    source: S,
    runtime: R,
}

impl<S: ArtifactSource, R: ModuleRuntime> ModuleLoader<S, R> {
    pub fn new(source: S, runtime: R) -> Self {
        Self { source, runtime }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Produce an instance wired to `host`
    ///
    /// An unsuccessful response is logged and yields `Ok(None)`. A transport
    /// failure is logged and returned, as are compile and instantiation
    /// failures.
    pub async fn load(&self, host: HostFunctionTable) -> Result<Option<R::Instance>> {
        let location = self.source.location();
        let response = match self.source.fetch().await {
            Ok(response) => response,
            Err(err) => {
                host.console()
                    .error(&format!("Failed to load wasm binary file at {location}: {err}"));
                return Err(err);
            }
        };
        if !response.ok {
            tracing::debug!(target: "gb_host::loader", status = response.status, "unsuccessful response");
            host.console()
                .error(&format!("Failed to load wasm binary file at {location}"));
            return Ok(None);
        }

        tracing::debug!(
            target: "gb_host::loader",
            bytes = response.body.len(),
            "fetched wasm binary file at {location}"
        );
        let module = self.runtime.compile(&response.body).await?;
        let instance = self.runtime.instantiate(module, host).await?;
        tracing::info!(target: "gb_host::loader", "instantiated {location}");
        Ok(Some(instance))
    }
}
