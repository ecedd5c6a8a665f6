//! Host configuration

use crate::abi::ExportNames;
use crate::render::TargetId;

/// Default module path for native hosts, resolved at build time
pub const DEFAULT_ARTIFACT: &str = match option_env!("GB_WASM_PATH") {
    Some(path) => path,
    None => "gb.wasm",
};

/// Default module URL for browser hosts, resolved at build time
pub const DEFAULT_ARTIFACT_URL: &str = match option_env!("GB_WASM_URL") {
    Some(url) => url,
    None => "gb.wasm",
};

/// Where the module comes from and how its exports are named
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Path or URL of the module binary
    pub artifact: String,
    pub exports: ExportNames,
    /// Render target handed to `createEmulator` when none is chosen
    pub target: TargetId,
}

impl HostConfig {
    /// Defaults for a native host
    pub fn native() -> Self {
        Self::with_artifact(DEFAULT_ARTIFACT)
    }

    /// Defaults for a browser host
    pub fn web() -> Self {
        Self::with_artifact(DEFAULT_ARTIFACT_URL)
    }

    pub fn with_artifact(artifact: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            exports: ExportNames::default(),
            target: 0,
        }
    }

    pub fn target(mut self, target: TargetId) -> Self {
        self.target = target;
        self
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::native()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.artifact, DEFAULT_ARTIFACT);
        assert_eq!(config.target, 0);
        assert_eq!(config.exports.run_frame[0], "runFrame");
    }

    #[test]
    fn test_builder() {
        let config = HostConfig::with_artifact("roms/gb.wasm").target(3);
        assert_eq!(config.artifact, "roms/gb.wasm");
        assert_eq!(config.target, 3);
    }
}
