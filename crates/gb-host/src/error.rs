//! Host bridge errors
//!
//! Every failure the bridge can observe is a [`HostError`]. The type is
//! `Clone` so a single load outcome can be handed to every caller of the
//! shared instance handle.

use thiserror::Error;

/// Errors raised by the host bridge and its backends
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The artifact could not be fetched at all (transport failure)
    #[error("failed to fetch wasm binary file at {location}: {message}")]
    Fetch { location: String, message: String },

    /// The artifact was fetched but the response was not successful
    #[error("WASM was not loaded from {location}")]
    NotLoaded { location: String },

    /// The artifact is not a valid module
    #[error("failed to compile wasm module: {0}")]
    Compile(String),

    /// The module could not be linked against the host function table
    #[error("failed to instantiate wasm module: {0}")]
    Instantiate(String),

    /// The module does not export something the host consumes
    #[error("wasm module does not export `{0}`")]
    MissingExport(String),

    /// The module called an import the host never supports
    #[error("unsupported host import `{name}` was called")]
    Unsupported { name: &'static str },

    /// `printAsciiBuffer` was handed a string without a zero terminator
    #[error("string at 0x{ptr:08X} is not null-terminated before the end of linear memory")]
    UnterminatedString { ptr: u32 },

    /// An access fell outside the current linear memory
    #[error("access of {len} bytes at 0x{offset:08X} exceeds linear memory ({memory_len} bytes)")]
    OutOfBounds {
        offset: usize,
        len: usize,
        memory_len: usize,
    },

    /// A view captured before a growth was used after it
    #[error("memory view from generation {view} used after growth to generation {current}")]
    StaleView { view: u64, current: u64 },

    /// The module trapped while running an export
    #[error("wasm trap: {0}")]
    Trap(String),
}

impl HostError {
    /// True for errors that mean the module and host disagree about the ABI
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            HostError::Unsupported { .. } | HostError::UnterminatedString { .. }
        )
    }
}

/// Result alias used across the bridge
pub type Result<T> = std::result::Result<T, HostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_violations() {
        assert!(HostError::Unsupported { name: "fd_write" }.is_protocol_violation());
        assert!(HostError::UnterminatedString { ptr: 4 }.is_protocol_violation());
        assert!(!HostError::Compile("bad magic".into()).is_protocol_violation());
    }

    #[test]
    fn test_display() {
        let err = HostError::Unsupported { name: "proc_exit" };
        assert_eq!(err.to_string(), "unsupported host import `proc_exit` was called");

        let err = HostError::OutOfBounds {
            offset: 0x10,
            len: 4,
            memory_len: 8,
        };
        assert_eq!(
            err.to_string(),
            "access of 4 bytes at 0x00000010 exceeds linear memory (8 bytes)"
        );
    }
}
