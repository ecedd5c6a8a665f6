//! Module binaries on the local filesystem

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use gb_host::{ArtifactSource, FetchResponse, HostError, Result};

/// A module binary read from disk
///
/// A missing or unreadable file is an unsuccessful response (404 / 403), the
/// same soft failure an HTTP host would see; other I/O errors are transport
/// failures.
#[derive(Debug, Clone)]
pub struct FileArtifact {
    path: PathBuf,
    location: String,
}

impl FileArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let location = path.display().to_string();
        Self { path, location }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArtifactSource for FileArtifact {
    fn location(&self) -> &str {
        &self.location
    }

    async fn fetch(&self) -> Result<FetchResponse> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(FetchResponse::ok(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(FetchResponse::failed(404)),
            Err(err) if err.kind() == ErrorKind::PermissionDenied => Ok(FetchResponse::failed(403)),
            Err(err) => Err(HostError::Fetch {
                location: self.location.clone(),
                message: err.to_string(),
            }),
        }
    }
}
