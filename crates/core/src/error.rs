use std::io;
use std::path::{Path, PathBuf};

/// Failure of a filesystem primitive.
///
/// Only [`FsError::Io`] is fatal. The other two are absorbed into node state
/// (unknown kind, unreadable) everywhere except at the root of a listing.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("path not found or inaccessible: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FsError::NotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => FsError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, FsError::Io { .. })
    }

    pub fn path(&self) -> &Path {
        match self {
            FsError::NotFound { path }
            | FsError::PermissionDenied { path }
            | FsError::Io { path, .. } => path,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type FsResult<T> = Result<T, FsError>;
