use std::path::PathBuf;
use thiserror::Error;

use crate::provider::ProviderError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no device detected or no open session")]
    NoDevice,
    #[error("no storage available on device")]
    NoStorage,
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("illegal name: {0:?}")]
    IllegalName(String),
    #[error("local source not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("cannot create folder {0}: a file with that name exists")]
    CreateFolderConflict(String),
    #[error("rename of {path} to {expected:?} failed (device reports {actual:?})")]
    RenameFailed {
        path: String,
        expected: String,
        actual: String,
    },
    #[error("transfer of {path} failed: {source}")]
    TransferFailed {
        path: String,
        #[source]
        source: ProviderError,
    },
    #[error("nothing to transfer")]
    NothingToTransfer,
    #[error("tree below {0} is deeper than the configured maximum")]
    DepthExceeded(String),
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl Error {
    pub fn not_found(path: impl Into<String>) -> Self {
        Error::NotFound(path.into())
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Error::InvalidPath(path.into())
    }

    pub fn illegal_name(name: impl Into<String>) -> Self {
        Error::IllegalName(name.into())
    }
}
