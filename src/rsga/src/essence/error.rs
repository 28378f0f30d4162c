use thiserror::Error;

pub type FsResult<T> = std::result::Result<T, FsError>;

/// Filesystem-level failures. Every variant carries the path (or alias)
/// the operation was invoked with, not a normalized form of it.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("expected a file: {0}")]
    FileExpected(String),

    #[error("expected a directory: {0}")]
    DirectoryExpected(String),

    #[error("file already exists: {0}")]
    FileExists(String),

    #[error("directory already exists: {0}")]
    DirectoryExists(String),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("cannot remove the root directory: {0}")]
    RemoveRoot(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("cannot write to a lazy file before it is promoted: {0}")]
    ReadOnlyLazyFile(String),

    #[error("drive alias already exists: {0}")]
    DriveExists(String),

    #[error("filesystem has no drive to write to: {0}")]
    NoDrive(String),

    #[error("an alias is required when multiple drives exist: {0}")]
    AmbiguousDrive(String),

    #[error(transparent)]
    Archive(#[from] crate::archive::Error),
}

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> FsError {
        FsError::Archive(err.into())
    }
}
