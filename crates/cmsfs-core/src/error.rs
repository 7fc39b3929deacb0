//! Error types for `cmsfs-core`.
//!
//! All fallible operations in the core library return [`CoreResult<T>`],
//! which is an alias for `Result<T, CoreError>`.

use std::path::{Path, PathBuf};

/// Unified error type for all core operations.
///
/// Each variant captures just enough context for the caller to display
/// a meaningful message or take corrective action.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The target path does not exist.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// The process lacks permission to access the path.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// A file was expected but the path points to a directory.
    #[error("is a directory: {0}")]
    IsADirectory(PathBuf),

    /// A path is invalid (empty, absolute, escapes the root, etc.).
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// A file could not be created on disk.
    #[error("file {0} could not be created")]
    CreateFailed(PathBuf),

    /// Failed to parse a TOML configuration file.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// An image could not be decoded, probed or written.
    #[error("image error: {0}")]
    Image(String),

    /// The file index could not be read or updated.
    #[error("sync error: {0}")]
    Sync(String),

    /// An I/O error that doesn't fit a more specific variant.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Maps an I/O error on `path` to the most specific variant.
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => CoreError::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => CoreError::PermissionDenied(path.to_path_buf()),
            _ => CoreError::Io(err),
        }
    }
}

/// Convenience alias used throughout `cmsfs-core`.
pub type CoreResult<T> = Result<T, CoreError>;
