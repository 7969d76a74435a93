//! Filesystem error types.

use std::io;

use strum::{AsRefStr, Display};
use thiserror::Error;

use crate::store::StoreError;

/// Coarse error classification exposed to callers (HTTP, WebDAV).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Unauthorized,
    BadRequest,
    InternalIo,
}

/// Filesystem error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Mount, storage config, parent directory, or target not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Source and target resolve to different mounts.
    #[error("cross-mount operation not supported: {from} -> {to}")]
    CrossMount { from: String, to: String },

    /// Source is a file and target a directory, or the reverse.
    #[error("source and target types differ: {from} -> {to}")]
    TypeMismatch { from: String, to: String },

    /// The caller may not access the path.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed or disallowed path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Request arguments rejected before reaching storage.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Path is not inside any mount visible to the caller.
    #[error("no mount point for path: {0}")]
    NoMountPoint(String),

    /// Object storage failure.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// File metadata store failure.
    #[error("metadata store error: {0}")]
    Metadata(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a BadRequest error.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Create a NoMountPoint error.
    pub fn no_mount_point(path: impl Into<String>) -> Self {
        Self::NoMountPoint(path.into())
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Classify this error. Anything that is not a recognized domain
    /// condition is `InternalIo`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VfsError::NotFound(_) | VfsError::NoMountPoint(_) => ErrorKind::NotFound,
            VfsError::AlreadyExists(_)
            | VfsError::CrossMount { .. }
            | VfsError::TypeMismatch { .. } => ErrorKind::Conflict,
            VfsError::Unauthorized(_) => ErrorKind::Unauthorized,
            VfsError::InvalidPath(_) | VfsError::BadRequest(_) => ErrorKind::BadRequest,
            VfsError::Storage(StoreError::InvalidRequest(_)) => ErrorKind::BadRequest,
            VfsError::Storage(_) | VfsError::Metadata(_) | VfsError::Io(_) | VfsError::Other(_) => {
                ErrorKind::InternalIo
            }
        }
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) | VfsError::NoMountPoint(msg) => {
                io::Error::new(io::ErrorKind::NotFound, msg)
            }
            VfsError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            VfsError::Unauthorized(msg) => io::Error::new(io::ErrorKind::PermissionDenied, msg),
            VfsError::InvalidPath(msg) | VfsError::BadRequest(msg) => {
                io::Error::new(io::ErrorKind::InvalidInput, msg)
            }
            other @ VfsError::CrossMount { .. } => {
                io::Error::new(io::ErrorKind::CrossesDevices, other.to_string())
            }
            VfsError::Io(e) => e,
            other => io::Error::other(other.to_string()),
        }
    }
}

/// Filesystem result type.
pub type VfsResult<T> = Result<T, VfsError>;
