//! The unified virtual filesystem.
//!
//! Key components:
//!
//! - [`MountResolver`] - Routes virtual paths to mounts by longest prefix
//! - [`virtual_dir::compose`] - Listings for paths above the mounts
//! - [`DirectoryLister`] - Delimiter listings against a mount's bucket
//! - [`Filesystem`] - The public operation surface
//!
//! ## Design Decisions
//!
//! - **Trailing slash marks directories**: `/docs/` is a directory,
//!   `/docs/readme.txt` a file. Object storage has no directories; they are
//!   key prefixes, optionally with a zero-byte marker object.
//! - **Per-caller view**: every operation resolves against the mounts the
//!   caller can see, fetched fresh from the registry.
//! - **Fresh credentials**: storage configs are loaded and decrypted per
//!   operation and never cached.

pub mod context;
mod error;
mod filesystem;
pub mod keys;
mod lister;
pub mod mime;
pub mod paths;
pub mod resolver;
pub mod virtual_dir;

pub use context::{FilesystemContext, MountBackend};
pub use error::{ErrorKind, VfsError, VfsResult};
pub use filesystem::{
    BatchFailure, BatchRemoveResult, Disposition, FileContent, Filesystem, UploadResult,
};
pub use lister::{DirectoryLister, build_listing};
pub use resolver::{MountResolver, ResolvedLocation};
