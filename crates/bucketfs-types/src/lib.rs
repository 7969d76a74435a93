//! # bucketfs-types
//!
//! Shared data model for bucketfs: mounts, storage configurations, callers,
//! and the listing/info shapes returned by the filesystem facade.
//!
//! These types are owned by external collaborators (mount registry, storage
//! config store) or returned to callers over the wire, so they are all
//! serde-serializable with camelCase field names.

mod caller;
mod listing;
mod mount;

pub use caller::{Caller, CallerKind};
pub use listing::{FileInfo, Item, ListingResult};
pub use mount::{EncryptedCredentials, Mount, StorageConfig};
