//! # bucketfs-kernel
//!
//! One path hierarchy over many S3-compatible buckets.
//!
//! Each mount maps a virtual prefix (`/docs`, `/team/media`) to a bucket,
//! an optional key prefix, and credentials. Callers work with virtual paths
//! and never see which backend holds what:
//!
//! - Paths above the mounts list as synthetic directories
//! - Paths inside a mount become prefix/delimiter `LIST` calls, cached per
//!   mount with a TTL and invalidated by mutations
//! - Large uploads run through a multipart coordinator that never leaves a
//!   dangling upload or metadata row behind after an abort
//!
//! Object storage sits behind [`ObjectStore`]; [`MemoryObjectStore`] is a
//! complete in-process implementation for tests and local use.

pub mod cache;
pub mod config;
pub mod file_db;
pub mod multipart;
pub mod registry;
pub mod store;
pub mod vfs;

pub use cache::{CacheConfig, CacheKey, CacheStats, DirectoryCache};
pub use config::{BucketfsConfig, ConfigParts, FsConfig, MountEntry, MultipartConfig, StorageEntry};
pub use file_db::{FileDb, FileMetadataStore, FileRecord, FileStatus, NewFile};
pub use multipart::{
    AbortOutcome, CompleteOutcome, MultipartCoordinator, MultipartSession, RetryPolicy,
};
pub use registry::{
    CredentialCipher, MemoryMountRegistry, MemoryStorageConfigStore, MountRegistry,
    PlaintextCipher, StorageConfigStore,
};
pub use store::{
    CompletedPart, Credentials, ListPage, ListRequest, MemoryConnector, MemoryObjectStore,
    ObjectData, ObjectMeta, ObjectStore, ObjectSummary, PartSummary, StoreConnector, StoreError,
    StoreOp, StoreResult,
};
pub use vfs::{
    BatchFailure, BatchRemoveResult, Disposition, ErrorKind, FileContent, Filesystem,
    FilesystemContext, MountResolver, ResolvedLocation, UploadResult, VfsError, VfsResult,
};
