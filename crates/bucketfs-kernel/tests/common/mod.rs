//! Shared setup: a filesystem over an in-memory object store.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bucketfs_kernel::{
    CacheConfig, DirectoryCache, FileDb, Filesystem, FilesystemContext, FsConfig,
    MemoryConnector, MemoryMountRegistry, MemoryObjectStore, MemoryStorageConfigStore,
    PlaintextCipher, RetryPolicy,
};
use bucketfs_types::{Caller, Mount, StorageConfig};

pub const BUCKET: &str = "bucket";
pub const MIB: u64 = 1024 * 1024;

pub struct Harness {
    pub fs: Filesystem,
    pub store: Arc<MemoryObjectStore>,
    pub registry: Arc<MemoryMountRegistry>,
    pub configs: Arc<MemoryStorageConfigStore>,
    pub files: Arc<FileDb>,
    pub cache: Arc<DirectoryCache>,
}

/// One mount per `(id, prefix, ttl)`, each on its own storage config in
/// the same bucket under `root/<id>/`.
pub fn harness(mounts: &[(&str, &str, u64)]) -> Harness {
    let store = Arc::new(MemoryObjectStore::new());
    let configs = Arc::new(MemoryStorageConfigStore::default());
    let registry = Arc::new(MemoryMountRegistry::default());
    for (sort_order, (id, prefix, ttl)) in mounts.iter().enumerate() {
        let cfg = format!("cfg-{}", id);
        configs.insert(
            StorageConfig::new(&cfg, BUCKET)
                .with_root_prefix("root")
                .with_default_folder(*id),
        );
        let mut mount = Mount::new(*id, *prefix, cfg).with_cache_ttl(*ttl);
        mount.sort_order = sort_order as i32;
        registry.add_mount(mount);
    }

    let files = Arc::new(FileDb::in_memory().unwrap());
    let cache = Arc::new(DirectoryCache::new(CacheConfig::default()));
    let ctx = FilesystemContext {
        registry: registry.clone(),
        storage_configs: configs.clone(),
        cipher: Arc::new(PlaintextCipher),
        connector: Arc::new(MemoryConnector::new(store.clone())),
        cache: cache.clone(),
        files: files.clone(),
        config: FsConfig {
            multipart_threshold: 2 * MIB,
            min_part_size: MIB,
            abort_policy: RetryPolicy::new(3, Duration::from_millis(200)),
        },
    };

    Harness {
        fs: Filesystem::new(ctx),
        store,
        registry,
        configs,
        files,
        cache,
    }
}

pub fn admin() -> Caller {
    Caller::admin("root")
}

/// Object key for a file under a mount created by [`harness`].
pub fn key(mount_id: &str, rest: &str) -> String {
    format!("root/{}/{}", mount_id, rest)
}

pub fn names(listing: &bucketfs_types::ListingResult) -> Vec<String> {
    let mut names: Vec<String> = listing.items.iter().map(|i| i.name.clone()).collect();
    names.sort();
    names
}
