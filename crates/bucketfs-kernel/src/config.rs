//! Configuration model.
//!
//! Deserialized from TOML by the CLI:
//!
//! ```toml
//! [cache]
//! max_entries = 1000
//!
//! [multipart]
//! threshold_bytes = 67108864
//!
//! [[storage]]
//! id = "r2"
//! bucket = "files"
//! endpoint = "https://example.r2.cloudflarestorage.com"
//! access_key_id = "..."
//! secret_access_key = "..."
//!
//! [[mounts]]
//! id = "docs"
//! prefix = "/docs"
//! storage = "r2"
//! cache_ttl_seconds = 60
//! ```

use std::collections::HashSet;
use std::time::Duration;

use bucketfs_types::{EncryptedCredentials, Mount, StorageConfig};
use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::multipart::RetryPolicy;
use crate::registry::{MemoryMountRegistry, MemoryStorageConfigStore};
use crate::vfs::{VfsError, VfsResult, paths};

const MIB: u64 = 1024 * 1024;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketfsConfig {
    pub cache: CacheConfig,
    pub multipart: MultipartConfig,
    pub storage: Vec<StorageEntry>,
    pub mounts: Vec<MountEntry>,
}

/// Multipart upload tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultipartConfig {
    /// Uploads of at least this many bytes go through multipart.
    pub threshold_bytes: u64,
    pub min_part_size: u64,
    pub abort_max_attempts: u32,
    pub abort_base_delay_ms: u64,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            threshold_bytes: 64 * MIB,
            min_part_size: 5 * MIB,
            abort_max_attempts: 3,
            abort_base_delay_ms: 200,
        }
    }
}

/// One storage backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageEntry {
    pub id: String,
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub path_style: bool,
    pub root_prefix: String,
    pub default_folder: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub request_timeout_secs: Option<u64>,
}

impl Default for StorageEntry {
    fn default() -> Self {
        Self {
            id: String::new(),
            bucket: String::new(),
            endpoint: None,
            region: "auto".to_string(),
            path_style: false,
            root_prefix: String::new(),
            default_folder: String::new(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            request_timeout_secs: None,
        }
    }
}

impl From<StorageEntry> for StorageConfig {
    fn from(entry: StorageEntry) -> Self {
        StorageConfig {
            id: entry.id,
            bucket: entry.bucket,
            endpoint: entry.endpoint,
            region: entry.region,
            path_style: entry.path_style,
            root_prefix: entry.root_prefix,
            default_folder: entry.default_folder,
            credentials: EncryptedCredentials {
                access_key_id: entry.access_key_id,
                secret_access_key: entry.secret_access_key,
            },
            request_timeout_secs: entry.request_timeout_secs,
        }
    }
}

/// One mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountEntry {
    pub id: String,
    pub name: Option<String>,
    /// Virtual prefix, e.g. `/docs`.
    pub prefix: String,
    /// Storage entry id.
    pub storage: String,
    pub cache_ttl_seconds: u64,
    pub active: bool,
    pub sort_order: i32,
    /// API key ids granted access. Admins always see every active mount.
    pub grants: Vec<String>,
}

impl Default for MountEntry {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: None,
            prefix: String::new(),
            storage: String::new(),
            cache_ttl_seconds: 0,
            active: true,
            sort_order: 0,
            grants: Vec::new(),
        }
    }
}

/// Runtime settings for the filesystem and multipart coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct FsConfig {
    pub multipart_threshold: u64,
    pub min_part_size: u64,
    pub abort_policy: RetryPolicy,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self::from(&MultipartConfig::default())
    }
}

impl From<&MultipartConfig> for FsConfig {
    fn from(config: &MultipartConfig) -> Self {
        Self {
            multipart_threshold: config.threshold_bytes,
            min_part_size: config.min_part_size.max(1),
            abort_policy: RetryPolicy::new(
                config.abort_max_attempts,
                Duration::from_millis(config.abort_base_delay_ms),
            ),
        }
    }
}

/// In-memory collaborators built from a config file.
#[derive(Debug)]
pub struct ConfigParts {
    pub registry: MemoryMountRegistry,
    pub storage: MemoryStorageConfigStore,
    pub cache: CacheConfig,
    pub fs: FsConfig,
}

/// Mount prefix in canonical form: absolute, no trailing slash except `/`.
fn mount_prefix(prefix: &str) -> VfsResult<String> {
    let normalized = paths::normalize(prefix)?;
    Ok(paths::canonical_dir(&normalized))
}

impl BucketfsConfig {
    /// Validate and build the registry and storage-config store.
    ///
    /// Rejects duplicate ids, duplicate mount prefixes, and mounts that
    /// reference an unknown storage entry.
    pub fn into_parts(self) -> VfsResult<ConfigParts> {
        let mut storage_ids = HashSet::new();
        for entry in &self.storage {
            if entry.id.is_empty() || entry.bucket.is_empty() {
                return Err(VfsError::bad_request("storage entries need an id and a bucket"));
            }
            if !storage_ids.insert(entry.id.clone()) {
                return Err(VfsError::bad_request(format!("duplicate storage id {}", entry.id)));
            }
        }

        let mut mount_ids = HashSet::new();
        let mut prefixes = HashSet::new();
        let mut mounts = Vec::with_capacity(self.mounts.len());
        let mut grants = Vec::new();
        for entry in self.mounts {
            if !mount_ids.insert(entry.id.clone()) {
                return Err(VfsError::bad_request(format!("duplicate mount id {}", entry.id)));
            }
            if !storage_ids.contains(&entry.storage) {
                return Err(VfsError::bad_request(format!(
                    "mount {} references unknown storage {}",
                    entry.id, entry.storage
                )));
            }
            let prefix = mount_prefix(&entry.prefix)?;
            if !prefixes.insert(prefix.clone()) {
                return Err(VfsError::bad_request(format!("duplicate mount prefix {}", prefix)));
            }

            let mut mount = Mount::new(&entry.id, prefix, &entry.storage)
                .with_cache_ttl(entry.cache_ttl_seconds);
            mount.name = entry.name;
            mount.active = entry.active;
            mount.sort_order = entry.sort_order;
            grants.extend(entry.grants.into_iter().map(|key| (key, entry.id.clone())));
            mounts.push(mount);
        }

        let registry = MemoryMountRegistry::new(mounts);
        for (key, mount_id) in grants {
            registry.grant(&key, &mount_id);
        }

        Ok(ConfigParts {
            registry,
            storage: MemoryStorageConfigStore::new(self.storage.into_iter().map(StorageConfig::from)),
            cache: self.cache,
            fs: FsConfig::from(&self.multipart),
        })
    }
}
