//! Collaborators shared by the filesystem facade and the multipart
//! coordinator, and the per-operation storage handle built from them.

use std::sync::Arc;

use bucketfs_types::{Caller, Mount, StorageConfig};
use tracing::{debug, warn};

use super::error::{VfsError, VfsResult};
use super::keys;
use super::paths;
use super::resolver::MountResolver;
use crate::cache::DirectoryCache;
use crate::config::FsConfig;
use crate::file_db::FileMetadataStore;
use crate::registry::{CredentialCipher, MountRegistry, StorageConfigStore};
use crate::store::{ListRequest, ObjectStore, StoreConnector};

/// Everything a filesystem operation needs. Cheap to clone.
#[derive(Clone)]
pub struct FilesystemContext {
    pub registry: Arc<dyn MountRegistry>,
    pub storage_configs: Arc<dyn StorageConfigStore>,
    pub cipher: Arc<dyn CredentialCipher>,
    pub connector: Arc<dyn StoreConnector>,
    pub cache: Arc<DirectoryCache>,
    pub files: Arc<dyn FileMetadataStore>,
    pub config: FsConfig,
}

impl std::fmt::Debug for FilesystemContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilesystemContext")
            .field("cache", &self.cache.stats())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FilesystemContext {
    /// Resolver over the mounts visible to `caller`.
    pub async fn resolver(&self, caller: &Caller) -> VfsResult<MountResolver> {
        let mounts = self.registry.list_accessible_mounts(caller).await?;
        Ok(MountResolver::new(mounts))
    }

    /// Load the mount's storage config, decrypt its credentials, and
    /// connect. Nothing here is cached between operations.
    pub async fn backend(&self, mount: &Mount) -> VfsResult<MountBackend> {
        let config = self
            .storage_configs
            .get_storage_config(&mount.storage_config_ref)
            .await?
            .ok_or_else(|| {
                VfsError::not_found(format!("storage config {}", mount.storage_config_ref))
            })?;
        let credentials = self.cipher.decrypt_credentials(&config.credentials)?;
        let store = self.connector.connect(&config, &credentials).await?;
        Ok(MountBackend { config, store })
    }

    /// Record mount activity. Failures are logged, not surfaced.
    pub async fn touch_mount(&self, mount_id: &str) {
        if let Err(e) = self.registry.update_mount_last_used(mount_id).await {
            warn!("failed to update last-used time for mount {}: {}", mount_id, e);
        }
    }

    /// Drop cached listings that show `sub_path` as an entry: its parent
    /// directory and every ancestor of it.
    pub fn invalidate_parent(&self, mount_id: &str, sub_path: &str) {
        let parent = paths::parent(sub_path);
        let count = if paths::is_root(&parent) {
            usize::from(self.cache.invalidate(mount_id, "/"))
        } else {
            self.cache.invalidate_path_and_ancestors(mount_id, &parent)
        };
        debug!("invalidated {} cached listings above {}:{}", count, mount_id, sub_path);
    }
}

/// Storage config and connected client for one mount.
#[derive(Clone)]
pub struct MountBackend {
    pub config: StorageConfig,
    pub store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for MountBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountBackend")
            .field("bucket", &self.config.bucket)
            .finish_non_exhaustive()
    }
}

impl MountBackend {
    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// Object key for a sub-path.
    pub fn key(&self, sub_path: &str) -> String {
        keys::object_key(&self.config, sub_path)
    }

    /// Listing prefix for a directory sub-path.
    pub fn dir_prefix(&self, sub_path: &str) -> String {
        keys::directory_prefix(&self.config, sub_path)
    }

    /// Whether a directory exists: the mount root always does; any other
    /// directory exists when at least one object (a marker counts) has its
    /// prefix.
    pub async fn directory_exists(&self, sub_path: &str) -> VfsResult<bool> {
        if paths::is_root(sub_path) {
            return Ok(true);
        }
        let request = ListRequest::recursive(self.dir_prefix(sub_path)).with_max_keys(1);
        let page = self.store.list_objects(self.bucket(), &request).await?;
        Ok(!page.objects.is_empty())
    }

    /// Whether a file object exists at `sub_path`.
    pub async fn file_exists(&self, sub_path: &str) -> VfsResult<bool> {
        Ok(self.store.object_exists(self.bucket(), &self.key(sub_path)).await?)
    }
}
