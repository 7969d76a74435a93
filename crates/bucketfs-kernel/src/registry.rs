//! Collaborators the filesystem consumes: mount registry, storage-config
//! store, and credential decryption.
//!
//! Persistence and authorization live behind these traits. The in-memory
//! implementations back the CLI (loaded from a config file) and the tests.

use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use async_trait::async_trait;
use bucketfs_types::{Caller, EncryptedCredentials, Mount, StorageConfig};
use parking_lot::RwLock;

use crate::store::Credentials;
use crate::vfs::VfsResult;

/// Source of mounts and the caller's view of them.
#[async_trait]
pub trait MountRegistry: Send + Sync {
    /// Mounts the caller may see, sorted by `sort_order`.
    async fn list_accessible_mounts(&self, caller: &Caller) -> VfsResult<Vec<Mount>>;

    async fn get_mount(&self, id: &str) -> VfsResult<Option<Mount>>;

    /// Record that a mount's contents were just changed.
    async fn update_mount_last_used(&self, id: &str) -> VfsResult<()>;
}

/// Source of storage configurations (credentials still encrypted).
#[async_trait]
pub trait StorageConfigStore: Send + Sync {
    async fn get_storage_config(&self, id: &str) -> VfsResult<Option<StorageConfig>>;
}

/// Decrypts stored credential fields. The key material belongs to the
/// implementation.
pub trait CredentialCipher: Send + Sync {
    fn decrypt(&self, ciphertext: &str) -> VfsResult<String>;

    fn decrypt_credentials(&self, encrypted: &EncryptedCredentials) -> VfsResult<Credentials> {
        Ok(Credentials {
            access_key_id: self.decrypt(&encrypted.access_key_id)?,
            secret_access_key: self.decrypt(&encrypted.secret_access_key)?,
        })
    }
}

/// Cipher for credentials kept in the clear.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextCipher;

impl CredentialCipher for PlaintextCipher {
    fn decrypt(&self, ciphertext: &str) -> VfsResult<String> {
        Ok(ciphertext.to_string())
    }
}

// ============================================================================
// In-memory registry
// ============================================================================

/// Mount registry held in memory.
///
/// Admins see every active mount. API-key callers see the active mounts
/// granted to their key.
#[derive(Debug, Default)]
pub struct MemoryMountRegistry {
    mounts: RwLock<Vec<Mount>>,
    grants: RwLock<HashMap<String, HashSet<String>>>,
}

impl MemoryMountRegistry {
    pub fn new(mounts: Vec<Mount>) -> Self {
        Self {
            mounts: RwLock::new(mounts),
            grants: RwLock::new(HashMap::new()),
        }
    }

    /// Add a mount, replacing any with the same id.
    pub fn add_mount(&self, mount: Mount) {
        let mut mounts = self.mounts.write();
        mounts.retain(|m| m.id != mount.id);
        mounts.push(mount);
    }

    pub fn set_active(&self, id: &str, active: bool) -> bool {
        match self.mounts.write().iter_mut().find(|m| m.id == id) {
            Some(mount) => {
                mount.active = active;
                true
            }
            None => false,
        }
    }

    /// Grant an API key access to a mount.
    pub fn grant(&self, api_key_id: &str, mount_id: &str) {
        self.grants
            .write()
            .entry(api_key_id.to_string())
            .or_default()
            .insert(mount_id.to_string());
    }

    pub fn revoke(&self, api_key_id: &str, mount_id: &str) {
        if let Some(granted) = self.grants.write().get_mut(api_key_id) {
            granted.remove(mount_id);
        }
    }

    /// Synchronous lookup.
    pub fn mount(&self, id: &str) -> Option<Mount> {
        self.mounts.read().iter().find(|m| m.id == id).cloned()
    }
}

#[async_trait]
impl MountRegistry for MemoryMountRegistry {
    async fn list_accessible_mounts(&self, caller: &Caller) -> VfsResult<Vec<Mount>> {
        let grants = self.grants.read();
        let granted = grants.get(&caller.id);
        let mut visible: Vec<Mount> = self
            .mounts
            .read()
            .iter()
            .filter(|m| m.active)
            .filter(|m| caller.is_admin() || granted.is_some_and(|g| g.contains(&m.id)))
            .cloned()
            .collect();
        visible.sort_by_key(|m| m.sort_order);
        Ok(visible)
    }

    async fn get_mount(&self, id: &str) -> VfsResult<Option<Mount>> {
        Ok(self.mount(id))
    }

    async fn update_mount_last_used(&self, id: &str) -> VfsResult<()> {
        if let Some(mount) = self.mounts.write().iter_mut().find(|m| m.id == id) {
            mount.last_used_at = Some(SystemTime::now());
        }
        Ok(())
    }
}

/// Storage configurations held in memory.
#[derive(Debug, Default)]
pub struct MemoryStorageConfigStore {
    configs: RwLock<HashMap<String, StorageConfig>>,
}

impl MemoryStorageConfigStore {
    pub fn new(configs: impl IntoIterator<Item = StorageConfig>) -> Self {
        Self {
            configs: RwLock::new(configs.into_iter().map(|c| (c.id.clone(), c)).collect()),
        }
    }

    pub fn insert(&self, config: StorageConfig) {
        self.configs.write().insert(config.id.clone(), config);
    }

    pub fn remove(&self, id: &str) -> Option<StorageConfig> {
        self.configs.write().remove(id)
    }
}

#[async_trait]
impl StorageConfigStore for MemoryStorageConfigStore {
    async fn get_storage_config(&self, id: &str) -> VfsResult<Option<StorageConfig>> {
        Ok(self.configs.read().get(id).cloned())
    }
}
