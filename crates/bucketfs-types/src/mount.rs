//! Mounts and the storage configurations behind them.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// A mapping from a virtual path prefix to a storage backend.
///
/// `virtual_prefix` is absolute and normalized: it starts with `/` and has no
/// trailing slash, except for a mount at the root which is exactly `/`.
/// Prefix uniqueness across mounts is enforced by whoever owns the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mount {
    pub id: String,
    /// Optional display name, used when listing the mount as a directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub virtual_prefix: String,
    pub storage_config_ref: String,
    /// Listing cache TTL. Zero disables caching for this mount.
    #[serde(default)]
    pub cache_ttl_seconds: u64,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<SystemTime>,
}

fn default_active() -> bool {
    true
}

impl Mount {
    /// Create an active mount with caching disabled.
    pub fn new(
        id: impl Into<String>,
        virtual_prefix: impl Into<String>,
        storage_config_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            virtual_prefix: virtual_prefix.into(),
            storage_config_ref: storage_config_ref.into(),
            cache_ttl_seconds: 0,
            active: true,
            sort_order: 0,
            last_used_at: None,
        }
    }

    /// Set the listing cache TTL.
    pub fn with_cache_ttl(mut self, seconds: u64) -> Self {
        self.cache_ttl_seconds = seconds;
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn caching_enabled(&self) -> bool {
        self.cache_ttl_seconds > 0
    }

    /// Name shown when the mount appears as a directory entry: the last
    /// segment of its prefix, or the display name for a root mount.
    pub fn display_name(&self) -> String {
        let last = self
            .virtual_prefix
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("");
        if !last.is_empty() {
            return last.to_string();
        }
        self.name.clone().unwrap_or_else(|| self.id.clone())
    }
}

/// Encrypted access credentials for an S3-compatible endpoint.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedCredentials {
    pub access_key_id: String,
    /// Ciphertext; decrypted per operation, never cached.
    pub secret_access_key: String,
}

impl fmt::Debug for EncryptedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Connection details for one bucket on one S3-compatible endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    pub id: String,
    pub bucket: String,
    /// Custom endpoint URL. `None` means the provider default (AWS).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// Path-style addressing (`endpoint/bucket/key`) instead of virtual hosts.
    #[serde(default)]
    pub path_style: bool,
    /// Key prefix under which everything for this config lives.
    #[serde(default)]
    pub root_prefix: String,
    /// Folder appended after `root_prefix`.
    #[serde(default)]
    pub default_folder: String,
    #[serde(default)]
    pub credentials: EncryptedCredentials,
    /// Per-request timeout for this provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

fn default_region() -> String {
    "auto".to_string()
}

impl StorageConfig {
    pub fn new(id: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bucket: bucket.into(),
            endpoint: None,
            region: default_region(),
            path_style: false,
            root_prefix: String::new(),
            default_folder: String::new(),
            credentials: EncryptedCredentials::default(),
            request_timeout_secs: None,
        }
    }

    pub fn with_root_prefix(mut self, root_prefix: impl Into<String>) -> Self {
        self.root_prefix = root_prefix.into();
        self
    }

    pub fn with_default_folder(mut self, default_folder: impl Into<String>) -> Self {
        self.default_folder = default_folder.into();
        self
    }
}
