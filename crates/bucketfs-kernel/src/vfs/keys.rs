//! Mapping from mount sub-paths to object keys.
//!
//! The full key is `root_prefix + default_folder + sub_path`, where each
//! non-empty component is normalized to end with `/` and the sub-path's
//! leading slash is dropped.

use bucketfs_types::StorageConfig;

fn component(s: &str) -> String {
    let trimmed = s.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// Key prefix shared by everything stored under this config.
pub fn base_prefix(config: &StorageConfig) -> String {
    format!(
        "{}{}",
        component(&config.root_prefix),
        component(&config.default_folder)
    )
}

/// Listing prefix for a directory sub-path. Always ends with `/` unless it
/// is the (empty) bucket root.
pub fn directory_prefix(config: &StorageConfig, sub_path: &str) -> String {
    format!("{}{}", base_prefix(config), component(sub_path))
}

/// Object key for a sub-path. Directory sub-paths keep their trailing slash
/// and so name the directory marker object.
pub fn object_key(config: &StorageConfig, sub_path: &str) -> String {
    format!("{}{}", base_prefix(config), sub_path.trim_start_matches('/'))
}
