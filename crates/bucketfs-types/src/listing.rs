//! Directory listings and file info returned by the filesystem facade.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// One entry in a directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Entry name (not full path).
    pub name: String,
    /// Full virtual path. Directories end with `/`.
    pub path: String,
    pub is_directory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<SystemTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// True when the entry is a mount point rather than a stored directory.
    #[serde(default)]
    pub is_mount: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_id: Option<String>,
}

impl Item {
    /// A stored (object-prefix) directory.
    pub fn directory(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_directory: true,
            size: None,
            modified_at: None,
            etag: None,
            is_mount: false,
            mount_id: None,
        }
    }

    /// A mount point shown as a directory.
    pub fn mount(
        name: impl Into<String>,
        path: impl Into<String>,
        mount_id: impl Into<String>,
    ) -> Self {
        Self {
            is_mount: true,
            mount_id: Some(mount_id.into()),
            ..Self::directory(name, path)
        }
    }

    /// A stored object.
    pub fn file(name: impl Into<String>, path: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_directory: false,
            size: Some(size),
            modified_at: None,
            etag: None,
            is_mount: false,
            mount_id: None,
        }
    }
}

/// The result of listing a directory.
///
/// `is_virtual` means the listing was synthesized from mount prefixes and no
/// object-storage call happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingResult {
    pub path: String,
    pub is_virtual: bool,
    pub is_root: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_id: Option<String>,
    pub items: Vec<Item>,
}

impl ListingResult {
    pub fn files(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|i| !i.is_directory)
    }

    pub fn directories(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|i| i.is_directory)
    }

    /// Find an entry by name.
    pub fn get(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.name == name)
    }
}

/// Metadata about a single path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub path: String,
    pub name: String,
    pub is_directory: bool,
    /// True for mount ancestors that have no backing store.
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<SystemTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_id: Option<String>,
    /// Object key backing this path, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
}

impl FileInfo {
    /// Info for a directory with no object behind it.
    pub fn virtual_directory(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            is_directory: true,
            is_virtual: true,
            size: None,
            modified_at: None,
            etag: None,
            content_type: None,
            mount_id: None,
            storage_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_constructors() {
        let dir = Item::directory("docs", "/s3/docs/");
        assert!(dir.is_directory);
        assert!(!dir.is_mount);

        let mount = Item::mount("s3", "/s3/", "m1");
        assert!(mount.is_directory);
        assert!(mount.is_mount);
        assert_eq!(mount.mount_id.as_deref(), Some("m1"));

        let file = Item::file("a.txt", "/s3/a.txt", 3);
        assert!(!file.is_directory);
        assert_eq!(file.size, Some(3));
    }

    #[test]
    fn test_listing_serializes_camel_case() {
        let listing = ListingResult {
            path: "/".into(),
            is_virtual: true,
            is_root: true,
            mount_id: None,
            items: vec![Item::mount("s3", "/s3/", "m1")],
        };
        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["isVirtual"], true);
        assert_eq!(json["items"][0]["isMount"], true);
        assert_eq!(json["items"][0]["mountId"], "m1");
        assert!(json.get("mountId").is_none());
    }

    #[test]
    fn test_listing_filters() {
        let listing = ListingResult {
            path: "/s3/".into(),
            is_virtual: false,
            is_root: false,
            mount_id: Some("m1".into()),
            items: vec![Item::directory("d", "/s3/d/"), Item::file("f", "/s3/f", 1)],
        };
        assert_eq!(listing.files().count(), 1);
        assert_eq!(listing.directories().count(), 1);
        assert!(listing.get("f").is_some());
    }
}
