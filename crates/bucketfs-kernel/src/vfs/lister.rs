//! Directory listings backed by object storage.
//!
//! A resolved `(mount, sub-path)` becomes a delimiter `LIST` against the
//! mount's bucket. Results are cached per mount when the mount has a
//! positive cache TTL.

use bucketfs_types::{Item, ListingResult};
use tracing::debug;

use super::context::FilesystemContext;
use super::error::VfsResult;
use super::paths;
use super::resolver::ResolvedLocation;
use crate::store::{ListPage, ListRequest};

/// Lists directories inside mounts.
#[derive(Debug, Clone)]
pub struct DirectoryLister {
    ctx: FilesystemContext,
}

impl DirectoryLister {
    pub fn new(ctx: FilesystemContext) -> Self {
        Self { ctx }
    }

    /// Listing for a resolved directory.
    ///
    /// With caching enabled a hit returns without any storage or config
    /// lookup. A miss lists every page under the prefix and stores the
    /// result for the mount's TTL.
    pub async fn list(&self, location: &ResolvedLocation) -> VfsResult<ListingResult> {
        let mount = &location.mount;
        let sub_dir = paths::as_directory(&location.sub_path);

        if mount.caching_enabled() {
            if let Some(hit) = self.ctx.cache.get(&mount.id, &sub_dir) {
                return Ok(hit);
            }
        }

        let backend = self.ctx.backend(mount).await?;
        let prefix = backend.dir_prefix(&sub_dir);

        let mut pages = Vec::new();
        let mut token = None;
        loop {
            let request = ListRequest::directory(&prefix).with_continuation_token(token);
            let page = backend.store.list_objects(backend.bucket(), &request).await?;
            token = page.next_continuation_token.clone();
            pages.push(page);
            if token.is_none() {
                break;
            }
        }

        let listing = build_listing(location, &sub_dir, &prefix, &pages);
        debug!(
            "listed {}:{} ({} entries from {} pages)",
            mount.id,
            sub_dir,
            listing.items.len(),
            pages.len()
        );

        if mount.caching_enabled() {
            self.ctx
                .cache
                .set(&mount.id, &sub_dir, listing.clone(), mount.cache_ttl_seconds);
        }
        Ok(listing)
    }
}

/// Turn raw `LIST` pages into a listing.
///
/// Common prefixes become directories named by the part after `prefix`.
/// Objects become files, except the directory marker (`prefix` itself or
/// `prefix + "/"`) and keys with a further `/` in their name.
pub fn build_listing(
    location: &ResolvedLocation,
    sub_dir: &str,
    prefix: &str,
    pages: &[ListPage],
) -> ListingResult {
    let marker = format!("{}/", prefix);
    let mut items = Vec::new();

    for page in pages {
        for common in &page.common_prefixes {
            let name = common
                .strip_prefix(prefix)
                .unwrap_or(common)
                .trim_end_matches('/');
            if name.is_empty() {
                continue;
            }
            let path = location.virtual_path(&format!("{}{}/", sub_dir, name));
            items.push(Item::directory(name, path));
        }

        for object in &page.objects {
            if object.key == prefix || object.key == marker {
                continue;
            }
            let name = object.key.strip_prefix(prefix).unwrap_or(&object.key);
            if name.is_empty() || name.contains('/') {
                continue;
            }
            let mut item = Item::file(name, location.virtual_path(&format!("{}{}", sub_dir, name)), object.size);
            item.modified_at = object.last_modified;
            item.etag = object.etag.clone();
            items.push(item);
        }
    }

    let path = location.virtual_path(sub_dir);
    ListingResult {
        is_root: paths::is_root(&path),
        path,
        is_virtual: false,
        mount_id: Some(location.mount.id.clone()),
        items,
    }
}
