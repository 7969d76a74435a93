//! Synthesized listings for paths above the mounts.
//!
//! When a path falls under no mount, its entries are derived purely from the
//! mount prefixes beneath it. No object storage is touched and nothing is
//! cached, so authorization changes show up immediately.

use std::collections::HashMap;

use bucketfs_types::{Item, ListingResult, Mount};

use super::paths;

/// Compose the listing for a virtual directory.
///
/// For each mount:
/// - prefix equal to `path`: emit the mount itself;
/// - prefix one level below `path`: emit a mount entry;
/// - prefix deeper below `path`: emit a plain directory for the first
///   intermediate segment, once per distinct name.
///
/// A mount entry replaces a plain directory of the same name.
pub fn compose(path: &str, mounts: &[Mount]) -> ListingResult {
    let base = path.trim_end_matches('/');
    let mut ordered: Vec<&Mount> = mounts.iter().collect();
    ordered.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.virtual_prefix.cmp(&b.virtual_prefix))
    });

    let mut items: Vec<Item> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for mount in ordered {
        let prefix = mount.virtual_prefix.trim_end_matches('/');
        if prefix.is_empty() {
            continue;
        }

        let entry = if !base.is_empty() && prefix == base {
            Item::mount(mount.display_name(), paths::as_directory(prefix), &mount.id)
        } else if let Some(rest) = prefix.strip_prefix(&format!("{}/", base)) {
            let first = rest.split('/').next().unwrap_or(rest);
            let child = format!("{}/{}/", base, first);
            if first == rest {
                Item::mount(mount.display_name(), child, &mount.id)
            } else {
                Item::directory(first, child)
            }
        } else {
            continue;
        };

        match by_name.get(&entry.name) {
            Some(&idx) => {
                if entry.is_mount && !items[idx].is_mount {
                    items[idx] = entry;
                }
            }
            None => {
                by_name.insert(entry.name.clone(), items.len());
                items.push(entry);
            }
        }
    }

    ListingResult {
        path: paths::as_directory(if base.is_empty() { "/" } else { base }),
        is_virtual: true,
        is_root: base.is_empty(),
        mount_id: None,
        items,
    }
}
