//! Mount resolution with longest-prefix routing.
//!
//! Given a virtual path and the caller's visible mounts, find the mount that
//! backs the path and the sub-path inside it. Paths that fall under no mount
//! are virtual (synthetic ancestors of mounts, or nothing at all).

use bucketfs_types::Mount;

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub mount: Mount,
    /// Remainder after the mount prefix. Always starts with `/`.
    pub sub_path: String,
}

impl ResolvedLocation {
    /// Whether the location is the mount's own root.
    pub fn is_mount_root(&self) -> bool {
        self.sub_path == "/"
    }

    /// Virtual path for a sub-path of this location's mount.
    pub fn virtual_path(&self, sub_path: &str) -> String {
        let prefix = self.mount.virtual_prefix.trim_end_matches('/');
        format!("{}/{}", prefix, sub_path.trim_start_matches('/'))
    }
}

/// Routes virtual paths to mounts.
///
/// Mounts are matched by longest prefix. If `/a` and `/a/b` are both
/// mounted, `/a/b/c` resolves to `/a/b` with sub-path `/c`. Inactive mounts
/// are dropped at construction. Two mounts with the same prefix are a
/// configuration error the registry must prevent; here the one with the
/// lower `sort_order` wins.
#[derive(Debug, Clone, Default)]
pub struct MountResolver {
    /// Active mounts, longest prefix first.
    mounts: Vec<Mount>,
}

impl MountResolver {
    pub fn new(mounts: Vec<Mount>) -> Self {
        let mut mounts: Vec<Mount> = mounts.into_iter().filter(|m| m.active).collect();
        mounts.sort_by(|a, b| {
            b.virtual_prefix
                .len()
                .cmp(&a.virtual_prefix.len())
                .then(a.sort_order.cmp(&b.sort_order))
        });
        Self { mounts }
    }

    /// Active mounts, longest prefix first.
    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// Resolve a normalized virtual path.
    ///
    /// The path matches a mount when it starts with `prefix + "/"`; a root
    /// mount (`/`) matches everything. `None` means the path is virtual.
    pub fn resolve(&self, path: &str) -> Option<ResolvedLocation> {
        for mount in &self.mounts {
            let prefix = mount.virtual_prefix.trim_end_matches('/');
            if prefix.is_empty() {
                return Some(ResolvedLocation {
                    mount: mount.clone(),
                    sub_path: format!("/{}", path.trim_start_matches('/')),
                });
            }
            if let Some(rest) = path.strip_prefix(prefix) {
                if rest.starts_with('/') {
                    return Some(ResolvedLocation {
                        mount: mount.clone(),
                        sub_path: rest.to_string(),
                    });
                }
            }
        }
        None
    }

    /// Whether some mount lies strictly beneath `path`, or is exactly at it.
    pub fn has_mounts_under(&self, path: &str) -> bool {
        let base = path.trim_end_matches('/');
        self.mounts.iter().any(|m| {
            let prefix = m.virtual_prefix.trim_end_matches('/');
            base.is_empty() || prefix == base || prefix.starts_with(&format!("{}/", base))
        })
    }
}
