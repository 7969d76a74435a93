//! Approximate in-memory footprint of cached values.
//!
//! Strings count two bytes per character, numbers eight, booleans four;
//! containers and structs are the sum of their parts.

use std::time::SystemTime;

use bucketfs_types::{Item, ListingResult};

/// Rough size estimate used for the cache's memory threshold.
pub trait ApproxSize {
    fn approx_size(&self) -> usize;
}

impl ApproxSize for str {
    fn approx_size(&self) -> usize {
        self.chars().count() * 2
    }
}

impl ApproxSize for String {
    fn approx_size(&self) -> usize {
        self.as_str().approx_size()
    }
}

impl ApproxSize for bool {
    fn approx_size(&self) -> usize {
        4
    }
}

impl ApproxSize for u64 {
    fn approx_size(&self) -> usize {
        8
    }
}

impl ApproxSize for SystemTime {
    fn approx_size(&self) -> usize {
        8
    }
}

impl<T: ApproxSize> ApproxSize for Option<T> {
    fn approx_size(&self) -> usize {
        self.as_ref().map_or(0, ApproxSize::approx_size)
    }
}

impl<T: ApproxSize> ApproxSize for Vec<T> {
    fn approx_size(&self) -> usize {
        self.iter().map(ApproxSize::approx_size).sum()
    }
}

impl ApproxSize for Item {
    fn approx_size(&self) -> usize {
        self.name.approx_size()
            + self.path.approx_size()
            + self.is_directory.approx_size()
            + self.size.approx_size()
            + self.modified_at.approx_size()
            + self.etag.approx_size()
            + self.is_mount.approx_size()
            + self.mount_id.approx_size()
    }
}

impl ApproxSize for ListingResult {
    fn approx_size(&self) -> usize {
        self.path.approx_size()
            + self.is_virtual.approx_size()
            + self.is_root.approx_size()
            + self.mount_id.approx_size()
            + self.items.approx_size()
    }
}
