//! Virtual path helpers.
//!
//! Virtual paths are absolute, `/`-separated, and use a trailing slash to
//! mark directories (`/docs/` is a directory, `/docs/readme.txt` a file).
//! Sub-paths (the remainder after a mount prefix) follow the same rules.

use super::error::{VfsError, VfsResult};

/// Normalize a virtual path: force a leading `/`, collapse repeated
/// slashes, keep a trailing slash if present. `.` and `..` segments are
/// rejected rather than resolved.
pub fn normalize(path: &str) -> VfsResult<String> {
    let trailing = path.ends_with('/');
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(VfsError::invalid_path(path));
        }
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        return Ok("/".to_string());
    }
    if trailing {
        out.push('/');
    }
    Ok(out)
}

/// Whether the path names a directory (trailing slash).
pub fn is_directory(path: &str) -> bool {
    path.ends_with('/')
}

/// The directory form of a path (trailing slash added).
pub fn as_directory(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// Canonical directory form used as a cache key: `/` or `/a/b`, never a
/// trailing slash.
pub fn canonical_dir(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Parent directory of a path, in directory form.
///
/// `/a/b/c` and `/a/b/c/` both give `/a/b/`; `/a` gives `/`; `/` is its own
/// parent.
pub fn parent(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) if idx > 0 => format!("{}/", &trimmed[..idx]),
        _ => "/".to_string(),
    }
}

/// Last path segment, without trailing slash. Empty for `/`.
pub fn file_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Append a single name to a directory path.
pub fn join(dir: &str, name: &str) -> String {
    format!("{}{}", as_directory(dir), name.trim_start_matches('/'))
}

/// Whether this is the root path.
pub fn is_root(path: &str) -> bool {
    path.trim_matches('/').is_empty()
}
