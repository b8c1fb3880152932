//! Remote path helpers
//!
//! Remote paths are `smb://server/share/...` strings. Caller-supplied
//! relative paths always begin with `/` and are appended to a share root.
//! Relative paths are validated before they are joined so that they cannot
//! climb out of the mounted share.

use crate::error::ProtocolError;
use crate::{MAX_FILENAME_LEN, MAX_PATH_LEN};

/// Relative path naming the share root itself
pub const ROOT_MARKER: &str = "/";

/// Separator used by remote paths
pub const SEPARATOR: char = '/';

/// Strip a single trailing separator, if present
pub fn strip_trailing_separator(path: &str) -> &str {
    path.strip_suffix(SEPARATOR).unwrap_or(path)
}

/// Validate a caller-supplied relative path.
///
/// Rejects paths that do not begin with a separator, contain null bytes,
/// contain `..` components, or exceed the length limits.
pub fn validate_relative(relative: &str) -> Result<(), ProtocolError> {
    if !relative.starts_with(SEPARATOR) {
        return Err(ProtocolError::PathTraversal(format!(
            "relative path must begin with '/': {}",
            relative
        )));
    }

    if relative.contains('\0') {
        return Err(ProtocolError::PathTraversal("path contains null byte".into()));
    }

    if relative.len() > MAX_PATH_LEN {
        return Err(ProtocolError::PathTraversal(format!(
            "path too long: {} bytes (max {})",
            relative.len(),
            MAX_PATH_LEN
        )));
    }

    for component in relative.split(SEPARATOR) {
        if component == ".." {
            return Err(ProtocolError::PathTraversal(
                "parent directory (..) not allowed".into(),
            ));
        }
        if component.len() > MAX_FILENAME_LEN {
            return Err(ProtocolError::PathTraversal(format!(
                "filename too long: {} bytes (max {})",
                component.len(),
                MAX_FILENAME_LEN
            )));
        }
    }

    Ok(())
}

/// Join a share root and a relative path; the root marker maps to the root verbatim
pub fn join(share_root: &str, relative: &str) -> String {
    if relative == ROOT_MARKER {
        share_root.to_string()
    } else {
        format!("{}{}", share_root, relative)
    }
}

/// Full path of a named child inside a directory
pub fn child(dir: &str, name: &str) -> String {
    format!("{}{}{}", dir, SEPARATOR, name)
}

/// Last component of a path
pub fn leaf_name(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Proper ancestors of a relative path, shallowest first.
///
/// `/a/b/c` yields `/a` and `/a/b`. The root marker is never included.
pub fn ancestors(relative: &str) -> Vec<&str> {
    let trimmed = strip_trailing_separator(relative);
    trimmed
        .match_indices(SEPARATOR)
        .map(|(idx, _)| idx)
        .filter(|&idx| idx > 0)
        .map(|idx| &trimmed[..idx])
        .collect()
}
