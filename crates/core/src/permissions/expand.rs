//! Child permission expansion and the protected namespace

use crate::error::{PermissionError, Result};

use super::PermissionMap;

/// Separator between permission node segments
pub const NODE_SEPARATOR: char = '.';

/// Expand a raw permission map so every node also implies its ancestors
///
/// `a.b.c = true` yields `a.b = true` and `a = true` unless those nodes are
/// set explicitly in `raw`. When two descendants imply different values for
/// the same undeclared ancestor, the one visited last wins. Iteration follows
/// the map's ascending node order, so `a.b = true` and `a.c = false` leave
/// `a = false`.
pub fn expand(raw: &PermissionMap) -> PermissionMap {
    let mut expanded = raw.clone();

    for (node, value) in raw {
        for ancestor in ancestors(node) {
            if raw.contains_key(ancestor) {
                continue;
            }
            expanded.insert(ancestor.to_string(), *value);
        }
    }

    expanded
}

/// Proper ancestors of a dotted node, nearest first
///
/// `a.b.c` -> `a.b`, `a`
pub fn ancestors(node: &str) -> impl Iterator<Item = &str> {
    node.rmatch_indices(NODE_SEPARATOR)
        .map(move |(idx, _)| &node[..idx])
        .filter(|ancestor| !ancestor.is_empty())
}

/// Reject nodes under the reserved dynamic namespace
///
/// `permission` must be unqualified. The comparison ignores case.
pub fn check_dynamic_permission(permission: &str, reserved_prefix: &str) -> Result<()> {
    if reserved_prefix.is_empty() {
        return Ok(());
    }
    if permission
        .to_lowercase()
        .starts_with(&reserved_prefix.to_lowercase())
    {
        tracing::debug!("Rejected protected permission {}", permission);
        return Err(PermissionError::ProtectedPermission(permission.to_string()));
    }
    Ok(())
}
