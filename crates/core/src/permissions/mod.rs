//! Permission strings, child expansion and diffs
//!
//! This module holds the pure building blocks of permission handling. None of
//! it touches storage.
//!
//! # Permission Format
//!
//! Permission nodes are dot-segmented and case-insensitive. A stored entry may
//! be qualified by a region and/or a world:
//! - `build.place` - global
//! - `nether:build.place` - only in world `nether`
//! - `spawn/:pvp` - only inside region `spawn`, any world
//! - `spawn/world:kit.starter` - region `spawn` of world `world`
//!
//! # Expansion
//!
//! ```text
//! raw:       a.b.c = true
//! expanded:  a.b.c = true, a.b = true, a = true
//! ```
//!
//! Explicitly set nodes are never overwritten by values implied from their
//! descendants. See [`expand`] for the conflict rule.
//!
//! # Usage
//!
//! ```ignore
//! use zperms_core::permissions::{diff, expand, QualifiedPermission};
//!
//! let qp = QualifiedPermission::parse("spawn/world:kit.starter")?;
//! assert_eq!(qp.to_string(), "spawn/world:kit.starter");
//!
//! let before = expand(&raw_before);
//! let after = expand(&raw_after);
//! let changes = diff(&before, &after);
//! ```

mod diff;
mod expand;
mod qualified;

use std::collections::BTreeMap;

pub use diff::{diff, PermissionDiff};
pub use expand::{ancestors, check_dynamic_permission, expand, NODE_SEPARATOR};
pub use qualified::{QualifiedPermission, REGION_SEPARATOR, WORLD_SEPARATOR};

/// Resolved `node -> value` map, iterated in ascending node order
pub type PermissionMap = BTreeMap<String, bool>;

/// Keep only nodes containing `filter` (case-insensitive)
pub fn filter_permissions(permissions: &PermissionMap, filter: &str) -> PermissionMap {
    let filter = filter.to_lowercase();
    permissions
        .iter()
        .filter(|(node, _)| node.contains(&filter))
        .map(|(node, value)| (node.clone(), *value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_permissions() {
        let map: PermissionMap = [("essentials.fly", true), ("worldedit.wand", false)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        let filtered = filter_permissions(&map, "ESSENTIALS");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get("essentials.fly"), Some(&true));
    }
}
