//! Difference between two resolved permission maps

use std::collections::BTreeMap;

use super::PermissionMap;

/// Nodes added, removed or flipped going from `before` to `after`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionDiff {
    /// Present only in `after`
    pub added: PermissionMap,
    /// Present only in `before`
    pub removed: PermissionMap,
    /// Present in both with a different value, as `(before, after)`
    pub changed: BTreeMap<String, (bool, bool)>,
}

impl PermissionDiff {
    /// Empty across all three sets means identical effective permissions
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Keep only nodes containing `filter` (case-insensitive)
    pub fn filtered(mut self, filter: &str) -> Self {
        let filter = filter.to_lowercase();
        self.added.retain(|node, _| node.contains(&filter));
        self.removed.retain(|node, _| node.contains(&filter));
        self.changed.retain(|node, _| node.contains(&filter));
        self
    }
}

/// Compare two maps; both should already be expanded for display purposes
pub fn diff(before: &PermissionMap, after: &PermissionMap) -> PermissionDiff {
    let mut result = PermissionDiff::default();

    for (node, &old) in before {
        match after.get(node) {
            None => {
                result.removed.insert(node.clone(), old);
            }
            Some(&new) if new != old => {
                result.changed.insert(node.clone(), (old, new));
            }
            Some(_) => {}
        }
    }

    for (node, &new) in after {
        if !before.contains_key(node) {
            result.added.insert(node.clone(), new);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, bool)]) -> PermissionMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_diff_classifies_nodes() {
        let before = map(&[("build", true), ("fly", true), ("chat", true)]);
        let after = map(&[("build", false), ("chat", true), ("kick", true)]);

        let d = diff(&before, &after);
        assert_eq!(d.added, map(&[("kick", true)]));
        assert_eq!(d.removed, map(&[("fly", true)]));
        assert_eq!(d.changed.get("build"), Some(&(true, false)));
        assert!(!d.changed.contains_key("chat"));
        assert!(!d.is_empty());
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let x = map(&[("a", true), ("a.b", false)]);
        assert!(diff(&x, &x).is_empty());
        assert!(diff(&PermissionMap::new(), &PermissionMap::new()).is_empty());
    }

    #[test]
    fn test_filtered() {
        let before = map(&[("worldedit.wand", true), ("essentials.fly", true)]);
        let d = diff(&before, &PermissionMap::new()).filtered("WorldEdit");
        assert_eq!(d.removed, map(&[("worldedit.wand", true)]));
    }
}
