//! Ancestor closure over the group hierarchy
//!
//! The stored parent graph is not required to be acyclic. Traversal keeps the
//! groups of the current path and skips any parent link leading back onto
//! it, so building a closure always terminates.

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::dao::PermissionDao;
use crate::error::Result;
use crate::model::{EntityKind, PermissionEntity};

/// One group reachable from the entity being resolved
#[derive(Debug, Clone)]
pub struct ClosureGroup {
    /// Loaded group
    pub entity: PermissionEntity,
    /// Shortest number of parent links from the entity's direct groups
    pub distance: usize,
    /// Pre-order discovery index, following membership and parent order
    pub declaration: usize,
}

impl ClosureGroup {
    pub fn name(&self) -> &str {
        &self.entity.name
    }

    pub fn priority(&self) -> i32 {
        self.entity.priority
    }
}

/// Collect every group reachable from `roots`, in merge order
///
/// `roots` sit at distance 0. `origin` is the group being resolved, if any;
/// it counts as part of every path so links back to it are ignored. The
/// result is sorted so that merging front to back lets nearer, then
/// higher-priority, then later-declared groups overwrite the others.
pub fn ancestor_closure<D>(
    dao: &D,
    origin: Option<&str>,
    roots: &[String],
    diagnostics: &mut Vec<String>,
) -> Result<Vec<ClosureGroup>>
where
    D: PermissionDao + ?Sized,
{
    let mut traversal = Traversal {
        dao,
        found: HashMap::new(),
        next_declaration: 0,
        path: origin.map(|o| vec![o.to_lowercase()]).unwrap_or_default(),
        diagnostics,
    };

    for root in roots {
        traversal.visit(root, 0)?;
    }

    let mut closure: Vec<ClosureGroup> = traversal.found.into_values().collect();
    closure.sort_by_key(|g| (Reverse(g.distance), g.priority(), g.declaration));
    Ok(closure)
}

struct Traversal<'a, D: ?Sized> {
    dao: &'a D,
    found: HashMap<String, ClosureGroup>,
    next_declaration: usize,
    path: Vec<String>,
    diagnostics: &'a mut Vec<String>,
}

impl<D: PermissionDao + ?Sized> Traversal<'_, D> {
    fn visit(&mut self, name: &str, distance: usize) -> Result<()> {
        let key = name.to_lowercase();

        if self.path.contains(&key) {
            let child = self.path.last().cloned().unwrap_or_default();
            tracing::warn!("Group hierarchy cycle: {} -> {}, ignoring link", child, key);
            let message = format!("Cycle in group hierarchy: {} -> {} ignored", child, key);
            if !self.diagnostics.contains(&message) {
                self.diagnostics.push(message);
            }
            return Ok(());
        }

        let parents = match self.found.get_mut(&key) {
            // Already reached at least as close; its ancestors are done too
            Some(known) if known.distance <= distance => return Ok(()),
            Some(known) => {
                known.distance = distance;
                known.entity.parents.clone()
            }
            None => {
                let Some(entity) = self.dao.entity(&key, EntityKind::Group)? else {
                    tracing::debug!("Skipping missing group {}", key);
                    return Ok(());
                };
                let parents = entity.parents.clone();
                self.found.insert(
                    key.clone(),
                    ClosureGroup {
                        entity,
                        distance,
                        declaration: self.next_declaration,
                    },
                );
                self.next_declaration += 1;
                parents
            }
        };

        self.path.push(key);
        for parent in &parents {
            self.visit(parent, distance + 1)?;
        }
        self.path.pop();

        Ok(())
    }
}
