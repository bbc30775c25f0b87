//! Region/world qualified permission strings
//!
//! Grammar: `[region/][world:]permission`. Both qualifiers are optional and
//! every component is lower-cased.

use std::fmt;
use std::str::FromStr;

use crate::error::{PermissionError, Result};

/// Separator between the region and the rest of the qualifier
pub const REGION_SEPARATOR: char = '/';

/// Separator between the qualifier and the permission node
pub const WORLD_SEPARATOR: char = ':';

/// Parsed view of a permission string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedPermission {
    region: Option<String>,
    world: Option<String>,
    permission: String,
}

impl QualifiedPermission {
    /// Build from already separated parts
    ///
    /// Empty qualifiers collapse to `None`. Qualifiers may not contain either
    /// separator and the node may not contain a world separator.
    pub fn new(region: Option<&str>, world: Option<&str>, permission: &str) -> Result<Self> {
        let malformed = |reason| {
            let region = region.unwrap_or("");
            let world = world.unwrap_or("");
            Err(PermissionError::MalformedPermission {
                permission: format!("{}/{}:{}", region, world, permission),
                reason,
            })
        };

        let permission = permission.trim().to_lowercase();
        if permission.is_empty() {
            return malformed("permission node is empty");
        }
        if permission.contains(WORLD_SEPARATOR) {
            return malformed("permission node contains ':'");
        }
        let separators: &[char] = &[REGION_SEPARATOR, WORLD_SEPARATOR];
        if region.is_some_and(|r| r.contains(separators)) {
            return malformed("region contains '/' or ':'");
        }
        if world.is_some_and(|w| w.contains(separators)) {
            return malformed("world contains '/' or ':'");
        }

        Ok(Self {
            region: normalize(region),
            world: normalize(world),
            permission,
        })
    }

    /// Parse `[region/][world:]permission`
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();

        let (region, world, permission) = match trimmed.rfind(WORLD_SEPARATOR) {
            Some(idx) => {
                let qualifier = &trimmed[..idx];
                let permission = &trimmed[idx + 1..];
                match qualifier.split_once(REGION_SEPARATOR) {
                    Some((region, world)) => (Some(region), Some(world), permission),
                    None => (None, Some(qualifier), permission),
                }
            }
            None => match trimmed.split_once(REGION_SEPARATOR) {
                Some((region, permission)) => (Some(region), None, permission),
                None => (None, None, trimmed),
            },
        };

        if permission.trim().is_empty() {
            return Err(PermissionError::MalformedPermission {
                permission: raw.to_string(),
                reason: "permission node is empty",
            });
        }
        Self::new(region, world, permission).map_err(|e| match e {
            PermissionError::MalformedPermission { reason, .. } => {
                PermissionError::MalformedPermission {
                    permission: raw.to_string(),
                    reason,
                }
            }
            other => other,
        })
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn world(&self) -> Option<&str> {
        self.world.as_deref()
    }

    pub fn permission(&self) -> &str {
        &self.permission
    }
}

fn normalize(part: Option<&str>) -> Option<String> {
    part.map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_lowercase)
}

impl fmt::Display for QualifiedPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.region, &self.world) {
            (Some(region), Some(world)) => write!(f, "{}/{}:{}", region, world, self.permission),
            (Some(region), None) => write!(f, "{}/:{}", region, self.permission),
            (None, Some(world)) => write!(f, "{}:{}", world, self.permission),
            // Empty world so the region separator is read as part of the node
            (None, None) if self.permission.contains(REGION_SEPARATOR) => {
                write!(f, ":{}", self.permission)
            }
            (None, None) => f.write_str(&self.permission),
        }
    }
}

impl FromStr for QualifiedPermission {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
