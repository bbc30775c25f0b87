//! Entities, entries and metadata

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{same_name, EntityKind, Membership};

/// One permission fact owned by an entity
///
/// At most one entry exists per `(region, world, permission)` triple of an
/// entity. All three components are stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub region: Option<String>,
    pub world: Option<String>,
    pub permission: String,
    pub value: bool,
}

impl Entry {
    pub fn new(region: Option<&str>, world: Option<&str>, permission: &str, value: bool) -> Self {
        Self {
            region: region.map(str::to_lowercase),
            world: world.map(str::to_lowercase),
            permission: permission.to_lowercase(),
            value,
        }
    }

    /// Whether this entry occupies the given qualifier triple
    pub fn matches(&self, region: Option<&str>, world: Option<&str>, permission: &str) -> bool {
        eq_opt(self.region.as_deref(), region)
            && eq_opt(self.world.as_deref(), world)
            && same_name(&self.permission, permission)
    }
}

fn eq_opt(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => same_name(a, b),
        _ => false,
    }
}

/// Typed metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Real(f64),
    String(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Real(r) => write!(f, "{}", r),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A named player or group as loaded from storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionEntity {
    /// Lower-cased unique name
    pub name: String,
    /// Name in its original case
    pub display_name: String,
    pub kind: EntityKind,
    /// Tie-break weight, groups only (higher wins)
    #[serde(default)]
    pub priority: i32,
    /// Ordered parent group names, groups only
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub metadata: BTreeMap<String, MetadataValue>,
    /// For players the groups they belong to, for groups their members
    #[serde(default)]
    pub memberships: Vec<Membership>,
}

impl PermissionEntity {
    pub fn new(name: &str, kind: EntityKind) -> Self {
        Self {
            name: name.to_lowercase(),
            display_name: name.to_string(),
            kind,
            priority: 0,
            parents: Vec::new(),
            entries: Vec::new(),
            metadata: BTreeMap::new(),
            memberships: Vec::new(),
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind.is_group()
    }

    /// Look up the entry for a qualifier triple
    pub fn entry(
        &self,
        region: Option<&str>,
        world: Option<&str>,
        permission: &str,
    ) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.matches(region, world, permission))
    }

    /// Insert or overwrite the entry for its triple
    pub fn set_entry(&mut self, entry: Entry) {
        let existing = self.entries.iter_mut().find(|e| {
            e.matches(entry.region.as_deref(), entry.world.as_deref(), &entry.permission)
        });
        match existing {
            Some(e) => e.value = entry.value,
            None => self.entries.push(entry),
        }
    }

    /// Remove the entry for a triple, returning whether one existed
    pub fn unset_entry(
        &mut self,
        region: Option<&str>,
        world: Option<&str>,
        permission: &str,
    ) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !e.matches(region, world, permission));
        self.entries.len() != before
    }

    /// Whether `parent` appears in the parent list
    pub fn has_parent(&self, parent: &str) -> bool {
        self.parents.iter().any(|p| same_name(p, parent))
    }
}
