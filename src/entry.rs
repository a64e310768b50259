use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::errors::{ModsyncError, Result};
use crate::requirement::RequirementLevel;

/// Serialized shape of a component declaration, used by manifests,
/// configuration files and the wire payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDecl {
    pub id: String,
    pub version: String,
    pub requirement: RequirementLevel,
}

/// One declared component. Immutable once constructed.
///
/// Two entries are equal when their identity and version match; the
/// requirement level is not part of equality.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "ComponentDecl", into = "ComponentDecl")]
pub struct ComponentEntry {
    id: String,
    version: String,
    requirement: RequirementLevel,
}

impl ComponentEntry {
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        requirement: RequirementLevel,
    ) -> Result<Self> {
        let id = id.into();
        let version = version.into();
        if id.trim().is_empty() {
            return Err(ModsyncError::MalformedEntry(
                "component identity is empty".to_owned(),
            ));
        }
        if version.trim().is_empty() {
            return Err(ModsyncError::MalformedEntry(format!(
                "component `{}` has an empty version",
                id
            )));
        }
        Ok(Self {
            id,
            version,
            requirement,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn requirement(&self) -> RequirementLevel {
        self.requirement
    }
}

impl PartialEq for ComponentEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.version == other.version
    }
}

impl Eq for ComponentEntry {}

impl Hash for ComponentEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.version.hash(state);
    }
}

impl fmt::Display for ComponentEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

impl TryFrom<ComponentDecl> for ComponentEntry {
    type Error = ModsyncError;

    fn try_from(decl: ComponentDecl) -> Result<Self> {
        ComponentEntry::new(decl.id, decl.version, decl.requirement)
    }
}

impl From<ComponentEntry> for ComponentDecl {
    fn from(entry: ComponentEntry) -> Self {
        Self {
            id: entry.id,
            version: entry.version,
            requirement: entry.requirement,
        }
    }
}

/// Canonical set of declarations for one side, keyed by identity.
///
/// Only [`crate::merge::merge`] builds a non-empty set, which keeps every
/// identity unique.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentSet {
    entries: BTreeMap<String, ComponentEntry>,
}

impl ComponentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&ComponentEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by identity.
    pub fn iter(&self) -> btree_map::Values<'_, String, ComponentEntry> {
        self.entries.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<ComponentEntry> {
        self.entries.values().cloned().collect()
    }

    /// Compact `id@version, ...` rendering for logs.
    pub fn stringify(&self) -> String {
        self.entries
            .values()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn entry(
        &mut self,
        id: String,
    ) -> btree_map::Entry<'_, String, ComponentEntry> {
        self.entries.entry(id)
    }
}

impl<'a> IntoIterator for &'a ComponentSet {
    type Item = &'a ComponentEntry;
    type IntoIter = btree_map::Values<'a, String, ComponentEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}
