//! Sources of locally installed components.
//!
//! Discovering what is installed belongs to the host; this module only
//! defines the seam the negotiation context reads from, plus two simple
//! providers: a fixed list and a TOML manifest on disk.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::entry::{ComponentDecl, ComponentEntry};
use crate::errors::{ModsyncError, Result};

pub trait Inventory: Send + Sync {
    fn installed(&self) -> Result<Vec<ComponentEntry>>;
}

/// Inventory backed by a list known up front.
#[derive(Clone, Debug, Default)]
pub struct StaticInventory {
    entries: Vec<ComponentEntry>,
}

impl StaticInventory {
    pub fn new(entries: Vec<ComponentEntry>) -> Self {
        Self { entries }
    }
}

impl Inventory for StaticInventory {
    fn installed(&self) -> Result<Vec<ComponentEntry>> {
        Ok(self.entries.clone())
    }
}

/// On-disk list of components:
///
/// ```toml
/// [[components]]
/// id = "fabric-api"
/// version = "0.92.0"
/// requirement = "BOTH_REQUIRED"
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub components: Vec<ComponentDecl>,
}

impl Manifest {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    pub fn entries(&self) -> Result<Vec<ComponentEntry>> {
        self.components
            .iter()
            .cloned()
            .map(ComponentEntry::try_from)
            .collect()
    }
}

impl FromIterator<ComponentEntry> for Manifest {
    fn from_iter<T: IntoIterator<Item = ComponentEntry>>(iter: T) -> Self {
        Self {
            components: iter.into_iter().map(ComponentDecl::from).collect(),
        }
    }
}

/// Inventory read from a [`Manifest`] file each time it is queried.
#[derive(Clone, Debug)]
pub struct ManifestInventory {
    path: PathBuf,
}

impl ManifestInventory {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl Inventory for ManifestInventory {
    fn installed(&self) -> Result<Vec<ComponentEntry>> {
        Manifest::load(&self.path)
            .and_then(|manifest| manifest.entries())
            .map_err(|e| match e {
                ModsyncError::Io(io) => ModsyncError::Io(std::io::Error::new(
                    io.kind(),
                    format!("{}: {}", self.path.display(), io),
                )),
                other => other,
            })
    }
}
