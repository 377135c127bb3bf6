use crate::descriptor::scalar_string;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to parse repository index: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// A single pak advertised by a repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: String,
    /// Address of the pak descriptor, relative to the index or absolute.
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// The repository index: the list of paks a repository offers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoIndex {
    #[serde(default)]
    pub paks: Vec<IndexEntry>,
}

impl RepoIndex {
    pub fn from_bytes(data: &[u8]) -> Result<Self, IndexError> {
        Ok(serde_yaml::from_slice(data)?)
    }

    /// Find a pak by name. Without a version the first listed entry wins.
    pub fn lookup(&self, name: &str, version: Option<&str>) -> Option<&IndexEntry> {
        self.paks
            .iter()
            .find(|e| e.name == name && version.is_none_or(|v| e.version == v))
    }
}

/// Split a reference like `name@version` into (name, version).
pub fn parse_pak_ref(reference: &str) -> (&str, Option<&str>) {
    match reference.split_once('@') {
        Some((name, version)) if !version.is_empty() => (name, Some(version)),
        Some((name, _)) => (name, None),
        None => (reference, None),
    }
}

/// Whether `reference` names a pak in the repository index rather than
/// addressing a descriptor directly.
pub fn is_bare_name(reference: &str) -> bool {
    let lower = reference.to_ascii_lowercase();
    !reference.is_empty()
        && !reference.starts_with('.')
        && !reference.contains('/')
        && !reference.contains('\\')
        && !lower.ends_with(".yaml")
        && !lower.ends_with(".yml")
        && !lower.ends_with(".json")
}
