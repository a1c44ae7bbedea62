//! Gene identifiers, species names and annotation records.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type ProbeId = String;

/// Stable gene accession such as `ENSG00000157654`.
///
/// Ordering is plain string ordering. Ensembl stable ids share a prefix and a
/// fixed-width numeric suffix, so this coincides with numeric order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneId(String);

impl GeneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[cfg(test)]
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GeneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GeneId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for GeneId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Binomial species name as written in platform tables, e.g. `Homo sapiens`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Species(String);

impl Species {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_string())
    }

    #[cfg(test)]
    pub(crate) fn name(&self) -> &str {
        &self.0
    }

    /// `homo_sapiens`, the form used in Ensembl REST paths.
    pub fn ensembl_name(&self) -> String {
        self.0.to_lowercase().replace(' ', "_")
    }

    /// `Homo_sapiens`, the stem of per-species occurrence tables.
    pub fn file_stem(&self) -> String {
        self.0.replace(' ', "_")
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Species {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Species {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<Species> for String {
    fn from(species: Species) -> Self {
        species.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GeneAnnotation {
    /// The identifier no longer resolves (retired or merged).
    Invalid,
    Valid { seq_region_name: String },
}

impl GeneAnnotation {
    pub fn valid(seq_region_name: impl Into<String>) -> Self {
        Self::Valid {
            seq_region_name: seq_region_name.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    #[cfg(test)]
    pub(crate) fn seq_region_name(&self) -> Option<&str> {
        match self {
            Self::Valid { seq_region_name } => Some(seq_region_name),
            Self::Invalid => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Gene(GeneId),
    Unresolved,
}

impl Resolution {
    pub fn gene(&self) -> Option<&GeneId> {
        match self {
            Self::Gene(id) => Some(id),
            Self::Unresolved => None,
        }
    }
}
