//! Run configuration, loaded from JSON with every field optional.

use crate::error::{ErrorCode, ResolveError, ResolveResult};
use crate::gene::Species;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "assets/probemap.json";
pub const DEFAULT_ENSEMBL_URL: &str = "https://rest.ensembl.org";

/// Microarray platform and the species its probes belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSpec {
    pub platform: String,
    pub species: Species,
}

impl PlatformSpec {
    pub fn new(platform: &str, species: &str) -> Self {
        Self {
            platform: platform.to_string(),
            species: Species::new(species),
        }
    }
}

/// Illumina BeadArray platforms with Brainarray counterparts.
pub fn default_platforms() -> Vec<PlatformSpec> {
    vec![
        PlatformSpec::new("illuminaHumanv1", "Homo sapiens"),
        PlatformSpec::new("illuminaHumanv2", "Homo sapiens"),
        PlatformSpec::new("illuminaHumanv3", "Homo sapiens"),
        PlatformSpec::new("illuminaHumanv4", "Homo sapiens"),
        PlatformSpec::new("illuminaMousev1", "Mus musculus"),
        PlatformSpec::new("illuminaMousev1p1", "Mus musculus"),
        PlatformSpec::new("illuminaMousev2", "Mus musculus"),
        PlatformSpec::new("illuminaRatv1", "Rattus norvegicus"),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per request, the first one included.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(20);
        Duration::from_millis(
            self.initial_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsemblConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for EnsemblConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ENSEMBL_URL.to_string(),
            timeout_secs: 60,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbemapConfig {
    /// Holds `{platform}.tsv` probe-to-candidate tables.
    pub input_dir: String,
    /// Holds `{Genus_species}.tsv` occurrence tables.
    pub occurrence_dir: String,
    pub output_dir: String,
    pub prefetch_threads: usize,
    pub ensembl: EnsemblConfig,
    pub platforms: Vec<PlatformSpec>,
}

impl Default for ProbemapConfig {
    fn default() -> Self {
        Self {
            input_dir: "out/00_scraping_illumina".to_string(),
            occurrence_dir: "out/01_scraping_brainarray_genes".to_string(),
            output_dir: "out/02_selecting_gene_ids".to_string(),
            prefetch_threads: 4,
            ensembl: EnsemblConfig::default(),
            platforms: default_platforms(),
        }
    }
}

impl ProbemapConfig {
    pub fn from_json_file(path: &str) -> ResolveResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            ResolveError::new(ErrorCode::Io, format!("Could not read config '{path}': {e}"))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            ResolveError::invalid_input(format!("Could not parse config '{path}': {e}"))
        })
    }

    /// An explicit path must exist; otherwise the default path is used when
    /// present and built-in defaults when not.
    pub fn load(path: Option<&str>) -> ResolveResult<Self> {
        match path {
            Some(path) => Self::from_json_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_json_file(DEFAULT_CONFIG_PATH)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn platform(&self, name: &str) -> Option<&PlatformSpec> {
        self.platforms.iter().find(|p| p.platform == name)
    }

    /// All configured platforms for an empty filter, otherwise the named ones
    /// in the order given.
    pub fn select_platforms(&self, names: &[String]) -> ResolveResult<Vec<PlatformSpec>> {
        if names.is_empty() {
            return Ok(self.platforms.clone());
        }
        names
            .iter()
            .map(|name| {
                self.platform(name).cloned().ok_or_else(|| {
                    ResolveError::invalid_input(format!("Unknown platform '{name}'"))
                })
            })
            .collect()
    }

    pub fn probe_table_path(&self, platform: &str) -> PathBuf {
        Path::new(&self.input_dir).join(format!("{platform}.tsv"))
    }

    pub fn occurrence_table_path(&self, species: &Species) -> PathBuf {
        Path::new(&self.occurrence_dir).join(format!("{}.tsv", species.file_stem()))
    }

    pub fn output_path(&self, platform: &str) -> PathBuf {
        Path::new(&self.output_dir).join(format!("{platform}.tsv"))
    }
}
