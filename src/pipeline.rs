//! Resolves every configured platform table in one run.
//!
//! Karyotype and annotation caches live for the whole run and are shared by
//! all platforms. Occurrence tables are loaded once per species.

use crate::annotation::{GeneAnnotationProvider, GeneLookup};
use crate::config::{PlatformSpec, ProbemapConfig};
use crate::ensembl::EnsemblClient;
use crate::error::ResolveResult;
use crate::gene::Species;
use crate::karyotype::{KaryotypeProvider, KaryotypeSource};
use crate::occurrences::OccurrenceIndex;
use crate::resolver::{Resolver, TieEvent};
use crate::tables::{read_probe_rows_from_path, write_resolved_to_path};
use crate::tie_breaker::{DecidedBy, ResolutionContext};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformReport {
    pub platform: String,
    pub species: Species,
    pub input: String,
    pub output: String,
    pub probes: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub decided_by: BTreeMap<DecidedBy, usize>,
    pub ties: Vec<TieEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub platforms: Vec<PlatformReport>,
    pub annotations_fetched: usize,
}

pub struct Pipeline {
    config: ProbemapConfig,
    karyotypes: KaryotypeProvider,
    annotations: GeneAnnotationProvider,
    occurrences: HashMap<Species, OccurrenceIndex>,
}

impl Pipeline {
    pub fn new(
        config: ProbemapConfig,
        karyotype_source: Arc<dyn KaryotypeSource>,
        lookup: Arc<dyn GeneLookup>,
    ) -> Self {
        Self {
            config,
            karyotypes: KaryotypeProvider::new(karyotype_source),
            annotations: GeneAnnotationProvider::new(lookup),
            occurrences: HashMap::new(),
        }
    }

    pub fn with_ensembl(config: ProbemapConfig) -> ResolveResult<Self> {
        let client = Arc::new(EnsemblClient::new(&config.ensembl)?);
        Ok(Self::new(config, client.clone(), client))
    }

    fn load_occurrences(&mut self, species: &Species) -> ResolveResult<()> {
        if !self.occurrences.contains_key(species) {
            let path = self.config.occurrence_table_path(species);
            let index = OccurrenceIndex::from_tsv_path(&path)?;
            info!(%species, genes = index.len(), path = %path.display(), "loaded occurrence counts");
            self.occurrences.insert(species.clone(), index);
        }
        Ok(())
    }

    fn resolve_table(
        &self,
        label: &str,
        species: &Species,
        occurrences: &OccurrenceIndex,
        input: &Path,
        output: &Path,
    ) -> ResolveResult<PlatformReport> {
        info!(platform = label, %species, "resolving probes");
        let rows = read_probe_rows_from_path(input)?;
        let ctx = ResolutionContext {
            species,
            occurrences,
            karyotypes: &self.karyotypes,
            annotations: &self.annotations,
        };
        let run = Resolver::new(ctx)
            .with_prefetch_threads(self.config.prefetch_threads)
            .resolve_rows(rows)?;
        write_resolved_to_path(output, &run.rows())?;

        let unresolved = run.unresolved_count();
        let ties = run.ties();
        info!(
            platform = label,
            probes = run.len(),
            unresolved,
            ties = ties.len(),
            output = %output.display(),
            "wrote resolved probes"
        );
        Ok(PlatformReport {
            platform: label.to_string(),
            species: species.clone(),
            input: input.display().to_string(),
            output: output.display().to_string(),
            probes: run.len(),
            resolved: run.len() - unresolved,
            unresolved,
            decided_by: run.decided_by_counts(),
            ties,
        })
    }

    pub fn resolve_platform(&mut self, spec: &PlatformSpec) -> ResolveResult<PlatformReport> {
        self.load_occurrences(&spec.species)?;
        let occurrences = &self.occurrences[&spec.species];
        let input = self.config.probe_table_path(&spec.platform);
        let output = self.config.output_path(&spec.platform);
        self.resolve_table(&spec.platform, &spec.species, occurrences, &input, &output)
    }

    /// Resolves one table outside the configured directory layout.
    pub fn resolve_files(
        &self,
        input: &Path,
        occurrences: &Path,
        species: &Species,
        output: &Path,
    ) -> ResolveResult<PlatformReport> {
        let index = OccurrenceIndex::from_tsv_path(occurrences)?;
        let label = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| input.display().to_string());
        self.resolve_table(&label, species, &index, input, output)
    }

    /// Runs the named platforms, or all configured ones for an empty list.
    /// Stops at the first failing platform; tables already written stay.
    pub fn run(&mut self, platform_names: &[String]) -> ResolveResult<PipelineReport> {
        let selected = self.config.select_platforms(platform_names)?;
        let mut platforms = Vec::with_capacity(selected.len());
        for spec in &selected {
            platforms.push(self.resolve_platform(spec)?);
        }
        Ok(PipelineReport {
            platforms,
            annotations_fetched: self.annotations.cached_len(),
        })
    }
}
