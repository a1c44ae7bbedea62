//! In-memory providers for tests.

use crate::annotation::GeneLookup;
use crate::error::{ErrorCode, ResolveError, ResolveResult};
use crate::gene::{GeneAnnotation, GeneId, Species};
use crate::karyotype::KaryotypeSource;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Answers from a fixed table; unknown ids are reported as invalid, ids
/// marked `failing` return a transport error.
#[derive(Default)]
pub struct FixtureLookup {
    annotations: HashMap<GeneId, GeneAnnotation>,
    failing: HashSet<GeneId>,
    delay: Option<Duration>,
    calls: Mutex<HashMap<GeneId, usize>>,
}

impl FixtureLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid(mut self, gene: &str, seq_region_name: &str) -> Self {
        self.annotations
            .insert(gene.into(), GeneAnnotation::valid(seq_region_name));
        self
    }

    pub fn invalid(mut self, gene: &str) -> Self {
        self.annotations.insert(gene.into(), GeneAnnotation::Invalid);
        self
    }

    pub fn failing(mut self, gene: &str) -> Self {
        self.failing.insert(gene.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn calls_for(&self, gene: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&GeneId::from(gene))
            .copied()
            .unwrap_or(0)
    }
}

impl GeneLookup for FixtureLookup {
    fn lookup_gene(&self, gene: &GeneId) -> ResolveResult<GeneAnnotation> {
        *self.calls.lock().unwrap().entry(gene.clone()).or_default() += 1;
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.failing.contains(gene) {
            return Err(ResolveError::transport(format!(
                "Lookup of '{gene}' failed: connection reset"
            )));
        }
        Ok(self
            .annotations
            .get(gene)
            .cloned()
            .unwrap_or(GeneAnnotation::Invalid))
    }
}

#[derive(Default)]
pub struct FixtureKaryotypes {
    karyotypes: HashMap<Species, HashSet<String>>,
    calls: AtomicUsize,
}

impl FixtureKaryotypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, species: &str, regions: &[&str]) -> Self {
        self.karyotypes.insert(
            species.into(),
            regions.iter().map(|r| r.to_string()).collect(),
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl KaryotypeSource for FixtureKaryotypes {
    fn fetch_karyotype(&self, species: &Species) -> ResolveResult<HashSet<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.karyotypes.get(species).cloned().ok_or_else(|| {
            ResolveError::new(ErrorCode::NotFound, format!("No karyotype for '{species}'"))
        })
    }
}
