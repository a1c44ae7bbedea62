//! Memoized gene annotation lookups.

use crate::error::{ErrorCode, ResolveError, ResolveResult};
use crate::gene::{GeneAnnotation, GeneId};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Backing lookup for a single gene id.
///
/// An id the service cannot find must come back as `Ok(GeneAnnotation::Invalid)`.
/// `Err` is reserved for faults (network, unexpected status, unreadable body).
pub trait GeneLookup: Send + Sync {
    fn lookup_gene(&self, gene: &GeneId) -> ResolveResult<GeneAnnotation>;
}

type Slot = Arc<Mutex<Option<GeneAnnotation>>>;

/// Run-scoped annotation cache.
///
/// Every gene id owns a slot; whoever locks an empty slot first performs the
/// lookup while later callers for the same id block on that slot. A failed
/// lookup leaves the slot empty.
pub struct GeneAnnotationProvider {
    lookup: Arc<dyn GeneLookup>,
    slots: Mutex<HashMap<GeneId, Slot>>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> ResolveResult<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| ResolveError::new(ErrorCode::Internal, format!("{what} lock poisoned")))
}

impl GeneAnnotationProvider {
    pub fn new(lookup: Arc<dyn GeneLookup>) -> Self {
        Self {
            lookup,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, gene: &GeneId) -> ResolveResult<Slot> {
        let mut slots = lock(&self.slots, "Annotation cache")?;
        Ok(slots.entry(gene.clone()).or_default().clone())
    }

    pub fn annotate(&self, gene: &GeneId) -> ResolveResult<GeneAnnotation> {
        let slot = self.slot(gene)?;
        let mut entry = lock(&slot, "Annotation slot")?;
        if let Some(annotation) = entry.as_ref() {
            return Ok(annotation.clone());
        }
        let annotation = self.lookup.lookup_gene(gene)?;
        if !annotation.is_valid() {
            debug!(%gene, "gene id is invalid or outdated");
        }
        *entry = Some(annotation.clone());
        Ok(annotation)
    }

    /// Looks up `genes` on a pool of `threads` workers. Already cached ids and
    /// duplicates cost nothing extra.
    pub fn prefetch(&self, genes: &[GeneId], threads: usize) -> ResolveResult<()> {
        let pending = genes
            .iter()
            .filter(|g| self.cached(g).is_none())
            .collect::<Vec<_>>();
        if pending.is_empty() {
            return Ok(());
        }
        info!(genes = pending.len(), threads, "prefetching gene annotations");
        if threads <= 1 {
            return pending.into_iter().try_for_each(|g| self.annotate(g).map(|_| ()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| {
                ResolveError::new(ErrorCode::Internal, format!("Could not start lookup pool: {e}"))
            })?;
        pool.install(|| {
            pending
                .par_iter()
                .try_for_each(|g| self.annotate(g).map(|_| ()))
        })
    }

    pub fn cached(&self, gene: &GeneId) -> Option<GeneAnnotation> {
        let slot = self.slots.lock().ok()?.get(gene)?.clone();
        let entry = slot.lock().ok()?;
        entry.clone()
    }

    /// Number of ids with a completed lookup.
    pub fn cached_len(&self) -> usize {
        let Ok(slots) = self.slots.lock() else {
            return 0;
        };
        slots
            .values()
            .filter(|slot| slot.lock().map(|e| e.is_some()).unwrap_or(false))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixtureLookup;
    use std::time::Duration;

    fn ids(raw: &[&str]) -> Vec<GeneId> {
        raw.iter().map(|s| GeneId::from(*s)).collect()
    }

    #[test]
    fn test_annotate_is_memoized() {
        let lookup = Arc::new(
            FixtureLookup::new()
                .valid("ENSG1", "1")
                .invalid("ENSG2"),
        );
        let provider = GeneAnnotationProvider::new(lookup.clone());
        for _ in 0..3 {
            assert_eq!(
                provider.annotate(&"ENSG1".into()).unwrap(),
                GeneAnnotation::valid("1")
            );
            assert_eq!(
                provider.annotate(&"ENSG2".into()).unwrap(),
                GeneAnnotation::Invalid
            );
        }
        assert_eq!(lookup.calls(), 2);
        assert_eq!(provider.cached_len(), 2);
    }

    #[test]
    fn test_failure_is_not_reported_as_invalid_and_not_cached() {
        let lookup = Arc::new(FixtureLookup::new().valid("ENSG1", "1").failing("ENSG3"));
        let provider = GeneAnnotationProvider::new(lookup.clone());
        let err = provider.annotate(&"ENSG3".into()).unwrap_err();
        assert_eq!(err.code, ErrorCode::Transport);
        assert_eq!(provider.cached(&"ENSG3".into()), None);
        // Other ids are unaffected.
        assert!(provider.annotate(&"ENSG1".into()).unwrap().is_valid());
        assert!(provider.annotate(&"ENSG3".into()).is_err());
        assert_eq!(lookup.calls_for("ENSG3"), 2);
    }

    #[test]
    fn test_parallel_prefetch_deduplicates_in_flight_lookups() {
        let lookup = Arc::new(
            FixtureLookup::new()
                .valid("ENSG1", "1")
                .valid("ENSG2", "2")
                .invalid("ENSG3")
                .with_delay(Duration::from_millis(20)),
        );
        let provider = GeneAnnotationProvider::new(lookup.clone());
        let genes = ids(&[
            "ENSG1", "ENSG2", "ENSG3", "ENSG1", "ENSG2", "ENSG3", "ENSG1", "ENSG1",
        ]);
        provider.prefetch(&genes, 4).unwrap();
        assert_eq!(lookup.calls_for("ENSG1"), 1);
        assert_eq!(lookup.calls_for("ENSG2"), 1);
        assert_eq!(lookup.calls_for("ENSG3"), 1);
        assert_eq!(provider.cached(&"ENSG3".into()), Some(GeneAnnotation::Invalid));

        provider.prefetch(&genes, 4).unwrap();
        assert_eq!(lookup.calls(), 3);
    }

    #[test]
    fn test_prefetch_surfaces_faults() {
        let lookup = Arc::new(FixtureLookup::new().valid("ENSG1", "1").failing("ENSG9"));
        let provider = GeneAnnotationProvider::new(lookup);
        let err = provider.prefetch(&ids(&["ENSG1", "ENSG9"]), 2).unwrap_err();
        assert_eq!(err.code, ErrorCode::Transport);
    }
}
