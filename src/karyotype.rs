//! Main-assembly sequence regions per species.

use crate::error::{ErrorCode, ResolveError, ResolveResult};
use crate::gene::Species;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Remote (or fixture) source of a species' karyotype.
pub trait KaryotypeSource: Send + Sync {
    fn fetch_karyotype(&self, species: &Species) -> ResolveResult<HashSet<String>>;
}

/// Run-scoped karyotype cache. Each species is fetched at most once.
pub struct KaryotypeProvider {
    source: Arc<dyn KaryotypeSource>,
    cache: Mutex<HashMap<Species, Arc<HashSet<String>>>>,
}

impl KaryotypeProvider {
    pub fn new(source: Arc<dyn KaryotypeSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn karyotype(&self, species: &Species) -> ResolveResult<Arc<HashSet<String>>> {
        // Held across the fetch so concurrent callers wait instead of refetching.
        let mut cache = self.cache.lock().map_err(|_| {
            ResolveError::new(ErrorCode::Internal, "Karyotype cache lock poisoned")
        })?;
        if let Some(karyotype) = cache.get(species) {
            return Ok(karyotype.clone());
        }
        let karyotype = Arc::new(self.source.fetch_karyotype(species)?);
        if karyotype.is_empty() {
            warn!(%species, "empty karyotype, no region will count as main assembly");
        } else {
            info!(%species, regions = karyotype.len(), "fetched karyotype");
        }
        cache.insert(species.clone(), karyotype.clone());
        Ok(karyotype)
    }

    pub fn is_main_assembly(&self, seq_region_name: &str, species: &Species) -> ResolveResult<bool> {
        Ok(self.karyotype(species)?.contains(seq_region_name))
    }
}
