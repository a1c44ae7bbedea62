//! Per-species gene occurrence counts from the reference package corpus.

use crate::error::{ResolveError, ResolveResult};
use crate::gene::GeneId;
use crate::tables::{open_table_reader, tsv_reader};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct OccurrenceRecord {
    mapped_gene_ids: String,
    n: u64,
}

/// Read-only gene -> occurrence count lookup. Unknown genes count 0.
#[derive(Debug, Clone, Default)]
pub struct OccurrenceIndex {
    counts: HashMap<GeneId, u64>,
}

impl OccurrenceIndex {
    pub fn from_tsv<R: Read>(reader: R) -> ResolveResult<Self> {
        let mut rdr = tsv_reader(reader);
        let mut counts = HashMap::new();
        for record in rdr.deserialize::<OccurrenceRecord>() {
            let record = record?;
            let gene = GeneId::new(record.mapped_gene_ids.trim());
            if counts.insert(gene.clone(), record.n).is_some() {
                return Err(ResolveError::invalid_input(format!(
                    "Gene '{gene}' is listed more than once in the occurrence table"
                )));
            }
        }
        Ok(Self { counts })
    }

    pub fn from_tsv_path(path: &Path) -> ResolveResult<Self> {
        Self::from_tsv(open_table_reader(path)?).map_err(|e| {
            ResolveError::new(e.code, format!("Could not read '{}': {}", path.display(), e.message))
        })
    }

    pub fn count(&self, gene: &GeneId) -> u64 {
        self.counts.get(gene).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl<G: Into<GeneId>> FromIterator<(G, u64)> for OccurrenceIndex {
    fn from_iter<T: IntoIterator<Item = (G, u64)>>(iter: T) -> Self {
        Self {
            counts: iter.into_iter().map(|(g, n)| (g.into(), n)).collect(),
        }
    }
}
