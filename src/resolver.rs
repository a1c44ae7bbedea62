//! Groups probe rows and resolves every probe to at most one gene.

use crate::error::ResolveResult;
use crate::gene::{GeneId, ProbeId, Resolution};
use crate::tables::{ProbeRow, ResolvedRow};
use crate::tie_breaker::{
    DecidedBy, Decision, ResolutionContext, annotation_candidates, break_tie,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Candidate genes per probe, in probe id order. Candidates keep the order
/// they were encountered in, duplicates included.
pub type ProbeGroups = BTreeMap<ProbeId, Vec<GeneId>>;

pub fn group_by_probe<I>(rows: I) -> ProbeGroups
where
    I: IntoIterator<Item = ProbeRow>,
{
    let mut groups = ProbeGroups::new();
    for row in rows {
        let candidates = groups.entry(row.probe_id).or_default();
        if let Some(gene) = row.ensembl_id {
            candidates.push(GeneId::new(gene));
        }
    }
    groups
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedProbe {
    pub probe_id: ProbeId,
    #[serde(flatten)]
    pub decision: Decision,
}

/// A probe that could only be resolved by picking the lowest gene id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieEvent {
    pub probe_id: ProbeId,
    pub tied: Vec<GeneId>,
    pub picked: GeneId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRun {
    pub resolved: Vec<ResolvedProbe>,
}

impl ResolutionRun {
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, probe_id: &str) -> Option<&Resolution> {
        self.resolved
            .iter()
            .find(|p| p.probe_id == probe_id)
            .map(|p| &p.decision.resolution)
    }

    pub fn unresolved_count(&self) -> usize {
        self.resolved
            .iter()
            .filter(|p| p.decision.resolution == Resolution::Unresolved)
            .count()
    }

    pub fn ties(&self) -> Vec<TieEvent> {
        self.resolved
            .iter()
            .filter(|p| p.decision.decided_by == DecidedBy::Lexicographic)
            .filter_map(|p| {
                Some(TieEvent {
                    probe_id: p.probe_id.clone(),
                    tied: p.decision.tied.clone(),
                    picked: p.decision.resolution.gene()?.clone(),
                })
            })
            .collect()
    }

    pub fn decided_by_counts(&self) -> BTreeMap<DecidedBy, usize> {
        self.resolved
            .iter()
            .map(|p| p.decision.decided_by)
            .counts()
            .into_iter()
            .collect()
    }

    pub fn rows(&self) -> Vec<ResolvedRow> {
        self.resolved
            .iter()
            .map(|p| ResolvedRow::new(p.probe_id.clone(), &p.decision.resolution))
            .collect()
    }
}

pub struct Resolver<'a> {
    ctx: ResolutionContext<'a>,
    prefetch_threads: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(ctx: ResolutionContext<'a>) -> Self {
        Self {
            ctx,
            prefetch_threads: 1,
        }
    }

    /// With more than one thread, every annotation the run will need is
    /// looked up concurrently before the probes are resolved in order.
    pub fn with_prefetch_threads(mut self, threads: usize) -> Self {
        self.prefetch_threads = threads.max(1);
        self
    }

    pub fn resolve_probe(&self, probe_id: &str, candidates: &[GeneId]) -> ResolveResult<Decision> {
        if candidates.is_empty() {
            debug!(probe_id, "probe has no candidate genes");
            return Ok(Decision::unresolved(DecidedBy::NoCandidates));
        }
        break_tie(candidates, &self.ctx)
    }

    pub fn resolve_groups(&self, groups: &ProbeGroups) -> ResolveResult<ResolutionRun> {
        if self.prefetch_threads > 1 {
            let pending = groups
                .values()
                .flat_map(|candidates| annotation_candidates(candidates, self.ctx.occurrences))
                .unique()
                .collect::<Vec<_>>();
            self.ctx
                .annotations
                .prefetch(&pending, self.prefetch_threads)?;
        }

        let mut resolved = Vec::with_capacity(groups.len());
        for (probe_id, candidates) in groups {
            let decision = self.resolve_probe(probe_id, candidates)?;
            resolved.push(ResolvedProbe {
                probe_id: probe_id.clone(),
                decision,
            });
        }
        Ok(ResolutionRun { resolved })
    }

    pub fn resolve_rows(&self, rows: Vec<ProbeRow>) -> ResolveResult<ResolutionRun> {
        self.resolve_groups(&group_by_probe(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::GeneAnnotationProvider;
    use crate::gene::Species;
    use crate::karyotype::KaryotypeProvider;
    use crate::occurrences::OccurrenceIndex;
    use crate::tables::read_probe_rows;
    use crate::testing::{FixtureKaryotypes, FixtureLookup};
    use std::sync::Arc;

    fn fixture_lookup() -> FixtureLookup {
        FixtureLookup::new()
            .valid("ENSG00000000457", "1")
            .valid("ENSG00000000460", "CHR_HSCHR1_ALT_CTG1")
            .valid("ENSG00000000938", "X")
            .valid("ENSG00000001036", "6")
            .valid("ENSG00000001084", "6")
    }

    fn run_fixture(threads: usize) -> (ResolutionRun, Arc<FixtureLookup>) {
        let rows = read_probe_rows(include_str!("../test_files/data/illuminaTest.tsv").as_bytes())
            .unwrap();
        let occurrences =
            OccurrenceIndex::from_tsv(include_str!("../test_files/data/Homo_sapiens.tsv").as_bytes())
                .unwrap();
        let lookup = Arc::new(fixture_lookup());
        let karyotypes = KaryotypeProvider::new(Arc::new(
            FixtureKaryotypes::new().with("Homo sapiens", &["1", "6", "X"]),
        ));
        let annotations = GeneAnnotationProvider::new(lookup.clone());
        let species = Species::from("Homo sapiens");
        let ctx = ResolutionContext {
            species: &species,
            occurrences: &occurrences,
            karyotypes: &karyotypes,
            annotations: &annotations,
        };
        let run = Resolver::new(ctx)
            .with_prefetch_threads(threads)
            .resolve_rows(rows)
            .unwrap();
        (run, lookup)
    }

    #[test]
    fn test_group_by_probe_sorts_probes_and_keeps_candidate_order() {
        let rows = vec![
            ProbeRow {
                probe_id: "ILMN_2".to_string(),
                ensembl_id: Some("B".to_string()),
            },
            ProbeRow {
                probe_id: "ILMN_1".to_string(),
                ensembl_id: Some("Z".to_string()),
            },
            ProbeRow {
                probe_id: "ILMN_2".to_string(),
                ensembl_id: Some("A".to_string()),
            },
            ProbeRow {
                probe_id: "ILMN_3".to_string(),
                ensembl_id: None,
            },
        ];
        let groups = group_by_probe(rows);
        assert_eq!(
            groups.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["ILMN_1", "ILMN_2", "ILMN_3"]
        );
        assert_eq!(groups["ILMN_2"], vec![GeneId::from("B"), GeneId::from("A")]);
        assert!(groups["ILMN_3"].is_empty());
    }

    #[test]
    fn test_fixture_table_resolution() {
        let (run, _) = run_fixture(1);
        assert_eq!(run.len(), 5);
        let expect = [
            ("ILMN_1000", "ENSG00000000003", DecidedBy::Occurrence),
            ("ILMN_1001", "ENSG00000000419", DecidedBy::Occurrence),
            ("ILMN_1002", "ENSG00000000457", DecidedBy::MainAssembly),
            ("ILMN_1003", "ENSG00000000938", DecidedBy::Validity),
            ("ILMN_1004", "ENSG00000001036", DecidedBy::Lexicographic),
        ];
        for ((probe_id, gene, stage), got) in expect.iter().zip(run.resolved.iter()) {
            assert_eq!(got.probe_id, *probe_id);
            assert_eq!(got.decision.resolution, Resolution::Gene((*gene).into()));
            assert_eq!(got.decision.decided_by, *stage, "{probe_id}");
        }
        assert_eq!(
            run.ties(),
            vec![TieEvent {
                probe_id: "ILMN_1004".to_string(),
                tied: vec!["ENSG00000001036".into(), "ENSG00000001084".into()],
                picked: "ENSG00000001036".into(),
            }]
        );
        assert_eq!(run.decided_by_counts()[&DecidedBy::Occurrence], 2);
        assert_eq!(run.unresolved_count(), 0);
    }

    #[test]
    fn test_prefetch_gives_identical_results() {
        let (sequential, seq_lookup) = run_fixture(1);
        let (parallel, par_lookup) = run_fixture(4);
        assert_eq!(sequential, parallel);
        assert_eq!(seq_lookup.calls(), 5);
        assert_eq!(par_lookup.calls(), 5);
    }

    #[test]
    fn test_probe_without_candidates_is_unresolved() {
        let occurrences = OccurrenceIndex::default();
        let karyotypes = KaryotypeProvider::new(Arc::new(FixtureKaryotypes::new()));
        let lookup = Arc::new(FixtureLookup::new());
        let annotations = GeneAnnotationProvider::new(lookup.clone());
        let species = Species::from("Mus musculus");
        let resolver = Resolver::new(ResolutionContext {
            species: &species,
            occurrences: &occurrences,
            karyotypes: &karyotypes,
            annotations: &annotations,
        });
        let mut groups = ProbeGroups::new();
        groups.insert("ILMN_7".to_string(), vec![]);
        let run = resolver.resolve_groups(&groups).unwrap();
        assert_eq!(run.get("ILMN_7"), Some(&Resolution::Unresolved));
        assert_eq!(run.resolved[0].decision.decided_by, DecidedBy::NoCandidates);
        assert_eq!(run.rows()[0].ensembl_id, None);
        assert_eq!(lookup.calls(), 0);
    }
}
