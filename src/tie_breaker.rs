//! Picks one gene for a probe with several candidate genes.
//!
//! Filters run in a fixed order and each one only ever narrows the set:
//!
//! 1. occurrence count in the reference corpus (highest count wins, all-zero
//!    keeps every candidate),
//! 2. identifier validity (retired ids are dropped, none left means
//!    unresolved),
//! 3. placement on the species' main assembly (if nobody is on it, the valid
//!    set is kept),
//! 4. lowest gene id.
//!
//! Duplicate candidates are compared once; repeating an id gives it no extra
//! weight.

use crate::annotation::GeneAnnotationProvider;
use crate::error::{ErrorCode, ResolveError, ResolveResult};
use crate::gene::{GeneAnnotation, GeneId, Resolution, Species};
use crate::karyotype::KaryotypeProvider;
use crate::occurrences::OccurrenceIndex;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Everything the cascade may consult for one species.
#[derive(Clone, Copy)]
pub struct ResolutionContext<'a> {
    pub species: &'a Species,
    pub occurrences: &'a OccurrenceIndex,
    pub karyotypes: &'a KaryotypeProvider,
    pub annotations: &'a GeneAnnotationProvider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecidedBy {
    Occurrence,
    Validity,
    MainAssembly,
    Lexicographic,
    NoValidCandidate,
    /// The probe had no usable gene id at all; the cascade never ran.
    NoCandidates,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub resolution: Resolution,
    pub decided_by: DecidedBy,
    /// Genes still tied when the lowest id was picked. Empty otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tied: Vec<GeneId>,
}

impl Decision {
    fn winner(gene: GeneId, decided_by: DecidedBy) -> Self {
        Self {
            resolution: Resolution::Gene(gene),
            decided_by,
            tied: vec![],
        }
    }

    pub(crate) fn unresolved(decided_by: DecidedBy) -> Self {
        Self {
            resolution: Resolution::Unresolved,
            decided_by,
            tied: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OccurrenceOutcome {
    Winner(GeneId),
    /// Distinct genes to hand to the annotation filters, in first-seen order.
    Tied(Vec<GeneId>),
}

pub fn filter_by_occurrence(candidates: &[GeneId], occurrences: &OccurrenceIndex) -> OccurrenceOutcome {
    let distinct = candidates.iter().unique().collect::<Vec<_>>();
    let nonzero = distinct
        .iter()
        .map(|gene| (*gene, occurrences.count(gene)))
        .filter(|(_, n)| *n > 0)
        .collect::<Vec<_>>();

    if nonzero.is_empty() {
        return OccurrenceOutcome::Tied(distinct.into_iter().cloned().collect());
    }
    let max = nonzero.iter().map(|(_, n)| *n).max().unwrap_or(0);
    let mut tied = nonzero
        .into_iter()
        .filter(|(_, n)| *n == max)
        .map(|(gene, _)| gene.clone())
        .collect::<Vec<_>>();
    if tied.len() == 1 {
        OccurrenceOutcome::Winner(tied.remove(0))
    } else {
        OccurrenceOutcome::Tied(tied)
    }
}

/// Genes whose annotation the cascade will need for these candidates.
pub fn annotation_candidates(candidates: &[GeneId], occurrences: &OccurrenceIndex) -> Vec<GeneId> {
    match filter_by_occurrence(candidates, occurrences) {
        OccurrenceOutcome::Winner(_) => vec![],
        OccurrenceOutcome::Tied(genes) => genes,
    }
}

pub fn break_tie(candidates: &[GeneId], ctx: &ResolutionContext<'_>) -> ResolveResult<Decision> {
    if candidates.is_empty() {
        return Err(ResolveError::invalid_input(
            "Cannot break a tie between zero candidate genes",
        ));
    }

    let tied = match filter_by_occurrence(candidates, ctx.occurrences) {
        OccurrenceOutcome::Winner(gene) => return Ok(Decision::winner(gene, DecidedBy::Occurrence)),
        OccurrenceOutcome::Tied(genes) => genes,
    };

    let mut valid = Vec::with_capacity(tied.len());
    for gene in tied {
        match ctx.annotations.annotate(&gene)? {
            GeneAnnotation::Valid { seq_region_name } => valid.push((gene, seq_region_name)),
            GeneAnnotation::Invalid => {
                info!(%gene, "filtered tied gene with an invalid or outdated id")
            }
        }
    }
    match valid.len() {
        0 => return Ok(Decision::unresolved(DecidedBy::NoValidCandidate)),
        1 => {
            let (gene, _) = valid.remove(0);
            return Ok(Decision::winner(gene, DecidedBy::Validity));
        }
        _ => {}
    }

    let mut on_main = Vec::with_capacity(valid.len());
    for (gene, seq_region_name) in &valid {
        if ctx.karyotypes.is_main_assembly(seq_region_name, ctx.species)? {
            on_main.push(gene.clone());
        }
    }
    let tied = match on_main.len() {
        1 => return Ok(Decision::winner(on_main.remove(0), DecidedBy::MainAssembly)),
        0 => valid.into_iter().map(|(gene, _)| gene).collect::<Vec<_>>(),
        _ => on_main,
    };

    let winner = tied.iter().min().cloned().ok_or_else(|| {
        ResolveError::new(ErrorCode::Internal, "Tie-break ended with an empty tied set")
    })?;
    info!(
        species = %ctx.species,
        tied = %tied.iter().join(", "),
        %winner,
        "tie broken by lowest gene id"
    );
    Ok(Decision {
        resolution: Resolution::Gene(winner),
        decided_by: DecidedBy::Lexicographic,
        tied,
    })
}
