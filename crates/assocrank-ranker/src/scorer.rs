//! Association score computation for one (target, disease) key.
//!
//! Runs every requested reduction method over the key's evidence list and
//! returns a fully populated `AssociationScoreSet`. Pure computation: an
//! empty list gives the seeded all-zero set. Callers decide what to do with
//! a key none of whose evidence was admitted (see `KeyScores::admitted`).

use std::collections::HashMap;
use std::sync::Arc;

use assocrank_common::{
    AssociationScore, AssociationScoreSet, DatasourceRegistry, EvidenceScore, MaxMode, PairKey,
    ScoringMethod,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::harmonic::{harmonic_sum, HarmonicSumScorer, DEFAULT_BUFFER};

/// Scorer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Retained scores per datasource for the harmonic sum.
    pub max_entries: usize,
    pub max_mode: MaxMode,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_BUFFER,
            max_mode: MaxMode::Nested,
        }
    }
}

/// Scores for one key, with how much of its evidence went into them.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyScores {
    pub scores: AssociationScoreSet,
    /// Items whose datasource is registered.
    pub admitted: usize,
    /// Items skipped because their datasource is not registered.
    pub unregistered: usize,
}

impl KeyScores {
    pub fn has_usable_evidence(&self) -> bool {
        self.admitted > 0
    }
}

/// An evidence item whose datasource is registered, with the registry's
/// datatype attached.
struct Admitted<'a> {
    score: f64,
    datatype: &'a str,
    datasource: &'a str,
}

/// Applies the reduction methods. Cheap to share across workers.
#[derive(Debug, Clone)]
pub struct Scorer {
    registry: Arc<DatasourceRegistry>,
    config: ScorerConfig,
}

impl Scorer {
    pub fn new(registry: Arc<DatasourceRegistry>, config: ScorerConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &DatasourceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Score with every method.
    pub fn score(&self, key: &PairKey, evidence: &[EvidenceScore]) -> AssociationScoreSet {
        self.score_methods(key, evidence, &ScoringMethod::ALL).scores
    }

    /// Score with the listed methods only; the others stay seeded at zero.
    pub fn score_methods(
        &self,
        key: &PairKey,
        evidence: &[EvidenceScore],
        methods: &[ScoringMethod],
    ) -> KeyScores {
        let mut set = AssociationScoreSet::new(key, &self.registry);
        let admitted = self.admit(key, evidence);
        let admitted_count = admitted.len();

        for method in ScoringMethod::ALL {
            if !methods.contains(&method) {
                continue;
            }
            let acc = set.method_mut(method);
            match method {
                ScoringMethod::HarmonicSum => self.harmonic_sum(&admitted, acc),
                ScoringMethod::Sum => Self::sum(&admitted, acc),
                ScoringMethod::Max => Self::max(&admitted, acc, self.config.max_mode),
            }
        }
        KeyScores {
            scores: set,
            admitted: admitted_count,
            unregistered: evidence.len() - admitted_count,
        }
    }

    fn admit<'a>(&'a self, key: &PairKey, evidence: &'a [EvidenceScore]) -> Vec<Admitted<'a>> {
        let mut admitted = Vec::with_capacity(evidence.len());
        for e in evidence {
            match self.registry.datatype_of(&e.datasource) {
                Some(datatype) => admitted.push(Admitted {
                    score: e.score,
                    datatype,
                    datasource: &e.datasource,
                }),
                None => debug!(
                    pair = %key,
                    datasource = %e.datasource,
                    "Skipping evidence from unregistered datasource"
                ),
            }
        }
        admitted
    }

    /// Per-datasource bounded harmonic sums, closed upwards: a datatype
    /// scores the harmonic sum of its datasources, `overall` the harmonic
    /// sum of the datatypes.
    fn harmonic_sum(&self, items: &[Admitted<'_>], acc: &mut AssociationScore) {
        let mut per_source: HashMap<&str, (HarmonicSumScorer, &str)> = HashMap::new();
        for e in items {
            acc.record_evidence(e.datatype, e.datasource);
            per_source
                .entry(e.datasource)
                .or_insert_with(|| (HarmonicSumScorer::new(self.config.max_entries), e.datatype))
                .0
                .add(e.score);
        }

        let mut per_type: HashMap<&str, Vec<f64>> = HashMap::new();
        for (datasource, (scorer, datatype)) in &per_source {
            let s = scorer.score();
            acc.datasources.insert(datasource.to_string(), s);
            per_type.entry(*datatype).or_default().push(s);
        }
        for (datatype, scores) in per_type {
            acc.datatypes.insert(datatype.to_string(), harmonic_sum(&scores));
        }

        let datatype_scores: Vec<f64> = acc.datatypes.values().copied().collect();
        acc.overall = harmonic_sum(&datatype_scores);
    }

    /// Linear accumulation; `overall` grows with evidence volume.
    fn sum(items: &[Admitted<'_>], acc: &mut AssociationScore) {
        for e in items {
            acc.overall += e.score;
            acc.record_evidence(e.datatype, e.datasource);
            *acc.datatypes.entry(e.datatype.to_string()).or_insert(0.0) += e.score;
            *acc.datasources.entry(e.datasource.to_string()).or_insert(0.0) += e.score;
        }
    }

    fn max(items: &[Admitted<'_>], acc: &mut AssociationScore, mode: MaxMode) {
        for e in items {
            match mode {
                MaxMode::Nested => {
                    // The gate reads the datasource slot but the write lands
                    // on the datatype-named slot, so the gate only closes when
                    // a datasource shares its datatype's name.
                    let gate = acc.datasources.get(e.datasource).copied().unwrap_or(0.0);
                    if e.score > gate {
                        acc.datasources.insert(e.datatype.to_string(), e.score);
                        if raise(&mut acc.datatypes, e.datatype, e.score) && e.score > acc.overall {
                            acc.overall = e.score;
                        }
                    }
                }
                MaxMode::Independent => {
                    raise(&mut acc.datasources, e.datasource, e.score);
                    raise(&mut acc.datatypes, e.datatype, e.score);
                    if e.score > acc.overall {
                        acc.overall = e.score;
                    }
                }
            }
            acc.record_evidence(e.datatype, e.datasource);
        }
    }
}

/// Raise `map[key]` to `score` if larger. Returns whether it was raised.
fn raise(map: &mut std::collections::BTreeMap<String, f64>, key: &str, score: f64) -> bool {
    match map.get_mut(key) {
        Some(current) if score > *current => {
            *current = score;
            true
        }
        Some(_) => false,
        None if score > 0.0 => {
            map.insert(key.to_string(), score);
            true
        }
        None => false,
    }
}
