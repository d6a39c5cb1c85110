//! Aggregated association scores, one accumulator per reduction method.

use crate::entities::PairKey;
use crate::error::AssocError;
use crate::registry::DatasourceRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ── Method registry ──────────────────────────────────────────────────────────

/// Reduction methods. Adding one means adding a case to the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringMethod {
    HarmonicSum,
    Sum,
    Max,
}

impl ScoringMethod {
    pub const ALL: [ScoringMethod; 3] = [
        ScoringMethod::HarmonicSum,
        ScoringMethod::Sum,
        ScoringMethod::Max,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringMethod::HarmonicSum => "harmonic-sum",
            ScoringMethod::Sum => "sum",
            ScoringMethod::Max => "max",
        }
    }
}

impl fmt::Display for ScoringMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoringMethod {
    type Err = AssocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "harmonic-sum" => Ok(ScoringMethod::HarmonicSum),
            "sum" => Ok(ScoringMethod::Sum),
            "max" => Ok(ScoringMethod::Max),
            other => Err(AssocError::UnknownMethod(other.to_string())),
        }
    }
}

/// How the max method propagates a new maximum across granularities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxMode {
    /// Gated propagation as the legacy scorer did it: a score must beat its
    /// datasource slot, is then written to the slot named after its
    /// datatype, and reaches `overall` only by raising its datatype max.
    /// Datatype and overall maxima come out right; datasource slots do not.
    #[default]
    Nested,
    /// Each granularity keeps its own running max under its own key.
    Independent,
}

// ── Per-method accumulator ───────────────────────────────────────────────────

/// Accumulator for one reduction method.
///
/// Invariant: `evidence_count` equals the sum of `datatype_evidence_count`
/// and the sum of `datasource_evidence_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationScore {
    pub overall: f64,
    pub evidence_count: u64,
    pub datatypes: BTreeMap<String, f64>,
    pub datatype_evidence_count: BTreeMap<String, u64>,
    pub datasources: BTreeMap<String, f64>,
    pub datasource_evidence_count: BTreeMap<String, u64>,
}

impl AssociationScore {
    /// All-zero accumulator with every registered datasource and datatype
    /// present.
    pub fn seeded(registry: &DatasourceRegistry) -> Self {
        let mut score = Self {
            overall: 0.0,
            evidence_count: 0,
            datatypes: BTreeMap::new(),
            datatype_evidence_count: BTreeMap::new(),
            datasources: BTreeMap::new(),
            datasource_evidence_count: BTreeMap::new(),
        };
        for (ds, dt) in registry.entries() {
            score.datasources.insert(ds.to_string(), 0.0);
            score.datasource_evidence_count.insert(ds.to_string(), 0);
            score.datatypes.insert(dt.to_string(), 0.0);
            score.datatype_evidence_count.insert(dt.to_string(), 0);
        }
        score
    }

    /// Count one evidence item at every granularity.
    pub fn record_evidence(&mut self, datatype: &str, datasource: &str) {
        self.evidence_count += 1;
        bump(&mut self.datatype_evidence_count, datatype);
        bump(&mut self.datasource_evidence_count, datasource);
    }

    pub fn datatype_score(&self, datatype: &str) -> f64 {
        self.datatypes.get(datatype).copied().unwrap_or(0.0)
    }

    pub fn datasource_score(&self, datasource: &str) -> f64 {
        self.datasources.get(datasource).copied().unwrap_or(0.0)
    }

    pub fn counts_consistent(&self) -> bool {
        let by_dt: u64 = self.datatype_evidence_count.values().sum();
        let by_ds: u64 = self.datasource_evidence_count.values().sum();
        self.evidence_count == by_dt && self.evidence_count == by_ds
    }
}

fn bump(counts: &mut BTreeMap<String, u64>, key: &str) {
    match counts.get_mut(key) {
        Some(c) => *c += 1,
        None => {
            counts.insert(key.to_string(), 1);
        }
    }
}

// ── Score set ────────────────────────────────────────────────────────────────

/// All method accumulators for one (target, disease) key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationScoreSet {
    pub id: String,
    pub target: String,
    pub disease: String,
    #[serde(rename = "harmonic-sum")]
    pub harmonic_sum: AssociationScore,
    pub sum: AssociationScore,
    pub max: AssociationScore,
}

impl AssociationScoreSet {
    pub fn new(key: &PairKey, registry: &DatasourceRegistry) -> Self {
        let seeded = AssociationScore::seeded(registry);
        Self {
            id: key.id(),
            target: key.target_id.clone(),
            disease: key.disease_id.clone(),
            harmonic_sum: seeded.clone(),
            sum: seeded.clone(),
            max: seeded,
        }
    }

    pub fn key(&self) -> PairKey {
        PairKey::new(self.target.clone(), self.disease.clone())
    }

    pub fn method(&self, method: ScoringMethod) -> &AssociationScore {
        match method {
            ScoringMethod::HarmonicSum => &self.harmonic_sum,
            ScoringMethod::Sum => &self.sum,
            ScoringMethod::Max => &self.max,
        }
    }

    pub fn method_mut(&mut self, method: ScoringMethod) -> &mut AssociationScore {
        match method {
            ScoringMethod::HarmonicSum => &mut self.harmonic_sum,
            ScoringMethod::Sum => &mut self.sum,
            ScoringMethod::Max => &mut self.max,
        }
    }
}
