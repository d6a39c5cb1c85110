/// Core value types flowing through the scoring pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Target / disease key
// ---------------------------------------------------------------------------

/// A (target, disease) pair being scored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub target_id: String,
    pub disease_id: String,
}

impl PairKey {
    pub fn new(target_id: impl Into<String>, disease_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            disease_id: disease_id.into(),
        }
    }

    /// Storage id, `target-disease`.
    pub fn id(&self) -> String {
        format!("{}-{}", self.target_id, self.disease_id)
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.target_id, self.disease_id)
    }
}

// ---------------------------------------------------------------------------
// Evidence projection
// ---------------------------------------------------------------------------

/// The part of one evidence record that scoring needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceScore {
    pub score: f64,          // 0.0–1.0
    pub datatype: String,    // e.g. genetic_association
    pub datasource: String,  // e.g. gwas_catalog
}

impl EvidenceScore {
    pub fn new(score: f64, datatype: impl Into<String>, datasource: impl Into<String>) -> Self {
        Self {
            score,
            datatype: datatype.into(),
            datasource: datasource.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_id_format() {
        let key = PairKey::new("ENSG00000133703", "EFO_0002618");
        assert_eq!(key.id(), "ENSG00000133703-EFO_0002618");
        assert_eq!(key.to_string(), key.id());
    }

    #[test]
    fn test_pair_ordering_is_target_first() {
        let a = PairKey::new("T1", "D2");
        let b = PairKey::new("T2", "D1");
        assert!(a < b);
    }
}
