//! Record shapes for the evidence score map and the raw evidence documents
//! it is extracted from.

use assocrank_common::{EvidenceScore, PairKey};
use std::collections::BTreeSet;

// =============================================================================
// Score map
// =============================================================================

/// One evidence item attached to one (target, disease) key. An evidence
/// document fans out into one row per disease code it is annotated with.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScoreMapRow {
    pub target_id: String,
    pub disease_id: String,
    pub evidence_id: String,
    /// The row's disease is the document's own disease, not an expanded one.
    pub is_direct: bool,
    pub association_score: f64,
    pub datasource: String,
    pub datatype: String,
}

impl ScoreMapRow {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.target_id.clone(), self.disease_id.clone())
    }

    pub fn to_evidence_score(&self) -> EvidenceScore {
        EvidenceScore::new(
            self.association_score,
            self.datatype.clone(),
            self.datasource.clone(),
        )
    }
}

/// Which keys an enumeration yields.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnumerationFilter {
    /// Only keys backed by at least one direct row.
    #[serde(default)]
    pub only_direct: bool,
    /// Restrict to these targets when set.
    #[serde(default)]
    pub targets: Option<BTreeSet<String>>,
}

impl EnumerationFilter {
    pub fn allows_target(&self, target_id: &str) -> bool {
        self.targets
            .as_ref()
            .map_or(true, |targets| targets.contains(target_id))
    }
}

// =============================================================================
// Evidence documents
// =============================================================================

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IdRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PrivateFields {
    /// Disease codes this evidence supports, already ontology-expanded.
    #[serde(default)]
    pub efo_codes: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EvidenceScores {
    pub association_score: f64,
}

/// A validated evidence document as produced by the evidence pipeline.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EvidenceDocument {
    pub id: String,
    pub target: IdRef,
    pub disease: IdRef,
    #[serde(default, rename = "private", alias = "_private")]
    pub private: PrivateFields,
    pub scores: EvidenceScores,
    #[serde(rename = "type")]
    pub datatype: String,
    #[serde(rename = "sourceID")]
    pub source_id: String,
}

impl EvidenceDocument {
    /// One row per disease code; falls back to the document's own disease
    /// when no codes are listed.
    pub fn to_rows(&self) -> Vec<ScoreMapRow> {
        let direct = std::slice::from_ref(&self.disease.id);
        let codes = if self.private.efo_codes.is_empty() {
            direct
        } else {
            self.private.efo_codes.as_slice()
        };
        codes
            .iter()
            .map(|code| ScoreMapRow {
                target_id: self.target.id.clone(),
                disease_id: code.clone(),
                evidence_id: self.id.clone(),
                is_direct: *code == self.disease.id,
                association_score: self.scores.association_score,
                datasource: self.source_id.clone(),
                datatype: self.datatype.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(codes: &[&str]) -> EvidenceDocument {
        EvidenceDocument {
            id: "ev1".to_string(),
            target: IdRef { id: "ENSG1".to_string() },
            disease: IdRef { id: "EFO_1".to_string() },
            private: PrivateFields {
                efo_codes: codes.iter().map(|c| c.to_string()).collect(),
            },
            scores: EvidenceScores { association_score: 0.7 },
            datatype: "genetic_association".to_string(),
            source_id: "gwas_catalog".to_string(),
        }
    }

    #[test]
    fn test_rows_fan_out_over_codes() {
        let rows = document(&["EFO_1", "EFO_0", "EFO_ROOT"]).to_rows();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_direct);
        assert!(!rows[1].is_direct);
        assert_eq!(rows[2].key(), PairKey::new("ENSG1", "EFO_ROOT"));
        assert!(rows.iter().all(|r| r.evidence_id == "ev1"));
    }

    #[test]
    fn test_rows_fall_back_to_direct_disease() {
        let rows = document(&[]).to_rows();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_direct);
        assert_eq!(rows[0].disease_id, "EFO_1");
    }

    #[test]
    fn test_document_accepts_underscore_private() {
        let json = r#"{"id":"e","target":{"id":"T"},"disease":{"id":"D"},
            "_private":{"efo_codes":["D","P"]},"scores":{"association_score":0.5},
            "type":"literature","sourceID":"europepmc"}"#;
        let doc: EvidenceDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.private.efo_codes, vec!["D", "P"]);
        assert_eq!(doc.to_rows()[0].to_evidence_score().datasource, "europepmc");
    }

    #[test]
    fn test_filter_targets() {
        let filter = EnumerationFilter {
            only_direct: false,
            targets: Some(["T1".to_string()].into_iter().collect()),
        };
        assert!(filter.allows_target("T1"));
        assert!(!filter.allows_target("T2"));
        assert!(EnumerationFilter::default().allows_target("anything"));
    }
}
