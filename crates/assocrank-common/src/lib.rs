//! assocrank-common — Shared types, errors, and the datasource registry used
//! across all assocrank crates.

pub mod error;
pub mod entities;
pub mod association;
pub mod registry;
pub mod format;

// Re-export commonly used types
pub use error::{AssocError, Result};
pub use entities::{EvidenceScore, PairKey};
pub use association::{AssociationScore, AssociationScoreSet, MaxMode, ScoringMethod};
pub use registry::DatasourceRegistry;
