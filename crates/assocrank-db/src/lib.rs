//! assocrank Storage Layer
//!
//! Capability traits for the two external collaborators of the scoring
//! pipeline, plus the implementations the binary and tests use.
//!
//! # Features
//!
//! - `EvidenceRepository`: distinct-key enumeration and per-key evidence lookup
//! - `ScoreSink`: replace-on-start storage of association score sets
//! - Evidence extraction from JSON-lines evidence documents into score-map rows
//! - In-memory repository and sink, a JSON-lines sink on disk, a dry-run sink
//!
//! # Example
//!
//! ```rust,no_run
//! use assocrank_db::{extract::extract_file, MemoryEvidenceRepository, JsonlScoreSink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (rows, _stats) = extract_file("./data/evidence.jsonl").await?;
//!     let repo = MemoryEvidenceRepository::from_rows(rows);
//!     let sink = JsonlScoreSink::new("./data/scores");
//!     Ok(())
//! }
//! ```

pub mod schema;
pub mod repository;
pub mod sink;
pub mod extract;
pub mod memory;
pub mod jsonl_sink;

pub use schema::{EnumerationFilter, ScoreMapRow};
pub use repository::{EvidenceRepository, RepositoryConnector};
pub use sink::{DryRunSink, ScoreBatch, ScoreSink};
pub use memory::{MemoryEvidenceRepository, MemoryScoreSink};
pub use jsonl_sink::JsonlScoreSink;
