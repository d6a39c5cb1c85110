//! assocrank-pipeline — Concurrent association scoring.
//!
//! Streams distinct (target, disease) keys from an evidence repository,
//! fetches each key's evidence on a pool of async workers, reduces it on a
//! pool of blocking workers and commits the results to a score sink in
//! chunks:
//! - Pair enumeration with progress counting
//! - Evidence fetch with retry and failed-key accounting
//! - Harmonic-sum / sum / max scoring with sparsity skip
//! - Chunked, replace-on-start persistence
//! - Cancellation on the first fatal stage error

pub mod channel;
pub mod compute;
pub mod coordinator;
pub mod enumerator;
pub mod fetch;
pub mod progress;
pub mod retry;
pub mod storer;

pub use coordinator::{scorer_from_config, PipelineOptions, ScoringPipeline};
pub use progress::{sparsity_ratio, RunSummary};
pub use retry::RetryPolicy;
