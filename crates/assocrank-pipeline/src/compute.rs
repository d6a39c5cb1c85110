//! Score compute pool.
//!
//! Workers run on blocking threads since scoring is CPU-bound. Keys with no
//! evidence, or none from a registered datasource, are counted as empty and
//! dropped here: most of the key space is empty and must not reach the sink.

use crate::channel::SharedReceiver;
use crate::fetch::FetchedEvidence;
use crate::progress::Progress;
use assocrank_common::format::millify;
use assocrank_common::{AssocError, AssociationScoreSet, PairKey, Result, ScoringMethod};
use assocrank_ranker::Scorer;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPair {
    pub key: PairKey,
    pub scores: AssociationScoreSet,
}

pub struct ComputeWorker {
    pub worker_id: usize,
    pub scorer: Arc<Scorer>,
    pub methods: Arc<[ScoringMethod]>,
    pub input: SharedReceiver<FetchedEvidence>,
    pub output: mpsc::Sender<ScoredPair>,
    pub progress: Arc<Progress>,
    pub log_every: u64,
    pub cancel: CancellationToken,
}

impl ComputeWorker {
    /// Blocking; run with `spawn_blocking`.
    pub fn run(self) -> Result<()> {
        let result = self.work();
        self.progress.compute_worker_exited();
        if self.progress.compute_finished() {
            info!(
                with_data = self.progress.with_data(),
                empty = self.progress.empty(),
                "Score computation finished"
            );
            let unregistered = self.progress.unregistered();
            if unregistered > 0 {
                warn!(
                    unregistered,
                    "Evidence from unregistered datasources was not scored"
                );
            }
        }
        result
    }

    fn work(&self) -> Result<()> {
        while let Some(FetchedEvidence { key, evidence }) = self.input.blocking_recv() {
            if self.cancel.is_cancelled() {
                return Err(AssocError::Cancelled);
            }

            if evidence.is_empty() {
                self.progress.record_empty();
                self.maybe_log();
                continue;
            }

            let scored = self.scorer.score_methods(&key, &evidence, &self.methods);
            if scored.unregistered > 0 {
                self.progress.record_unregistered(scored.unregistered as u64);
            }
            if !scored.has_usable_evidence() {
                warn!(
                    pair = %key,
                    unregistered = scored.unregistered,
                    "No evidence from a registered datasource, dropping pair"
                );
                self.progress.record_empty();
                self.maybe_log();
                continue;
            }

            let scores = scored.scores;
            if self.output.blocking_send(ScoredPair { key, scores }).is_err() {
                // The storer only goes away on failure or cancellation.
                return Err(AssocError::Cancelled);
            }
            self.progress.record_scored();
            self.maybe_log();
        }

        debug!(worker = self.worker_id, "Compute worker input closed");
        Ok(())
    }

    fn maybe_log(&self) {
        let done = self.progress.with_data() + self.progress.empty();
        if self.log_every > 0 && done % self.log_every == 0 {
            info!(
                computed = %millify(done as f64),
                with_data = %millify(self.progress.with_data() as f64),
                percent = %format!("{:.1}%", self.progress.percent_computed()),
                "Computed scores"
            );
        }
    }
}
