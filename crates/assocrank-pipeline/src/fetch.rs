//! Evidence fetch pool.
//!
//! Each worker owns its own repository handle, pulls keys from the shared
//! task queue and forwards `(key, evidence)` to the compute stage, empty
//! evidence included so the fetched count matches the enumerated count.
//! Transient fetch failures are retried; a key that still fails is recorded
//! as failed and skipped.

use crate::channel::SharedReceiver;
use crate::progress::Progress;
use crate::retry::{retry, RetryPolicy};
use assocrank_common::format::millify;
use assocrank_common::{AssocError, EvidenceScore, PairKey, Result};
use assocrank_db::{EvidenceRepository, RepositoryConnector};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedEvidence {
    pub key: PairKey,
    pub evidence: Vec<EvidenceScore>,
}

/// Per-worker wiring for the fetch stage.
pub struct FetchWorker<C: RepositoryConnector> {
    pub worker_id: usize,
    pub connector: Arc<C>,
    pub tasks: SharedReceiver<PairKey>,
    pub output: mpsc::Sender<FetchedEvidence>,
    pub progress: Arc<Progress>,
    pub retry: RetryPolicy,
    pub log_every: u64,
    pub cancel: CancellationToken,
}

impl<C: RepositoryConnector> FetchWorker<C> {
    pub async fn run(self) -> Result<()> {
        let result = self.work().await;
        self.progress.fetch_worker_exited();
        if self.progress.fetch_finished() {
            info!(
                fetched = self.progress.fetched(),
                failed = self.progress.failed(),
                "Evidence fetch finished"
            );
        }
        result
    }

    async fn work(&self) -> Result<()> {
        let repo = retry("connect repository", &self.retry, &self.cancel, || {
            self.connector.connect()
        })
        .await?;
        debug!(worker = self.worker_id, "Fetch worker connected");

        loop {
            let key = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(AssocError::Cancelled),
                key = self.tasks.recv() => key,
            };
            let Some(key) = key else { break };

            let evidence = match retry("fetch evidence", &self.retry, &self.cancel, || {
                repo.fetch_evidence(&key)
            })
            .await
            {
                Ok(evidence) => evidence,
                Err(e) if e.is_transient() => {
                    warn!(worker = self.worker_id, key = %key, error = %e, "Giving up on pair");
                    self.progress.record_failed(&key);
                    continue;
                }
                Err(e) => return Err(e),
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(AssocError::Cancelled),
                sent = self.output.send(FetchedEvidence { key, evidence }) => {
                    if sent.is_err() {
                        return Err(AssocError::Cancelled);
                    }
                }
            }

            let fetched = self.progress.record_fetched();
            if self.log_every > 0 && fetched % self.log_every == 0 {
                info!(
                    fetched = %millify(fetched as f64),
                    rate = %format!("{}/s", millify(self.progress.rate(fetched))),
                    "Fetched pairs"
                );
            }
        }

        debug!(worker = self.worker_id, "Fetch worker input closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::bounded;
    use assocrank_test_utils::fixtures::two_pair_repository;
    use assocrank_test_utils::FlakyRepository;
    use std::time::Duration;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    async fn run_one<C: RepositoryConnector>(
        connector: C,
        keys: Vec<PairKey>,
    ) -> (Result<()>, Vec<FetchedEvidence>, Arc<Progress>) {
        let (task_tx, task_rx) = bounded(keys.len().max(1));
        for key in keys {
            task_tx.send(key).await.unwrap();
        }
        drop(task_tx);

        let (out_tx, mut out_rx) = mpsc::channel(16);
        let progress = Arc::new(Progress::new(1, 1));
        let worker = FetchWorker {
            worker_id: 0,
            connector: Arc::new(connector),
            tasks: task_rx,
            output: out_tx,
            progress: Arc::clone(&progress),
            retry: fast_retry(),
            log_every: 1,
            cancel: CancellationToken::new(),
        };
        let result = worker.run().await;

        let mut out = Vec::new();
        while let Some(item) = out_rx.recv().await {
            out.push(item);
        }
        (result, out, progress)
    }

    #[tokio::test]
    async fn test_forwards_empty_evidence() {
        let keys = vec![PairKey::new("T1", "D1"), PairKey::new("T2", "D1")];
        let (result, out, progress) = run_one(two_pair_repository(), keys).await;
        result.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].evidence.len(), 2);
        assert!(out[1].evidence.is_empty());
        assert_eq!(progress.fetched(), 2);
        assert!(progress.fetch_finished());
    }

    #[tokio::test]
    async fn test_transient_failure_recovers() {
        let key = PairKey::new("T1", "D1");
        let repo = FlakyRepository::new(two_pair_repository()).fail_times(key.clone(), 2);
        let (result, out, progress) = run_one(repo.clone(), vec![key.clone()]).await;
        result.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(repo.attempts(&key), 3);
        assert_eq!(progress.failed(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_key_recorded_and_worker_continues() {
        let bad = PairKey::new("T1", "D1");
        let repo = FlakyRepository::new(two_pair_repository()).fail_always(bad.clone());
        let keys = vec![bad.clone(), PairKey::new("T2", "D1")];
        let (result, out, progress) = run_one(repo, keys).await;
        result.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key, PairKey::new("T2", "D1"));
        assert_eq!(progress.failed(), 1);
        let summary = progress.summary(uuid::Uuid::new_v4(), "ns", chrono::Utc::now());
        assert_eq!(summary.failed_pair_sample, vec!["T1-D1".to_string()]);
    }

    #[tokio::test]
    async fn test_fatal_fetch_error_stops_worker() {
        let bad = PairKey::new("T1", "D1");
        let repo = FlakyRepository::new(two_pair_repository()).fail_fatally(bad.clone());
        let (result, out, _) = run_one(repo, vec![bad]).await;
        assert!(matches!(result, Err(AssocError::Repository(_))));
        assert!(out.is_empty());
    }
}
