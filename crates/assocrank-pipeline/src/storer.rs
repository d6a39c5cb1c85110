//! Result storer: the single consumer of scored pairs.
//!
//! Clears the run's namespace on start, buffers score sets up to the chunk
//! size and commits each full buffer. When the result queue closes the
//! remaining partial buffer is flushed. Finalizing the namespace is left to
//! the coordinator, which only does it when every stage succeeded.

use crate::compute::ScoredPair;
use crate::progress::Progress;
use crate::retry::{retry, RetryPolicy};
use assocrank_common::format::millify;
use assocrank_common::{AssocError, Result};
use assocrank_db::{ScoreBatch, ScoreSink};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const LOG_EVERY_STORED: u64 = 10_000;

pub struct ResultStorer {
    pub sink: Arc<dyn ScoreSink>,
    pub namespace: String,
    pub chunk_size: usize,
    pub input: mpsc::Receiver<ScoredPair>,
    pub progress: Arc<Progress>,
    pub retry: RetryPolicy,
    pub cancel: CancellationToken,
}

impl ResultStorer {
    pub async fn run(mut self) -> Result<()> {
        let removed = retry("clear namespace", &self.retry, &self.cancel, || {
            self.sink.clear(&self.namespace)
        })
        .await?;
        info!(namespace = %self.namespace, removed, "Cleared previous results");

        let chunk_size = self.chunk_size.max(1);
        let mut cache = ScoreBatch::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(AssocError::Cancelled),
                next = self.input.recv() => next,
            };
            let Some(ScoredPair { scores, .. }) = next else { break };

            cache.insert(scores.id.clone(), scores);
            if cache.len() >= chunk_size {
                self.flush(&mut cache).await?;
            }
        }

        self.flush(&mut cache).await?;
        info!(
            namespace = %self.namespace,
            stored = self.progress.stored(),
            "All results committed"
        );
        Ok(())
    }

    async fn flush(&self, cache: &mut ScoreBatch) -> Result<()> {
        if cache.is_empty() {
            return Ok(());
        }
        let batch: &ScoreBatch = cache;
        retry("commit batch", &self.retry, &self.cancel, || {
            self.sink.commit_batch(&self.namespace, batch)
        })
        .await?;

        let n = cache.len() as u64;
        let before = self.progress.stored();
        let stored = self.progress.record_stored(n);
        debug!(batch = n, stored, "Committed batch");
        if stored / LOG_EVERY_STORED > before / LOG_EVERY_STORED {
            info!(
                stored = %millify(stored as f64),
                rate = %format!("{}/s", millify(self.progress.rate(stored))),
                "Stored association scores"
            );
        }
        cache.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assocrank_common::{AssociationScoreSet, PairKey};
    use assocrank_db::MemoryScoreSink;
    use assocrank_test_utils::fixtures::letter_registry;
    use assocrank_test_utils::FailingSink;
    use std::time::Duration;

    fn scored(t: &str, d: &str) -> ScoredPair {
        let key = PairKey::new(t, d);
        let scores = AssociationScoreSet::new(&key, &letter_registry());
        ScoredPair { key, scores }
    }

    fn storer(
        sink: Arc<dyn ScoreSink>,
        chunk_size: usize,
        input: mpsc::Receiver<ScoredPair>,
        progress: Arc<Progress>,
    ) -> ResultStorer {
        ResultStorer {
            sink,
            namespace: "ns".to_string(),
            chunk_size,
            input,
            progress,
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
            },
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn test_chunks_and_final_partial_flush() {
        let sink = MemoryScoreSink::new();
        let (tx, rx) = mpsc::channel(16);
        for i in 0..5 {
            tx.send(scored(&format!("T{i}"), "D1")).await.unwrap();
        }
        drop(tx);

        let progress = Arc::new(Progress::new(1, 1));
        storer(Arc::new(sink.clone()), 2, rx, Arc::clone(&progress))
            .run()
            .await
            .unwrap();

        assert_eq!(sink.batch_count("ns").await, 3);
        assert_eq!(sink.snapshot("ns").await.len(), 5);
        assert_eq!(progress.stored(), 5);
        assert!(!sink.is_finalized("ns").await);
    }

    #[tokio::test]
    async fn test_clears_previous_results_first() {
        let sink = MemoryScoreSink::new();
        let mut stale = ScoreBatch::new();
        let old = scored("OLD", "D9").scores;
        stale.insert(old.id.clone(), old);
        sink.commit_batch("ns", &stale).await.unwrap();

        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        storer(Arc::new(sink.clone()), 10, rx, Arc::new(Progress::new(1, 1)))
            .run()
            .await
            .unwrap();
        assert!(sink.snapshot("ns").await.is_empty());
    }

    #[tokio::test]
    async fn test_commit_retried_then_succeeds() {
        let sink = Arc::new(FailingSink::transient(MemoryScoreSink::new(), 2));
        let (tx, rx) = mpsc::channel(1);
        tx.send(scored("T1", "D1")).await.unwrap();
        drop(tx);

        storer(sink.clone(), 10, rx, Arc::new(Progress::new(1, 1)))
            .run()
            .await
            .unwrap();
        assert_eq!(sink.commit_attempts(), 3);
        assert_eq!(sink.inner().snapshot("ns").await.len(), 1);
    }

    #[tokio::test]
    async fn test_commit_exhaustion_is_fatal() {
        let sink = Arc::new(FailingSink::always_transient(MemoryScoreSink::new()));
        let (tx, rx) = mpsc::channel(1);
        tx.send(scored("T1", "D1")).await.unwrap();
        drop(tx);

        let result = storer(sink.clone(), 10, rx, Arc::new(Progress::new(1, 1)))
            .run()
            .await;
        assert!(matches!(result, Err(AssocError::Unavailable(_))));
        assert_eq!(sink.commit_attempts(), 3);
    }
}
