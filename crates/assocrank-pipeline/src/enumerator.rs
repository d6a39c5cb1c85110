//! Pair enumerator: streams distinct keys from the repository onto the task
//! queue. Dropping the sender on return is the end-of-input signal for every
//! fetch worker.

use crate::progress::Progress;
use assocrank_common::format::millify;
use assocrank_common::{AssocError, PairKey, Result};
use assocrank_db::EvidenceRepository;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

const LOG_EVERY_KEYS: u64 = 1000;

pub async fn run_enumerator<R: EvidenceRepository>(
    repo: R,
    tasks: mpsc::Sender<PairKey>,
    progress: Arc<Progress>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut keys = repo.enumerate_distinct_keys();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AssocError::Cancelled),
            next = keys.next() => next,
        };
        let Some(key) = next else { break };
        let key = key?;
        let total = progress.record_enumerated();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AssocError::Cancelled),
            sent = tasks.send(key) => {
                if sent.is_err() {
                    // Every fetch worker is gone; only cancellation does that.
                    return Err(AssocError::Cancelled);
                }
            }
        }

        if total % LOG_EVERY_KEYS == 0 {
            info!(loaded = %millify(total as f64), "Tasks loaded");
        }
    }

    progress.mark_enumeration_finished();
    info!(total = progress.enumerated(), "Pair enumeration finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assocrank_db::MemoryEvidenceRepository;
    use assocrank_test_utils::fixtures::two_pair_repository;

    #[tokio::test]
    async fn test_enumerates_all_keys_then_closes() {
        let (tx, mut rx) = mpsc::channel(8);
        let progress = Arc::new(Progress::new(1, 1));
        run_enumerator(
            two_pair_repository(),
            tx,
            Arc::clone(&progress),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let mut keys = Vec::new();
        while let Some(key) = rx.recv().await {
            keys.push(key);
        }
        assert_eq!(keys, vec![PairKey::new("T1", "D1"), PairKey::new("T2", "D1")]);
        assert_eq!(progress.enumerated(), 2);
        assert!(progress.enumeration_finished());
    }

    #[tokio::test]
    async fn test_empty_repository() {
        let (tx, mut rx) = mpsc::channel(1);
        let progress = Arc::new(Progress::new(1, 1));
        run_enumerator(
            MemoryEvidenceRepository::new(),
            tx,
            Arc::clone(&progress),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(rx.recv().await.is_none());
        assert_eq!(progress.enumerated(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_while_queue_full() {
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let progress = Arc::new(Progress::new(1, 1));
        let handle = tokio::spawn(run_enumerator(
            two_pair_repository(),
            tx,
            progress,
            cancel.clone(),
        ));
        cancel.cancel();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(AssocError::Cancelled)));
    }
}
