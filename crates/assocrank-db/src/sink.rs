//! Score sink capability.
//!
//! A run owns one namespace: it clears it first, commits batches as they
//! fill, and finalizes once every batch has been committed. Rerunning over
//! the same evidence therefore replaces the previous result.

use assocrank_common::{AssociationScoreSet, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Score sets keyed by their storage id (`target-disease`).
pub type ScoreBatch = BTreeMap<String, AssociationScoreSet>;

#[async_trait]
pub trait ScoreSink: Send + Sync + 'static {
    /// Remove everything stored under `namespace`. Returns how many score
    /// sets were removed, when the backend knows.
    async fn clear(&self, namespace: &str) -> Result<u64>;

    /// Persist one batch. A later batch overwrites any id written earlier.
    async fn commit_batch(&self, namespace: &str, batch: &ScoreBatch) -> Result<()>;

    /// Make the namespace's content visible and durable. Returns the number
    /// of distinct score sets stored.
    async fn finalize(&self, namespace: &str) -> Result<u64>;
}

/// Counts what would have been written and writes nothing.
#[derive(Debug, Default)]
pub struct DryRunSink {
    batches: AtomicU64,
    score_sets: AtomicU64,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn score_sets(&self) -> u64 {
        self.score_sets.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ScoreSink for DryRunSink {
    async fn clear(&self, namespace: &str) -> Result<u64> {
        info!(namespace, "Dry run: skipping namespace clear");
        self.batches.store(0, Ordering::Relaxed);
        self.score_sets.store(0, Ordering::Relaxed);
        Ok(0)
    }

    async fn commit_batch(&self, _namespace: &str, batch: &ScoreBatch) -> Result<()> {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.score_sets.fetch_add(batch.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    async fn finalize(&self, namespace: &str) -> Result<u64> {
        let total = self.score_sets();
        info!(
            namespace,
            batches = self.batches(),
            score_sets = total,
            "Dry run: nothing written"
        );
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assocrank_common::{DatasourceRegistry, PairKey};

    fn batch(ids: &[(&str, &str)]) -> ScoreBatch {
        let registry = DatasourceRegistry::default();
        ids.iter()
            .map(|(t, d)| {
                let set = AssociationScoreSet::new(&PairKey::new(*t, *d), &registry);
                (set.id.clone(), set)
            })
            .collect()
    }

    #[test]
    fn test_dry_run_counts_without_writing() {
        let sink = DryRunSink::new();
        tokio_test::block_on(async {
            sink.clear("ns").await.unwrap();
            sink.commit_batch("ns", &batch(&[("T1", "D1"), ("T1", "D2")])).await.unwrap();
            sink.commit_batch("ns", &batch(&[("T2", "D1")])).await.unwrap();
            assert_eq!(sink.finalize("ns").await.unwrap(), 3);
        });
        assert_eq!(sink.batches(), 2);
        assert_eq!(sink.score_sets(), 3);
    }
}
