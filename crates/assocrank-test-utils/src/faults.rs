//! Fault-injecting wrappers around a real repository or sink.

use assocrank_common::{AssocError, EvidenceScore, PairKey, Result};
use assocrank_db::{EvidenceRepository, ScoreBatch, ScoreSink};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy)]
enum Fault {
    /// Fail with `Unavailable` this many more times, then succeed.
    Transient(u32),
    /// Always fail with `Unavailable`.
    AlwaysTransient,
    /// Always fail with a non-retryable error.
    Fatal,
    /// Panic inside the call.
    Panic,
}

fn next_failure(fault: &mut Fault, what: &str) -> Option<AssocError> {
    match fault {
        Fault::Transient(0) => None,
        Fault::Transient(n) => {
            *n -= 1;
            Some(AssocError::Unavailable(what.to_string()))
        }
        Fault::AlwaysTransient => Some(AssocError::Unavailable(what.to_string())),
        Fault::Fatal => Some(AssocError::Repository(what.to_string())),
        Fault::Panic => panic!("injected panic: {what}"),
    }
}

// ── Repository ───────────────────────────────────────────────────────────────

/// Repository whose `fetch_evidence` fails for chosen keys.
#[derive(Clone)]
pub struct FlakyRepository<R> {
    inner: R,
    faults: Arc<Mutex<HashMap<PairKey, Fault>>>,
    attempts: Arc<Mutex<HashMap<PairKey, u32>>>,
}

impl<R: EvidenceRepository + Clone> FlakyRepository<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            faults: Arc::default(),
            attempts: Arc::default(),
        }
    }

    pub fn fail_times(self, key: PairKey, times: u32) -> Self {
        self.set_fault(key, Fault::Transient(times))
    }

    pub fn fail_always(self, key: PairKey) -> Self {
        self.set_fault(key, Fault::AlwaysTransient)
    }

    pub fn fail_fatally(self, key: PairKey) -> Self {
        self.set_fault(key, Fault::Fatal)
    }

    /// Panic inside `fetch_evidence` for `key`.
    pub fn panic_on(self, key: PairKey) -> Self {
        self.set_fault(key, Fault::Panic)
    }

    fn set_fault(self, key: PairKey, fault: Fault) -> Self {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(key, fault);
        }
        self
    }

    /// Fetch attempts seen for `key`, successful or not.
    pub fn attempts(&self, key: &PairKey) -> u32 {
        self.attempts
            .lock()
            .map(|a| a.get(key).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl<R: EvidenceRepository + Clone> EvidenceRepository for FlakyRepository<R> {
    fn enumerate_distinct_keys(&self) -> BoxStream<'static, Result<PairKey>> {
        self.inner.enumerate_distinct_keys()
    }

    async fn fetch_evidence(&self, key: &PairKey) -> Result<Vec<EvidenceScore>> {
        if let Ok(mut attempts) = self.attempts.lock() {
            *attempts.entry(key.clone()).or_insert(0) += 1;
        }
        let failure = match self.faults.lock() {
            Ok(mut faults) => faults
                .get_mut(key)
                .and_then(|fault| next_failure(fault, &format!("fetch {key}"))),
            Err(_) => None,
        };
        match failure {
            Some(err) => Err(err),
            None => self.inner.fetch_evidence(key).await,
        }
    }

    async fn count_evidence_by_datasource(&self, key: &PairKey) -> Result<BTreeMap<String, u64>> {
        self.inner.count_evidence_by_datasource(key).await
    }
}

// ── Sink ─────────────────────────────────────────────────────────────────────

/// Sink whose `commit_batch` fails before delegating.
pub struct FailingSink<S> {
    inner: S,
    fault: Mutex<Fault>,
    commit_attempts: AtomicU32,
}

impl<S: ScoreSink> FailingSink<S> {
    pub fn transient(inner: S, times: u32) -> Self {
        Self::with_fault(inner, Fault::Transient(times))
    }

    pub fn always_transient(inner: S) -> Self {
        Self::with_fault(inner, Fault::AlwaysTransient)
    }

    pub fn fatal(inner: S) -> Self {
        Self::with_fault(inner, Fault::Fatal)
    }

    fn with_fault(inner: S, fault: Fault) -> Self {
        Self {
            inner,
            fault: Mutex::new(fault),
            commit_attempts: AtomicU32::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn commit_attempts(&self) -> u32 {
        self.commit_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: ScoreSink> ScoreSink for FailingSink<S> {
    async fn clear(&self, namespace: &str) -> Result<u64> {
        self.inner.clear(namespace).await
    }

    async fn commit_batch(&self, namespace: &str, batch: &ScoreBatch) -> Result<()> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        let failure = match self.fault.lock() {
            Ok(mut fault) => next_failure(&mut fault, "commit batch"),
            Err(_) => None,
        };
        match failure {
            Some(err) => Err(err),
            None => self.inner.commit_batch(namespace, batch).await,
        }
    }

    async fn finalize(&self, namespace: &str) -> Result<u64> {
        self.inner.finalize(namespace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::two_pair_repository;
    use assocrank_db::MemoryScoreSink;

    #[tokio::test]
    async fn test_flaky_repository_recovers_after_n_failures() {
        let key = PairKey::new("T1", "D1");
        let repo = FlakyRepository::new(two_pair_repository()).fail_times(key.clone(), 2);
        assert!(repo.fetch_evidence(&key).await.unwrap_err().is_transient());
        assert!(repo.fetch_evidence(&key).await.is_err());
        assert_eq!(repo.fetch_evidence(&key).await.unwrap().len(), 2);
        assert_eq!(repo.attempts(&key), 3);
    }

    #[tokio::test]
    async fn test_fatal_fault_is_not_transient() {
        let key = PairKey::new("T1", "D1");
        let repo = FlakyRepository::new(two_pair_repository()).fail_fatally(key.clone());
        assert!(!repo.fetch_evidence(&key).await.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn test_failing_sink_counts_attempts() {
        let sink = FailingSink::transient(MemoryScoreSink::new(), 1);
        let batch = ScoreBatch::new();
        assert!(sink.commit_batch("ns", &batch).await.is_err());
        assert!(sink.commit_batch("ns", &batch).await.is_ok());
        assert_eq!(sink.commit_attempts(), 2);
        assert_eq!(sink.inner().batch_count("ns").await, 1);
    }
}
