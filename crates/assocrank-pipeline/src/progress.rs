//! Shared run counters and the final run summary.
//!
//! Counters are increment-only and read for reporting. None of them gate
//! stage completion, which is driven by channel closure.

use assocrank_common::format::millify;
use assocrank_common::PairKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Failed keys kept by value for the summary; the rest are only counted.
pub const FAILED_SAMPLE_LIMIT: usize = 100;

#[derive(Debug)]
pub struct Progress {
    started: Instant,
    enumerated: AtomicU64,
    fetched: AtomicU64,
    with_data: AtomicU64,
    empty: AtomicU64,
    stored: AtomicU64,
    failed: AtomicU64,
    unregistered: AtomicU64,
    failed_sample: Mutex<Vec<String>>,
    fetch_workers_active: AtomicUsize,
    compute_workers_active: AtomicUsize,
    enumeration_finished: AtomicBool,
    fetch_finished: AtomicBool,
    compute_finished: AtomicBool,
}

impl Progress {
    pub fn new(fetch_workers: usize, compute_workers: usize) -> Self {
        Self {
            started: Instant::now(),
            enumerated: AtomicU64::new(0),
            fetched: AtomicU64::new(0),
            with_data: AtomicU64::new(0),
            empty: AtomicU64::new(0),
            stored: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            unregistered: AtomicU64::new(0),
            failed_sample: Mutex::new(Vec::new()),
            fetch_workers_active: AtomicUsize::new(fetch_workers),
            compute_workers_active: AtomicUsize::new(compute_workers),
            enumeration_finished: AtomicBool::new(false),
            fetch_finished: AtomicBool::new(false),
            compute_finished: AtomicBool::new(false),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Items per second since the run started.
    pub fn rate(&self, count: u64) -> f64 {
        count as f64 / self.elapsed().as_secs_f64().max(1e-9)
    }

    // ── Counters ──

    pub fn record_enumerated(&self) -> u64 {
        self.enumerated.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_fetched(&self) -> u64 {
        self.fetched.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_scored(&self) -> u64 {
        self.with_data.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_empty(&self) -> u64 {
        self.empty.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_stored(&self, n: u64) -> u64 {
        self.stored.fetch_add(n, Ordering::Relaxed) + n
    }

    /// Evidence items skipped for an unregistered datasource.
    pub fn record_unregistered(&self, n: u64) -> u64 {
        self.unregistered.fetch_add(n, Ordering::Relaxed) + n
    }

    pub fn record_failed(&self, key: &PairKey) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut sample) = self.failed_sample.lock() {
            if sample.len() < FAILED_SAMPLE_LIMIT {
                sample.push(key.id());
            }
        }
    }

    pub fn enumerated(&self) -> u64 {
        self.enumerated.load(Ordering::Relaxed)
    }

    pub fn fetched(&self) -> u64 {
        self.fetched.load(Ordering::Relaxed)
    }

    pub fn with_data(&self) -> u64 {
        self.with_data.load(Ordering::Relaxed)
    }

    pub fn empty(&self) -> u64 {
        self.empty.load(Ordering::Relaxed)
    }

    pub fn stored(&self) -> u64 {
        self.stored.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn unregistered(&self) -> u64 {
        self.unregistered.load(Ordering::Relaxed)
    }

    /// Share of enumerated keys the compute stage has seen, in percent.
    pub fn percent_computed(&self) -> f64 {
        let total = self.enumerated();
        if total == 0 {
            return 0.0;
        }
        100.0 * (self.with_data() + self.empty()) as f64 / total as f64
    }

    // ── Stage flags ──

    pub fn mark_enumeration_finished(&self) {
        self.enumeration_finished.store(true, Ordering::Release);
    }

    /// Called by each fetch worker on exit; the last one sets the flag.
    pub fn fetch_worker_exited(&self) {
        if self.fetch_workers_active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.fetch_finished.store(true, Ordering::Release);
        }
    }

    pub fn compute_worker_exited(&self) {
        if self.compute_workers_active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.compute_finished.store(true, Ordering::Release);
        }
    }

    pub fn enumeration_finished(&self) -> bool {
        self.enumeration_finished.load(Ordering::Acquire)
    }

    pub fn fetch_finished(&self) -> bool {
        self.fetch_finished.load(Ordering::Acquire)
    }

    pub fn compute_finished(&self) -> bool {
        self.compute_finished.load(Ordering::Acquire)
    }

    pub fn summary(
        &self,
        run_id: Uuid,
        namespace: &str,
        started_at: DateTime<Utc>,
    ) -> RunSummary {
        let enumerated = self.enumerated();
        let with_data = self.with_data();
        RunSummary {
            run_id,
            namespace: namespace.to_string(),
            started_at,
            finished_at: Utc::now(),
            pairs_enumerated: enumerated,
            pairs_fetched: self.fetched(),
            pairs_with_data: with_data,
            pairs_empty: self.empty(),
            scores_stored: self.stored(),
            failed_pairs: self.failed(),
            failed_pair_sample: self
                .failed_sample
                .lock()
                .map(|s| s.clone())
                .unwrap_or_default(),
            unregistered_evidence: self.unregistered(),
            sparsity_ratio: sparsity_ratio(enumerated, with_data),
            elapsed: self.elapsed(),
        }
    }
}

/// `(total - with_data) / total`, or 0 for an empty run.
pub fn sparsity_ratio(total: u64, with_data: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    total.saturating_sub(with_data) as f64 / total as f64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub namespace: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pairs_enumerated: u64,
    pub pairs_fetched: u64,
    pub pairs_with_data: u64,
    pub pairs_empty: u64,
    pub scores_stored: u64,
    pub failed_pairs: u64,
    pub failed_pair_sample: Vec<String>,
    pub unregistered_evidence: u64,
    pub sparsity_ratio: f64,
    pub elapsed: Duration,
}

impl RunSummary {
    /// One-line human form for the final log line.
    pub fn headline(&self) -> String {
        format!(
            "{} pairs, {} with data, {} stored, {} failed, sparsity {:.3}",
            millify(self.pairs_enumerated as f64),
            millify(self.pairs_with_data as f64),
            millify(self.scores_stored as f64),
            self.failed_pairs,
            self.sparsity_ratio,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparsity_ratio() {
        assert_eq!(sparsity_ratio(0, 0), 0.0);
        assert_eq!(sparsity_ratio(4, 1), 0.75);
        assert_eq!(sparsity_ratio(2, 2), 0.0);
    }

    #[test]
    fn test_last_worker_sets_stage_flag() {
        let progress = Progress::new(2, 1);
        progress.fetch_worker_exited();
        assert!(!progress.fetch_finished());
        progress.fetch_worker_exited();
        assert!(progress.fetch_finished());
        progress.compute_worker_exited();
        assert!(progress.compute_finished());
    }

    #[test]
    fn test_failed_sample_is_capped() {
        let progress = Progress::new(1, 1);
        for i in 0..(FAILED_SAMPLE_LIMIT + 5) {
            progress.record_failed(&PairKey::new(format!("T{i}"), "D"));
        }
        let summary = progress.summary(Uuid::new_v4(), "ns", Utc::now());
        assert_eq!(summary.failed_pairs, (FAILED_SAMPLE_LIMIT + 5) as u64);
        assert_eq!(summary.failed_pair_sample.len(), FAILED_SAMPLE_LIMIT);
        assert_eq!(summary.failed_pair_sample[0], "T0-D");
    }

    #[test]
    fn test_percent_computed() {
        let progress = Progress::new(1, 1);
        assert_eq!(progress.percent_computed(), 0.0);
        for _ in 0..4 {
            progress.record_enumerated();
        }
        progress.record_scored();
        progress.record_empty();
        assert_eq!(progress.percent_computed(), 50.0);
    }

    #[test]
    fn test_unregistered_evidence_reaches_summary() {
        let progress = Progress::new(1, 1);
        progress.record_unregistered(2);
        progress.record_unregistered(1);
        let summary = progress.summary(Uuid::new_v4(), "ns", Utc::now());
        assert_eq!(summary.unregistered_evidence, 3);
    }
}
