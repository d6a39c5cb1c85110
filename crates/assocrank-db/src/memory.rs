//! In-memory repository and sink.
//!
//! The repository indexes extracted score-map rows by key, so the binary can
//! score a JSON-lines evidence dump without an external store. Both types are
//! also what the pipeline tests run against.

use crate::repository::EvidenceRepository;
use crate::schema::{EnumerationFilter, ScoreMapRow};
use crate::sink::{ScoreBatch, ScoreSink};
use assocrank_common::{AssociationScoreSet, EvidenceScore, PairKey, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

// ── Repository ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct PairEntry {
    evidence: Vec<EvidenceScore>,
    has_positive: bool,
    has_positive_direct: bool,
    /// Registered explicitly, so it enumerates even without positive evidence.
    declared: bool,
}

impl PairEntry {
    fn push(&mut self, score: EvidenceScore, is_direct: bool) {
        if score.score > 0.0 {
            self.has_positive = true;
            self.has_positive_direct |= is_direct;
        }
        self.evidence.push(score);
    }

    fn passes(&self, only_direct: bool) -> bool {
        if only_direct {
            self.has_positive_direct
        } else {
            self.has_positive || self.declared
        }
    }
}

type MemoryIndex = BTreeMap<PairKey, PairEntry>;

/// Evidence held in memory, indexed by (target, disease).
#[derive(Debug, Clone, Default)]
pub struct MemoryEvidenceRepository {
    index: Arc<MemoryIndex>,
    filter: EnumerationFilter,
}

impl MemoryEvidenceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index score-map rows. Keys enumerate only if they carry at least one
    /// positive score.
    pub fn from_rows(rows: impl IntoIterator<Item = ScoreMapRow>) -> Self {
        let mut index = MemoryIndex::new();
        for row in rows {
            let score = row.to_evidence_score();
            index
                .entry(row.key())
                .or_default()
                .push(score, row.is_direct);
        }
        debug!(pairs = index.len(), "Indexed score-map rows");
        Self {
            index: Arc::new(index),
            filter: EnumerationFilter::default(),
        }
    }

    /// Declare a key with the given evidence. Declared keys are treated as
    /// direct and enumerate even when the evidence list is empty.
    pub fn with_pair(mut self, key: PairKey, evidence: Vec<EvidenceScore>) -> Self {
        let index = Arc::make_mut(&mut self.index);
        let entry = index.entry(key).or_default();
        entry.declared = true;
        for score in evidence {
            entry.push(score, true);
        }
        self
    }

    pub fn with_filter(mut self, filter: EnumerationFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn filter(&self) -> &EnumerationFilter {
        &self.filter
    }

    /// Number of indexed keys, before filtering.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

struct Cursor {
    index: Arc<MemoryIndex>,
    filter: EnumerationFilter,
    last: Option<PairKey>,
}

impl Cursor {
    fn advance(&mut self) -> Option<PairKey> {
        let lower = match &self.last {
            Some(key) => Bound::Excluded(key.clone()),
            None => Bound::Unbounded,
        };
        let next = self
            .index
            .range((lower, Bound::Unbounded))
            .find(|(key, entry)| {
                entry.passes(self.filter.only_direct) && self.filter.allows_target(&key.target_id)
            })
            .map(|(key, _)| key.clone())?;
        self.last = Some(next.clone());
        Some(next)
    }
}

#[async_trait]
impl EvidenceRepository for MemoryEvidenceRepository {
    fn enumerate_distinct_keys(&self) -> BoxStream<'static, Result<PairKey>> {
        let cursor = Cursor {
            index: Arc::clone(&self.index),
            filter: self.filter.clone(),
            last: None,
        };
        stream::unfold(cursor, |mut cursor| async move {
            let key = cursor.advance()?;
            Some((Ok(key), cursor))
        })
        .boxed()
    }

    async fn fetch_evidence(&self, key: &PairKey) -> Result<Vec<EvidenceScore>> {
        Ok(self
            .index
            .get(key)
            .map(|entry| entry.evidence.clone())
            .unwrap_or_default())
    }

    async fn count_evidence_by_datasource(&self, key: &PairKey) -> Result<BTreeMap<String, u64>> {
        let mut counts = BTreeMap::new();
        if let Some(entry) = self.index.get(key) {
            for e in &entry.evidence {
                *counts.entry(e.datasource.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

// ── Sink ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct NamespaceState {
    committed: BTreeMap<String, AssociationScoreSet>,
    finalized: bool,
    batches: u64,
}

/// Score sets held in memory per namespace.
#[derive(Debug, Clone, Default)]
pub struct MemoryScoreSink {
    namespaces: Arc<Mutex<HashMap<String, NamespaceState>>>,
}

impl MemoryScoreSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything committed to `namespace`, keyed by id.
    pub async fn snapshot(&self, namespace: &str) -> BTreeMap<String, AssociationScoreSet> {
        let namespaces = self.namespaces.lock().await;
        namespaces
            .get(namespace)
            .map(|state| state.committed.clone())
            .unwrap_or_default()
    }

    pub async fn is_finalized(&self, namespace: &str) -> bool {
        let namespaces = self.namespaces.lock().await;
        namespaces.get(namespace).map_or(false, |s| s.finalized)
    }

    pub async fn batch_count(&self, namespace: &str) -> u64 {
        let namespaces = self.namespaces.lock().await;
        namespaces.get(namespace).map_or(0, |s| s.batches)
    }
}

#[async_trait]
impl ScoreSink for MemoryScoreSink {
    async fn clear(&self, namespace: &str) -> Result<u64> {
        let mut namespaces = self.namespaces.lock().await;
        let removed = namespaces
            .remove(namespace)
            .map_or(0, |state| state.committed.len() as u64);
        Ok(removed)
    }

    async fn commit_batch(&self, namespace: &str, batch: &ScoreBatch) -> Result<()> {
        let mut namespaces = self.namespaces.lock().await;
        let state = namespaces.entry(namespace.to_string()).or_default();
        state.finalized = false;
        state.batches += 1;
        for (id, set) in batch {
            state.committed.insert(id.clone(), set.clone());
        }
        Ok(())
    }

    async fn finalize(&self, namespace: &str) -> Result<u64> {
        let mut namespaces = self.namespaces.lock().await;
        let state = namespaces.entry(namespace.to_string()).or_default();
        state.finalized = true;
        Ok(state.committed.len() as u64)
    }
}
