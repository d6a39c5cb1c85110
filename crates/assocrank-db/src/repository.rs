//! Evidence repository capability.
//!
//! The pipeline opens one repository handle per fetch worker through a
//! `RepositoryConnector`, so implementations backed by a connection never
//! share a client across workers.

use assocrank_common::{EvidenceScore, PairKey, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::BTreeMap;

/// Lookup of scored evidence by (target, disease) key.
#[async_trait]
pub trait EvidenceRepository: Send + Sync + 'static {
    /// Every distinct key exactly once. Finite and not restartable: a new
    /// call starts a new enumeration from the beginning.
    fn enumerate_distinct_keys(&self) -> BoxStream<'static, Result<PairKey>>;

    /// All evidence for a key. Unknown keys yield an empty list.
    async fn fetch_evidence(&self, key: &PairKey) -> Result<Vec<EvidenceScore>>;

    /// Evidence row count per datasource for a key.
    async fn count_evidence_by_datasource(&self, key: &PairKey) -> Result<BTreeMap<String, u64>>;
}

/// Opens repository handles.
#[async_trait]
pub trait RepositoryConnector: Send + Sync + 'static {
    type Repository: EvidenceRepository;

    async fn connect(&self) -> Result<Self::Repository>;
}

/// Handles that are cheap clones of a shared store connect by cloning.
#[async_trait]
impl<R> RepositoryConnector for R
where
    R: EvidenceRepository + Clone,
{
    type Repository = R;

    async fn connect(&self) -> Result<R> {
        Ok(self.clone())
    }
}
