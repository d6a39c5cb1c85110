//! JSON-lines score sink on the local filesystem.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<namespace>/batch-000001.jsonl   one file per committed batch
//! <root>/<namespace>/associations.jsonl   compacted result, written by finalize
//! <root>/<namespace>/_MANIFEST.json       count and finalize timestamp
//! ```
//!
//! Every file is written to a hidden `.<name>.tmp` sibling and renamed into
//! place, so a crash mid-write never leaves a partial `batch-*.jsonl`.

use crate::sink::{ScoreBatch, ScoreSink};
use assocrank_common::{AssocError, AssociationScoreSet, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const COMPACTED_FILE: &str = "associations.jsonl";
const MANIFEST_FILE: &str = "_MANIFEST.json";
const BATCH_PREFIX: &str = "batch-";
const BATCH_EXTENSION: &str = "jsonl";

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Manifest {
    pub namespace: String,
    pub count: u64,
    pub finalized_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct JsonlScoreSink {
    root: PathBuf,
    next_batch: Mutex<HashMap<String, u64>>,
}

impl JsonlScoreSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            next_batch: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf> {
        if namespace.is_empty()
            || namespace.contains('/')
            || namespace.contains('\\')
            || namespace.contains("..")
        {
            return Err(AssocError::Sink(format!("invalid namespace: {namespace:?}")));
        }
        Ok(self.root.join(namespace))
    }

    /// Read back everything stored under `namespace`: the compacted file
    /// overlaid with any batches not yet finalized.
    pub async fn load(&self, namespace: &str) -> Result<BTreeMap<String, AssociationScoreSet>> {
        let dir = self.namespace_dir(namespace)?;
        collect_namespace(&dir).await
    }

    pub async fn manifest(&self, namespace: &str) -> Result<Option<Manifest>> {
        let path = self.namespace_dir(namespace)?.join(MANIFEST_FILE);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Batch files in commit order.
async fn batch_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_batch = entry.file_name().to_string_lossy().starts_with(BATCH_PREFIX)
            && path.extension().is_some_and(|ext| ext == BATCH_EXTENSION);
        if is_batch {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

async fn read_sets(path: &Path, into: &mut BTreeMap<String, AssociationScoreSet>) -> Result<()> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let set: AssociationScoreSet = serde_json::from_str(line)?;
        into.insert(set.id.clone(), set);
    }
    Ok(())
}

async fn collect_namespace(dir: &Path) -> Result<BTreeMap<String, AssociationScoreSet>> {
    let mut sets = BTreeMap::new();
    read_sets(&dir.join(COMPACTED_FILE), &mut sets).await?;
    for file in batch_files(dir).await? {
        read_sets(&file, &mut sets).await?;
    }
    Ok(sets)
}

fn encode_lines<'a>(sets: impl Iterator<Item = &'a AssociationScoreSet>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for set in sets {
        serde_json::to_writer(&mut buf, set)?;
        buf.push(b'\n');
    }
    Ok(buf)
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_path(path);
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl ScoreSink for JsonlScoreSink {
    async fn clear(&self, namespace: &str) -> Result<u64> {
        let dir = self.namespace_dir(namespace)?;
        // Only the manifest is consulted: stored files may be partial or
        // unreadable and must never stop a clear.
        let removed = match self.manifest(namespace).await {
            Ok(Some(manifest)) => manifest.count,
            Ok(None) => 0,
            Err(e) => {
                warn!(namespace, error = %e, "Unreadable manifest, clearing anyway");
                0
            }
        };
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.next_batch.lock().await.remove(namespace);
        info!(namespace, removed, "Cleared score namespace");
        Ok(removed)
    }

    async fn commit_batch(&self, namespace: &str, batch: &ScoreBatch) -> Result<()> {
        let dir = self.namespace_dir(namespace)?;
        tokio::fs::create_dir_all(&dir).await?;

        let seq = {
            let mut next = self.next_batch.lock().await;
            let seq = match next.get(namespace) {
                Some(seq) => *seq,
                // Resume after batches left by an earlier process.
                None => batch_files(&dir).await?.len() as u64 + 1,
            };
            next.insert(namespace.to_string(), seq + 1);
            seq
        };

        let path = dir.join(format!("{BATCH_PREFIX}{seq:06}.jsonl"));
        write_atomic(&path, &encode_lines(batch.values())?).await?;
        debug!(namespace, seq, sets = batch.len(), "Committed score batch");
        Ok(())
    }

    async fn finalize(&self, namespace: &str) -> Result<u64> {
        let dir = self.namespace_dir(namespace)?;
        tokio::fs::create_dir_all(&dir).await?;

        let sets = collect_namespace(&dir).await?;
        write_atomic(&dir.join(COMPACTED_FILE), &encode_lines(sets.values())?).await?;
        for file in batch_files(&dir).await? {
            tokio::fs::remove_file(&file).await?;
        }
        self.next_batch.lock().await.remove(namespace);

        let manifest = Manifest {
            namespace: namespace.to_string(),
            count: sets.len() as u64,
            finalized_at: Utc::now(),
        };
        write_atomic(&dir.join(MANIFEST_FILE), &serde_json::to_vec_pretty(&manifest)?).await?;
        info!(namespace, count = manifest.count, path = %dir.display(), "Finalized score namespace");
        Ok(manifest.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_validation() {
        let sink = JsonlScoreSink::new("/tmp/scores");
        assert!(sink.namespace_dir("association-scores").is_ok());
        assert!(sink.namespace_dir("").is_err());
        assert!(sink.namespace_dir("../etc").is_err());
        assert!(sink.namespace_dir("a/b").is_err());
        assert!(sink.namespace_dir("a\\b").is_err());
    }

    #[test]
    fn test_temp_file_is_outside_batch_pattern() {
        let tmp = temp_path(Path::new("/data/ns/batch-000002.jsonl"));
        assert_eq!(tmp, Path::new("/data/ns/.batch-000002.jsonl.tmp"));
    }

    #[tokio::test]
    async fn test_clear_ignores_unparsable_files() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("ns");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("batch-000001.jsonl"), "{\"id\":\"T1-D1\",\"targ").unwrap();
        std::fs::write(dir.join("batch-000002.tmp"), "{\"id\":\"T1-D1\",\"targ").unwrap();
        std::fs::write(dir.join(MANIFEST_FILE), "not json").unwrap();

        let sink = JsonlScoreSink::new(root.path());
        assert_eq!(sink.clear("ns").await.unwrap(), 0);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_partial_temp_files_are_not_loaded() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("ns");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(".batch-000001.jsonl.tmp"), "{\"id\":").unwrap();
        std::fs::write(dir.join("batch-000002.tmp"), "{\"id\":").unwrap();

        let sink = JsonlScoreSink::new(root.path());
        assert!(sink.load("ns").await.unwrap().is_empty());
        assert!(batch_files(&dir).await.unwrap().is_empty());
    }
}
