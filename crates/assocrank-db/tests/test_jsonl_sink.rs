//! Filesystem round trip for the JSON-lines score sink.

use assocrank_common::{AssociationScoreSet, DatasourceRegistry, PairKey};
use assocrank_db::{JsonlScoreSink, ScoreBatch, ScoreSink};

fn batch(entries: &[(&str, &str, f64)]) -> ScoreBatch {
    let registry = DatasourceRegistry::default();
    entries
        .iter()
        .map(|(t, d, overall)| {
            let mut set = AssociationScoreSet::new(&PairKey::new(*t, *d), &registry);
            set.sum.overall = *overall;
            (set.id.clone(), set)
        })
        .collect()
}

#[tokio::test]
async fn test_commit_finalize_load() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonlScoreSink::new(dir.path());

    sink.clear("scores").await.unwrap();
    sink.commit_batch("scores", &batch(&[("T1", "D1", 0.4), ("T2", "D1", 0.2)]))
        .await
        .unwrap();
    sink.commit_batch("scores", &batch(&[("T1", "D1", 0.9)])).await.unwrap();

    // Pending batches are visible before finalize.
    assert_eq!(sink.load("scores").await.unwrap().len(), 2);

    assert_eq!(sink.finalize("scores").await.unwrap(), 2);

    let ns_dir = dir.path().join("scores");
    assert!(ns_dir.join("associations.jsonl").exists());
    assert!(!ns_dir.join("batch-000001.jsonl").exists());

    let loaded = sink.load("scores").await.unwrap();
    assert_eq!(loaded["T1-D1"].sum.overall, 0.9);
    assert_eq!(loaded["T2-D1"].sum.overall, 0.2);

    let manifest = sink.manifest("scores").await.unwrap().unwrap();
    assert_eq!(manifest.count, 2);
    assert_eq!(manifest.namespace, "scores");
}

#[tokio::test]
async fn test_clear_replaces_previous_run() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonlScoreSink::new(dir.path());

    sink.commit_batch("scores", &batch(&[("T1", "D1", 0.4), ("T3", "D3", 0.1)]))
        .await
        .unwrap();
    sink.finalize("scores").await.unwrap();

    assert_eq!(sink.clear("scores").await.unwrap(), 2);
    assert!(sink.manifest("scores").await.unwrap().is_none());

    sink.commit_batch("scores", &batch(&[("T1", "D1", 0.5)])).await.unwrap();
    assert_eq!(sink.finalize("scores").await.unwrap(), 1);
    let loaded = sink.load("scores").await.unwrap();
    assert!(!loaded.contains_key("T3-D3"));
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonlScoreSink::new(dir.path());

    sink.commit_batch("a", &batch(&[("T1", "D1", 0.4)])).await.unwrap();
    sink.commit_batch("b", &batch(&[("T2", "D2", 0.4)])).await.unwrap();
    sink.clear("a").await.unwrap();

    assert!(sink.load("a").await.unwrap().is_empty());
    assert_eq!(sink.load("b").await.unwrap().len(), 1);
    assert!(sink.commit_batch("../escape", &batch(&[])).await.is_err());
}
