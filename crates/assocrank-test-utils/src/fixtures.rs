//! Registry fixtures and evidence builders.

use assocrank_common::{DatasourceRegistry, EvidenceScore, PairKey};
use assocrank_db::MemoryEvidenceRepository;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// `dsA`,`dsC` → `dt1`; `dsB` → `dt2`; `A` → `genetic`.
pub fn letter_registry() -> DatasourceRegistry {
    DatasourceRegistry::new([
        ("dsA", "dt1"),
        ("dsB", "dt2"),
        ("dsC", "dt1"),
        ("A", "genetic"),
    ])
}

pub fn evidence(score: f64, datatype: &str, datasource: &str) -> EvidenceScore {
    EvidenceScore::new(score, datatype, datasource)
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// `n` evidence items drawn from the registry's datasources, scores in (0, 1].
pub fn random_evidence(rng: &mut StdRng, registry: &DatasourceRegistry, n: usize) -> Vec<EvidenceScore> {
    let sources: Vec<(&str, &str)> = registry.entries().collect();
    (0..n)
        .filter_map(|_| {
            let (ds, dt) = sources.choose(rng)?;
            let score = 1.0 - rng.gen_range(0.0..1.0);
            Some(EvidenceScore::new(score, *dt, *ds))
        })
        .collect()
}

/// `T1-D1` with two `A` items (0.9, 0.4) and `T2-D1` with none.
pub fn two_pair_repository() -> MemoryEvidenceRepository {
    MemoryEvidenceRepository::new()
        .with_pair(
            PairKey::new("T1", "D1"),
            vec![evidence(0.9, "genetic", "A"), evidence(0.4, "genetic", "A")],
        )
        .with_pair(PairKey::new("T2", "D1"), vec![])
}

/// `pairs` keys over `targets` targets; every `empty_every`-th key has no
/// evidence, the rest carry 1..=5 random items.
pub fn sparse_repository(
    seed: u64,
    registry: &DatasourceRegistry,
    pairs: usize,
    targets: usize,
    empty_every: usize,
) -> MemoryEvidenceRepository {
    let mut rng = seeded_rng(seed);
    let mut repo = MemoryEvidenceRepository::new();
    for i in 0..pairs {
        let key = PairKey::new(format!("T{}", i % targets.max(1)), format!("D{i}"));
        let items = if empty_every > 0 && i % empty_every == 0 {
            Vec::new()
        } else {
            let n = rng.gen_range(1..=5);
            random_evidence(&mut rng, registry, n)
        };
        repo = repo.with_pair(key, items);
    }
    repo
}
