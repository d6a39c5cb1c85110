//! Effective run configuration for the binary.
//! File (`--config`, `ASSOCRANK_CONFIG` or `assocrank.toml`), then
//! `ASSOCRANK_*` env vars, then command-line flags.

use anyhow::Context;
use assocrank_config::Config;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Command-line values that override the loaded config when present.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub evidence: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub namespace: Option<String>,
    pub fetch_workers: Option<usize>,
    pub compute_workers: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub chunk_size: Option<usize>,
    pub dry_run: bool,
    pub only_direct: bool,
    pub targets: Vec<String>,
    pub log_level: Option<String>,
}

mod tests;

pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => return Config::from_env_or_default().context("Failed to load configuration"),
    };
    config
        .apply_env_overrides()
        .context("Invalid ASSOCRANK_* environment override")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub fn apply(config: &mut Config, overrides: &RunOverrides) -> anyhow::Result<()> {
    if let Some(path) = &overrides.evidence {
        config.input.evidence_path = path.clone();
    }
    if let Some(dir) = &overrides.output_dir {
        config.storage.output_dir = dir.clone();
    }
    if let Some(ns) = &overrides.namespace {
        config.storage.namespace = ns.clone();
    }
    if let Some(n) = overrides.fetch_workers {
        config.pipeline.fetch_workers = n;
    }
    if let Some(n) = overrides.compute_workers {
        config.pipeline.compute_workers = n;
    }
    if let Some(n) = overrides.queue_capacity {
        config.pipeline.queue_capacity = n;
    }
    if let Some(n) = overrides.chunk_size {
        config.storage.chunk_size = n;
    }
    if overrides.dry_run {
        config.storage.dry_run = true;
    }
    if overrides.only_direct {
        config.input.only_direct = true;
    }
    if !overrides.targets.is_empty() {
        let targets: BTreeSet<String> = overrides.targets.iter().cloned().collect();
        config.input.targets = Some(targets);
    }
    if let Some(level) = &overrides.log_level {
        config.logging.level = level.clone();
    }
    config.validate().context("Invalid configuration after command-line overrides")?;
    Ok(())
}
