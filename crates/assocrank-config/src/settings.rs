//! Typed run configuration.

use assocrank_common::{DatasourceRegistry, MaxMode, ScoringMethod};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub scoring: ScoringSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub input: InputSection,
    /// Replaces the built-in datasource→datatype table when set.
    #[serde(default)]
    pub registry: Option<DatasourceRegistry>,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl Config {
    pub fn datasource_registry(&self) -> DatasourceRegistry {
        self.registry.clone().unwrap_or_default()
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSection {
    /// 0 = four per available core; fetching is I/O-bound.
    #[serde(default)]
    pub fetch_workers: usize,
    /// 0 = one per available core.
    #[serde(default)]
    pub compute_workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_log_every")]
    pub log_every: u64,
}

fn default_queue_capacity() -> usize { 10_000 }
fn default_log_every()      -> u64   { 10_000 }

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            fetch_workers: 0,
            compute_workers: 0,
            queue_capacity: default_queue_capacity(),
            log_every: default_log_every(),
        }
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

impl PipelineSection {
    pub fn resolved_fetch_workers(&self) -> usize {
        if self.fetch_workers == 0 {
            4 * available_cores()
        } else {
            self.fetch_workers
        }
    }

    pub fn resolved_compute_workers(&self) -> usize {
        if self.compute_workers == 0 {
            available_cores()
        } else {
            self.compute_workers
        }
    }
}

// ── Scoring ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringSection {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default)]
    pub max_mode: MaxMode,
    #[serde(default = "default_methods")]
    pub methods: Vec<ScoringMethod>,
}

fn default_max_entries() -> usize { 1000 }
fn default_methods() -> Vec<ScoringMethod> { ScoringMethod::ALL.to_vec() }

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            max_mode: MaxMode::default(),
            methods: default_methods(),
        }
    }
}

// ── Storage ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub dry_run: bool,
}

fn default_namespace()  -> String  { "association-scores".to_string() }
fn default_output_dir() -> PathBuf { PathBuf::from("./data/scores") }
fn default_chunk_size() -> usize   { 1000 }

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            output_dir: default_output_dir(),
            chunk_size: default_chunk_size(),
            dry_run: false,
        }
    }
}

// ── Retry ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts()       -> u32 { 5 }
fn default_initial_backoff_ms() -> u64 { 50 }
fn default_max_backoff_ms()     -> u64 { 2000 }

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

// ── Input ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSection {
    #[serde(default = "default_evidence_path")]
    pub evidence_path: PathBuf,
    #[serde(default)]
    pub only_direct: bool,
    #[serde(default)]
    pub targets: Option<BTreeSet<String>>,
}

fn default_evidence_path() -> PathBuf { PathBuf::from("./data/evidence.jsonl") }

impl Default for InputSection {
    fn default() -> Self {
        Self {
            evidence_path: default_evidence_path(),
            only_direct: false,
            targets: None,
        }
    }
}

// ── Logging ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingSection {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}
