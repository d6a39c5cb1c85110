//! Loading, environment overrides and validation.

use crate::error::{ConfigError, Result};
use crate::settings::Config;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

pub const CONFIG_ENV: &str = "ASSOCRANK_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "assocrank.toml";

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a config file, picking the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("toml")
            .to_ascii_lowercase();
        let config = match ext.as_str() {
            "toml" => Self::from_toml(&content)?,
            "yaml" | "yml" => Self::from_yaml(&content)?,
            "json" => Self::from_json(&content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load from `ASSOCRANK_CONFIG` if set (the file must exist), else from
    /// `assocrank.toml` if present, else defaults. Env overrides are applied
    /// and the result validated.
    pub fn from_env_or_default() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load(path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::load(DEFAULT_CONFIG_FILE)?,
            Err(_) => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `ASSOCRANK_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_override(&lookup, "ASSOCRANK_FETCH_WORKERS")? {
            self.pipeline.fetch_workers = v;
        }
        if let Some(v) = parse_override(&lookup, "ASSOCRANK_COMPUTE_WORKERS")? {
            self.pipeline.compute_workers = v;
        }
        if let Some(v) = parse_override(&lookup, "ASSOCRANK_QUEUE_CAPACITY")? {
            self.pipeline.queue_capacity = v;
        }
        if let Some(v) = parse_override(&lookup, "ASSOCRANK_DRY_RUN")? {
            self.storage.dry_run = v;
        }
        if let Some(level) = lookup("ASSOCRANK_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.chunk_size == 0 {
            return Err(ConfigError::Invalid("storage.chunk_size must be > 0".into()));
        }
        if self.storage.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.namespace must not be empty".into()));
        }
        if self.pipeline.queue_capacity == 0 {
            return Err(ConfigError::Invalid("pipeline.queue_capacity must be > 0".into()));
        }
        if self.scoring.max_entries == 0 {
            return Err(ConfigError::Invalid("scoring.max_entries must be > 0".into()));
        }
        if self.scoring.methods.is_empty() {
            return Err(ConfigError::Invalid("scoring.methods must not be empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be > 0".into()));
        }
        Ok(())
    }
}

fn parse_override<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidOverride {
                key: key.to_string(),
                value,
            }),
    }
}
