//! assocrank-config — Run configuration: typed sections with serde
//! defaults, TOML/YAML/JSON loading, environment overrides, validation.
//!
//! Reads `assocrank.toml` from the current directory, or the path in the
//! `ASSOCRANK_CONFIG` env var. A missing default file yields the built-in
//! defaults.

pub mod error;
pub mod loader;
pub mod settings;

pub use error::{ConfigError, Result};
pub use loader::{CONFIG_ENV, DEFAULT_CONFIG_FILE};
pub use settings::{
    Config, InputSection, LoggingSection, PipelineSection, RetrySection, ScoringSection,
    StorageSection,
};
