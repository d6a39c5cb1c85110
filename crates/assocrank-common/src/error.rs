use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssocError {
    #[error("Evidence repository unavailable: {0}")]
    Unavailable(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Score sink error: {0}")]
    Sink(String),

    #[error("Unknown scoring method: {0}")]
    UnknownMethod(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline error in {stage}: {message}")]
    Pipeline { stage: String, message: String },

    #[error("Pipeline cancelled")]
    Cancelled,
}

impl AssocError {
    /// Transient errors are worth retrying; everything else fails fast.
    pub fn is_transient(&self) -> bool {
        matches!(self, AssocError::Unavailable(_) | AssocError::Timeout(_))
    }

    pub fn pipeline(stage: &str, message: impl std::fmt::Display) -> Self {
        AssocError::Pipeline {
            stage: stage.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AssocError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AssocError::Unavailable("db down".into()).is_transient());
        assert!(AssocError::Timeout("fetch".into()).is_transient());
        assert!(!AssocError::Repository("bad row".into()).is_transient());
        assert!(!AssocError::Cancelled.is_transient());
    }

    #[test]
    fn test_pipeline_error_message() {
        let err = AssocError::pipeline("storer", "commit failed");
        assert_eq!(err.to_string(), "Pipeline error in storer: commit failed");
    }
}
