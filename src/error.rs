use std::path::PathBuf;

use thiserror::Error;

/// Failures of a transactional script application.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("connection unavailable")]
    ConnectionUnavailable(#[source] sqlx::Error),
    #[error("execution failed")]
    ExecutionFailed(#[source] sqlx::Error),
    #[error("commit failed")]
    CommitFailed(#[source] sqlx::Error),
    #[error("deadline exceeded during {stage}")]
    TimedOut { stage: &'static str },
    #[error("transaction already closed")]
    Closed,
}

/// Failures of the single call to the generation endpoint.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation failed")]
    GenerationFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("generation failed: deadline exceeded")]
    TimedOut,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("resource {path} could not be read")]
    Missing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("prompt template has no {slot} slot")]
    MissingSlot { slot: &'static str },
    #[error("ollama host {0:?} must be an http:// or https:// URL with a host name")]
    InvalidHost(String),
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
    #[error("timeout must not exceed {max:?}")]
    TimeoutTooLong { max: std::time::Duration },
}
