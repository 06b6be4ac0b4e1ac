//! Domain errors for the chartwright evolution engine.

use thiserror::Error;

/// Domain-level errors.
///
/// Only transport/infrastructure failures from external collaborators are
/// fatal to a run. Generation failures are recovered locally by the
/// regeneration sub-loop and never surface here; scoring ambiguity resolves
/// to neutral values rather than erroring.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid phase for {action}: run is {phase}")]
    InvalidPhase { phase: String, action: String },

    #[error("Critic agent unreachable: {0}")]
    CriticUnreachable(String),

    #[error("Artifact generator unreachable: {0}")]
    GeneratorUnreachable(String),

    #[error("Artifact recorder error: {0}")]
    RecorderError(String),

    #[error("Case not found: {0}")]
    CaseNotFound(String),

    #[error("Snapshot round-trip failed: {0}")]
    SnapshotError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::RecorderError(err.to_string())
    }
}
