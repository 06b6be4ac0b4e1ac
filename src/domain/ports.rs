//! Ports to the external collaborators.
//!
//! The engine never talks to an LLM backend, a renderer, or the filesystem
//! directly. It consumes three boundary contracts: artifact generation,
//! critic evaluation, and artifact recording. Implementations live in
//! `infrastructure`; tests substitute mocks.
//!
//! Failure semantics: a generation that builds-but-fails is reported inside
//! [`GenerationResult`] and recovered by the regeneration sub-loop. An `Err`
//! from any port method is a transport/infrastructure failure and propagates
//! as a run-level failure.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::evolution::{FlagValue, StateSnapshot};
use crate::domain::models::feedback::FeedbackSource;

/// Context handed to the artifact generator for one regeneration attempt.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub case_name: String,
    /// 1-based regeneration attempt within the current turn.
    pub attempt: u32,
    pub max_attempts: u32,
    /// Active visual features the artifact must implement.
    pub visual_features: BTreeMap<String, FlagValue>,
    /// Active data capabilities available to the artifact.
    pub data_capabilities: BTreeMap<String, FlagValue>,
    /// Aggregated prior critic feedback (rolling window, depth-capped) plus
    /// any pending execution error, which is always included.
    pub feedback_context: Option<String>,
    /// User feedback from the previous outer iteration.
    pub user_feedback: Option<String>,
    /// Error text from the previous failed attempt, for targeted repair.
    pub previous_error: Option<String>,
}

/// What one generation attempt produced.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Whether the artifact built and executed.
    pub success: bool,
    /// Error text when `success` is false.
    pub error: Option<String>,
    /// Rendered output, when one was produced.
    pub artifact_path: Option<PathBuf>,
    /// Code representation of the artifact, persisted per iteration.
    pub code: String,
}

/// Context handed to the critic for evaluation.
#[derive(Debug, Clone)]
pub struct CriticContext {
    pub case_name: String,
    /// 1-based critic turn, or the outer iteration for post-user passes.
    pub turn: u32,
    pub visual_version: u32,
    pub active_features: BTreeMap<String, FlagValue>,
    pub execution_success: bool,
    pub regen_attempts_used: u32,
    pub artifact_present: bool,
    pub last_error: Option<String>,
    pub user_feedback: Option<String>,
    pub previous_feedback: Option<String>,
    pub code: String,
}

/// Produces an executable artifact from the current evolved state.
#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    /// Attempt to produce the artifact once. Build/run failure is reported
    /// in the result, not as an error.
    async fn generate(&self, context: &GenerationContext) -> DomainResult<GenerationResult>;
}

/// Evaluates a generated artifact and returns free-form critique text.
#[async_trait]
pub trait CriticAgent: Send + Sync {
    async fn evaluate(&self, context: &CriticContext) -> DomainResult<String>;
}

/// One completed turn's worth of persistable artifacts.
#[derive(Debug, Clone)]
pub struct IterationArtifact {
    /// Run-global iteration counter; keys the snapshot as `v{NNN}_{kind}`.
    pub iteration: u32,
    pub kind: FeedbackSource,
    pub feedback: String,
    pub code: Option<String>,
    pub plot_path: Option<PathBuf>,
    pub visual_snapshot: StateSnapshot,
    pub data_snapshot: StateSnapshot,
}

impl IterationArtifact {
    /// The versioned key this artifact is persisted under.
    pub fn key(&self) -> String {
        format!("v{:03}_{}", self.iteration, self.kind.as_str())
    }
}

/// Persists per-iteration snapshots under a case.
#[async_trait]
pub trait ArtifactRecorder: Send + Sync {
    /// Open (or create) the case this run persists under.
    async fn create_case(&self, case_name: &str) -> DomainResult<()>;

    /// Persist one iteration's artifacts under its versioned key.
    async fn record(&self, case_name: &str, artifact: &IterationArtifact) -> DomainResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::evolution::EvolvableState;

    #[test]
    fn artifact_key_is_zero_padded() {
        let state = EvolvableState::visual_features();
        let artifact = IterationArtifact {
            iteration: 7,
            kind: FeedbackSource::Critic,
            feedback: String::new(),
            code: None,
            plot_path: None,
            visual_snapshot: state.snapshot(),
            data_snapshot: EvolvableState::data_capabilities().snapshot(),
        };
        assert_eq!(artifact.key(), "v007_critic");
    }
}
