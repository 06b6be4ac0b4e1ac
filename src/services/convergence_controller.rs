//! The two-level convergence loop.
//!
//! The controller owns the run lifecycle:
//!
//! - **Outer loop (user iteration)** -- `Idle -> Running ->
//!   AwaitingUserFeedback -> (Running | Done)`. Each cycle runs exactly one
//!   inner critic loop and then suspends. Suspension is an explicit
//!   re-entry: the controller is re-invoked with the [`RunState`], not
//!   blocked in-process.
//! - **Inner loop (critic turn)** -- bounded by `max_critic_turns`. Each
//!   turn runs a bounded regeneration sub-loop, scores the critic's reply,
//!   and applies the accept-turn predicate. Rejection mutates both
//!   evolvable states and feeds the rolling window.
//!
//! Accept-turn predicate: `(approved && score >= critic_threshold) ||
//! score >= 0.9`. The second disjunct lets a very high score short-circuit
//! explicit approval language.
//!
//! Failure semantics: generation failures are retried locally and, once
//! attempts are exhausted, surfaced to the critic as context with
//! `execution_success = false`. Turn-budget exhaustion is a normal exit.
//! Only transport errors from the collaborator ports propagate.

use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::feedback::{FeedbackSource, UserPriority};
use crate::domain::models::run_state::{IterationReport, RunPhase, RunState, TurnReport};
use crate::domain::ports::{
    ArtifactGenerator, ArtifactRecorder, CriticAgent, CriticContext, GenerationContext,
    GenerationResult, IterationArtifact,
};
use crate::services::config::IterationConfig;
use crate::services::scorer;

/// Score at which a turn is accepted even without approval language.
const SCORE_OVERRIDE: f64 = 0.9;

/// Separator between prior feedback items in the aggregated context.
const FEEDBACK_SEPARATOR: &str = "\n\n--- PRIOR CRITIC FEEDBACK ---\n";

/// Character cap on error text carried into contexts.
const ERROR_EXCERPT_CHARS: usize = 500;

/// Outcome of applying user feedback at an outer-loop checkpoint.
#[derive(Debug, Clone)]
pub struct UserFeedbackOutcome {
    pub phase: RunPhase,
    pub visual_version: u32,
    pub data_version: u32,
    /// Reply from the optional post-user critic pass, when it succeeded.
    pub post_critic_feedback: Option<String>,
}

/// Drives the two-level loop over an explicit [`RunState`].
pub struct ConvergenceController<G: ArtifactGenerator, C: CriticAgent, R: ArtifactRecorder> {
    generator: Arc<G>,
    critic: Arc<C>,
    recorder: Arc<R>,
    config: IterationConfig,
}

impl<G: ArtifactGenerator, C: CriticAgent, R: ArtifactRecorder> ConvergenceController<G, C, R> {
    pub fn new(
        generator: Arc<G>,
        critic: Arc<C>,
        recorder: Arc<R>,
        config: IterationConfig,
    ) -> Self {
        Self {
            generator,
            critic,
            recorder,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Outer loop
    // -----------------------------------------------------------------------

    /// Run one outer iteration: a full inner critic loop over a fresh
    /// artifact, suspending afterwards for user feedback.
    pub async fn run_iteration(&self, state: &mut RunState) -> DomainResult<IterationReport> {
        match state.phase {
            RunPhase::Idle | RunPhase::Running => {}
            phase => {
                return Err(DomainError::InvalidPhase {
                    phase: phase.as_str().to_string(),
                    action: "run_iteration".to_string(),
                })
            }
        }

        if state.outer_iteration == 0 {
            self.recorder.create_case(&state.case_name).await?;
        }

        state.phase = RunPhase::Running;
        state.outer_iteration += 1;
        tracing::info!(
            case = %state.case_name,
            outer_iteration = state.outer_iteration,
            "starting user iteration"
        );

        let report = self.run_critic_loop(state).await?;

        state.phase = RunPhase::AwaitingUserFeedback;
        Ok(report)
    }

    /// Apply user feedback at the outer-loop checkpoint.
    ///
    /// `satisfied` terminates the run. Otherwise the feedback is composed
    /// with its priority tag, scored, stored, applied to both evolvable
    /// states, persisted, and the run is re-armed for the next iteration
    /// (or terminated when the user-iteration budget is spent).
    pub async fn apply_user_feedback(
        &self,
        state: &mut RunState,
        feedback: &str,
        priority: UserPriority,
        satisfied: bool,
    ) -> DomainResult<UserFeedbackOutcome> {
        if state.phase != RunPhase::AwaitingUserFeedback {
            return Err(DomainError::InvalidPhase {
                phase: state.phase.as_str().to_string(),
                action: "apply_user_feedback".to_string(),
            });
        }

        if satisfied {
            state.phase = RunPhase::Done;
            tracing::info!(case = %state.case_name, "user satisfied, run complete");
            return Ok(UserFeedbackOutcome {
                phase: RunPhase::Done,
                visual_version: state.visual.version(),
                data_version: state.data.version(),
                post_critic_feedback: None,
            });
        }

        let composed = format!("[Priority: {}]\n\n{}", priority.label(), feedback);
        let record = scorer::analyze(&composed, FeedbackSource::User, state.outer_iteration);
        state.ledger.store(record);

        state.visual.evolve(&composed, FeedbackSource::User);
        state.data.evolve(&composed, FeedbackSource::User);
        state.user_feedback = Some(composed.clone());

        state.total_iterations += 1;
        self.recorder
            .record(
                &state.case_name,
                &IterationArtifact {
                    iteration: state.total_iterations,
                    kind: FeedbackSource::User,
                    feedback: composed.clone(),
                    code: None,
                    plot_path: None,
                    visual_snapshot: state.visual.snapshot(),
                    data_snapshot: state.data.snapshot(),
                },
            )
            .await?;

        // Optional critic pass on the freshly applied user feedback. A
        // failure here is logged and swallowed: the pass is advisory and
        // must not undo an already-applied checkpoint.
        let post_critic_feedback = self.post_user_critic_pass(state, &composed).await;

        state.phase = if state.outer_iteration >= self.config.max_user_iterations {
            tracing::info!(
                case = %state.case_name,
                "user iteration budget spent, run complete"
            );
            RunPhase::Done
        } else {
            RunPhase::Running
        };

        Ok(UserFeedbackOutcome {
            phase: state.phase,
            visual_version: state.visual.version(),
            data_version: state.data.version(),
            post_critic_feedback,
        })
    }

    // -----------------------------------------------------------------------
    // Inner loop
    // -----------------------------------------------------------------------

    /// The inner critic loop: up to `max_critic_turns` generate/score/decide
    /// cycles. Exhausting the turn budget is a normal exit, reported as not
    /// accepted.
    async fn run_critic_loop(&self, state: &mut RunState) -> DomainResult<IterationReport> {
        let mut turns = Vec::new();
        let mut accepted = false;
        let mut turns_used = 0;
        let mut final_score = 0.0;

        for turn in 1..=self.config.max_critic_turns {
            let (generation, attempts_used) = self.regenerate(state, turn).await?;
            let execution_success = generation.success;

            let critic_context = self.build_critic_context(
                state,
                turn,
                &generation,
                attempts_used,
                execution_success,
            );
            let feedback = self.critic.evaluate(&critic_context).await?;

            let record = scorer::analyze(&feedback, FeedbackSource::Critic, turn);
            let quality_score = record.score;
            let approved = scorer::is_approved(&feedback);
            let category = record.category;
            state.ledger.store(record);
            state.last_critic_feedback = Some(feedback.clone());

            state.total_iterations += 1;
            self.recorder
                .record(
                    &state.case_name,
                    &IterationArtifact {
                        iteration: state.total_iterations,
                        kind: FeedbackSource::Critic,
                        feedback: feedback.clone(),
                        code: Some(generation.code.clone()),
                        plot_path: generation.artifact_path.clone(),
                        visual_snapshot: state.visual.snapshot(),
                        data_snapshot: state.data.snapshot(),
                    },
                )
                .await?;

            let turn_accepted = (approved && quality_score >= self.config.critic_threshold)
                || quality_score >= SCORE_OVERRIDE;

            tracing::info!(
                turn,
                max_turns = self.config.max_critic_turns,
                quality_score,
                approved,
                accepted = turn_accepted,
                "critic turn scored"
            );

            turns.push(TurnReport {
                turn,
                regen_attempts: attempts_used,
                execution_success,
                quality_score,
                approved,
                accepted: turn_accepted,
                category,
            });
            turns_used = turn;
            final_score = quality_score;

            if turn_accepted {
                accepted = true;
                break;
            }

            state.visual.evolve(&feedback, FeedbackSource::Critic);
            state.data.evolve(&feedback, FeedbackSource::Critic);
            state.window.push(feedback);
        }

        Ok(IterationReport {
            outer_iteration: state.outer_iteration,
            accepted,
            turns_used,
            final_score,
            turns,
            visual_version: state.visual.version(),
            data_version: state.data.version(),
        })
    }

    /// The regeneration sub-loop: up to `max_regen_attempts` tries, each
    /// retry carrying the previous attempt's error text. Exhaustion returns
    /// the last failed result; the critic is consulted anyway.
    async fn regenerate(
        &self,
        state: &mut RunState,
        turn: u32,
    ) -> DomainResult<(GenerationResult, u32)> {
        let mut previous_error: Option<String> = None;
        let mut last_result: Option<GenerationResult> = None;

        for attempt in 1..=self.config.max_regen_attempts {
            let context = GenerationContext {
                case_name: state.case_name.clone(),
                attempt,
                max_attempts: self.config.max_regen_attempts,
                visual_features: state.visual.active_features(),
                data_capabilities: state.data.active_features(),
                feedback_context: self.aggregated_feedback_context(state, turn),
                user_feedback: state.user_feedback.clone(),
                previous_error: previous_error.clone(),
            };

            let result = self.generator.generate(&context).await?;
            if result.success {
                state.last_execution_error = None;
                return Ok((result, attempt));
            }

            let error = result
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string());
            tracing::warn!(
                turn,
                attempt,
                max_attempts = self.config.max_regen_attempts,
                error = %truncate_chars(&error, 120),
                "generation attempt failed"
            );
            state.last_execution_error = Some(error.clone());
            previous_error = Some(error);
            last_result = Some(result);
        }

        // All attempts failed; proceed to critic evaluation regardless.
        let result = last_result.unwrap_or(GenerationResult {
            success: false,
            error: previous_error,
            artifact_path: None,
            code: String::new(),
        });
        Ok((result, self.config.max_regen_attempts))
    }

    // -----------------------------------------------------------------------
    // Context assembly
    // -----------------------------------------------------------------------

    /// Aggregate prior critic feedback for the writer: the last
    /// `critic_context_depth` window entries, most-recent last. A pending
    /// execution error is always appended, regardless of the depth cap.
    fn aggregated_feedback_context(&self, state: &RunState, turn: u32) -> Option<String> {
        let mut aggregated = if turn > 1 && !state.window.is_empty() {
            Some(
                state
                    .window
                    .recent(self.config.critic_context_depth)
                    .join(FEEDBACK_SEPARATOR),
            )
        } else {
            None
        };

        if let Some(error) = &state.last_execution_error {
            let excerpt = truncate_chars(error, ERROR_EXCERPT_CHARS);
            aggregated = Some(format!(
                "{}\n\nLAST_EXECUTION_ERROR:\n{}",
                aggregated.unwrap_or_default(),
                excerpt
            ));
        }

        aggregated
    }

    fn build_critic_context(
        &self,
        state: &RunState,
        turn: u32,
        generation: &GenerationResult,
        attempts_used: u32,
        execution_success: bool,
    ) -> CriticContext {
        CriticContext {
            case_name: state.case_name.clone(),
            turn,
            visual_version: state.visual.version(),
            active_features: state.visual.active_features(),
            execution_success,
            regen_attempts_used: attempts_used,
            artifact_present: generation.artifact_path.is_some(),
            last_error: state.last_execution_error.clone(),
            user_feedback: state.user_feedback.clone(),
            previous_feedback: if turn > 1 {
                state.last_critic_feedback.clone()
            } else {
                None
            },
            code: generation.code.clone(),
        }
    }

    /// Critic pass over freshly applied user feedback. Returns the reply on
    /// success; errors are logged and swallowed.
    async fn post_user_critic_pass(
        &self,
        state: &mut RunState,
        user_feedback: &str,
    ) -> Option<String> {
        let context = CriticContext {
            case_name: state.case_name.clone(),
            turn: state.outer_iteration,
            visual_version: state.visual.version(),
            active_features: state.visual.active_features(),
            execution_success: true,
            regen_attempts_used: 0,
            artifact_present: false,
            last_error: None,
            user_feedback: Some(user_feedback.to_string()),
            previous_feedback: state.last_critic_feedback.clone(),
            code: String::new(),
        };

        let reply = match self.critic.evaluate(&context).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "post-user critic evaluation failed");
                return None;
            }
        };

        let record = scorer::analyze(&reply, FeedbackSource::CriticPostUser, state.outer_iteration);
        state.ledger.store(record);
        state.last_critic_feedback = Some(reply.clone());

        state.total_iterations += 1;
        let artifact = IterationArtifact {
            iteration: state.total_iterations,
            kind: FeedbackSource::CriticPostUser,
            feedback: reply.clone(),
            code: None,
            plot_path: None,
            visual_snapshot: state.visual.snapshot(),
            data_snapshot: state.data.snapshot(),
        };
        if let Err(e) = self.recorder.record(&state.case_name, &artifact).await {
            tracing::warn!(error = %e, "failed to record post-user critic artifact");
        }

        Some(reply)
    }
}

/// Truncate to at most `max` characters on a char boundary.
fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

// ===========================================================================
// Tests
// ===========================================================================
