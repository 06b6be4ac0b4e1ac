//! Run state for the two-level convergence loop.
//!
//! Everything a run accumulates lives in one explicit aggregate owned by
//! the convergence controller and passed into every re-entry, so a
//! suspended run is just a value waiting for the next call.

use serde::{Deserialize, Serialize};

use crate::domain::models::evolution::EvolvableState;
use crate::domain::models::feedback::FeedbackCategory;
use crate::services::ledger::FeedbackLedger;
use crate::services::rolling_window::RollingFeedbackWindow;

/// Outer-loop phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Created, no iteration started yet.
    Idle,
    /// An iteration may run (initial, or re-armed by user feedback).
    Running,
    /// Inner loop finished; suspended until user feedback arrives.
    AwaitingUserFeedback,
    /// User signalled satisfaction; terminal.
    Done,
}

impl RunPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::AwaitingUserFeedback => "awaiting_user_feedback",
            Self::Done => "done",
        }
    }
}

/// Everything a run accumulates across outer iterations.
///
/// Mutated only by the convergence controller; there is exactly one active
/// turn at a time, so no locking is needed.
#[derive(Debug)]
pub struct RunState {
    pub case_name: String,
    pub phase: RunPhase,
    /// Completed outer (user) iterations.
    pub outer_iteration: u32,
    /// Total persisted iterations across both loop levels, drives the
    /// `v{NNN}` artifact keys.
    pub total_iterations: u32,
    /// Visual feature state (what the plot shows).
    pub visual: EvolvableState,
    /// Data capability state (what the feeding service computes).
    pub data: EvolvableState,
    /// Structured scored-feedback history.
    pub ledger: FeedbackLedger,
    /// Raw critic feedback texts reused as generation context.
    pub window: RollingFeedbackWindow,
    /// Error text from the last failed generation, injected into the next
    /// attempt's context and never dropped by the context depth cap.
    pub last_execution_error: Option<String>,
    /// Most recent critic reply, made available to the next turn's context.
    pub last_critic_feedback: Option<String>,
    /// User feedback from the previous outer iteration, if any.
    pub user_feedback: Option<String>,
}

impl RunState {
    pub fn new(case_name: impl Into<String>, ledger_capacity: usize) -> Self {
        Self {
            case_name: case_name.into(),
            phase: RunPhase::Idle,
            outer_iteration: 0,
            total_iterations: 0,
            visual: EvolvableState::visual_features(),
            data: EvolvableState::data_capabilities(),
            ledger: FeedbackLedger::new(ledger_capacity),
            window: RollingFeedbackWindow::new(),
            last_execution_error: None,
            last_critic_feedback: None,
            user_feedback: None,
        }
    }
}

/// Outcome of one critic turn, the surfaced form of the transient
/// per-turn iteration context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReport {
    /// 1-based turn number within the inner loop.
    pub turn: u32,
    /// Regeneration attempts used this turn.
    pub regen_attempts: u32,
    pub execution_success: bool,
    pub quality_score: f64,
    /// Approval language detected in the critic text.
    pub approved: bool,
    /// Whether the accept-turn predicate passed.
    pub accepted: bool,
    pub category: FeedbackCategory,
}

/// Outcome of one full outer iteration (one inner critic loop).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationReport {
    pub outer_iteration: u32,
    /// Whether the inner loop terminated on the accept predicate (as opposed
    /// to exhausting its turn budget, which is a normal exit).
    pub accepted: bool,
    pub turns_used: u32,
    pub final_score: f64,
    pub turns: Vec<TurnReport>,
    /// Visual state version after the iteration.
    pub visual_version: u32,
    /// Data state version after the iteration.
    pub data_version: u32,
}
