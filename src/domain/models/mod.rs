//! Domain models for the evolution engine.

pub mod evolution;
pub mod feedback;
pub mod run_state;

pub use evolution::{
    EvolutionSummary, EvolvableState, FlagValue, MutationEntry, PlotStyle, StateSnapshot,
};
pub use feedback::{
    FeedbackCategory, FeedbackRecord, FeedbackSource, ImprovementItem, Priority, UserPriority,
};
pub use run_state::{IterationReport, RunPhase, RunState, TurnReport};
