//! Service layer: scoring, history, evolution control, configuration.

pub mod config;
pub mod convergence_controller;
pub mod ledger;
pub mod rolling_window;
pub mod scorer;
pub mod structured_eval;

pub use config::{Config, ConfigError};
pub use convergence_controller::{ConvergenceController, UserFeedbackOutcome};
pub use ledger::{DetailedTrends, FeedbackLedger, FeedbackTrends, ScoreTrend};
pub use rolling_window::RollingFeedbackWindow;
pub use scorer::ImprovementPlan;
pub use structured_eval::{parse_structured_scores, StructuredEval};
