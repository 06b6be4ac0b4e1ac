//! Chartwright - Feedback-Scored Evolution Engine
//!
//! Chartwright turns free-form critique into deterministic evolution of
//! generated data visualizations: a lexicon scorer grades each piece of
//! feedback, keyword rules mutate versioned feature states, and a two-level
//! convergence loop (inner critic turns, outer user iterations) drives the
//! artifact toward acceptance.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, ports, and errors; no IO
//! - **Service Layer** (`services`): scoring, history, the convergence
//!   controller, configuration
//! - **Infrastructure Layer** (`infrastructure`): filesystem recorder and
//!   scripted collaborators
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use chartwright::{ConvergenceController, RunState};
//! use chartwright::infrastructure::{FsArtifactRecorder, ScriptedCritic, ScriptedGenerator};
//! use chartwright::services::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let controller = ConvergenceController::new(
//!         Arc::new(ScriptedGenerator::new()),
//!         Arc::new(ScriptedCritic::new()),
//!         Arc::new(FsArtifactRecorder::new(&config.artifacts.base_dir)),
//!         config.iteration.clone(),
//!     );
//!     let mut state = RunState::new("demo", config.ledger.capacity);
//!     let report = controller.run_iteration(&mut state).await?;
//!     println!("accepted: {}", report.accepted);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    EvolvableState, FeedbackCategory, FeedbackRecord, FeedbackSource, FlagValue, ImprovementItem,
    IterationReport, Priority, RunPhase, RunState, StateSnapshot, TurnReport, UserPriority,
};
pub use domain::ports::{
    ArtifactGenerator, ArtifactRecorder, CriticAgent, CriticContext, GenerationContext,
    GenerationResult, IterationArtifact,
};
pub use services::{Config, ConfigError, ConvergenceController, FeedbackLedger};
