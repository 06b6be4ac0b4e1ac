//! Infrastructure implementations of the domain ports.

pub mod recorder;
pub mod scripted;

pub use recorder::{CaseInfo, FsArtifactRecorder};
pub use scripted::{ScriptedCritic, ScriptedGenerator};
