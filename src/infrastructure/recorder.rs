//! Filesystem artifact recorder.
//!
//! Each run gets a timestamped case directory under the configured base
//! directory:
//!
//! ```text
//! artifacts/
//!   my_case_20260828_141502/
//!     metadata.json
//!     code/      v001_critic.py
//!     feedback/  v001_critic.txt
//!     states/    v001_critic.json
//! ```
//!
//! `metadata.json` is rewritten after every recorded iteration, so a case
//! directory is self-describing even if the run dies mid-loop.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::run_state::RunState;
use crate::domain::ports::{ArtifactRecorder, IterationArtifact};

/// Per-iteration entry in `metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationMeta {
    pub key: String,
    pub kind: String,
    pub recorded_at: DateTime<Utc>,
    pub has_code: bool,
    pub plot_path: Option<PathBuf>,
}

/// Case-level metadata, rewritten on every record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseMetadata {
    pub case_id: Uuid,
    pub case_name: String,
    pub created_at: DateTime<Utc>,
    pub iterations: Vec<IterationMeta>,
}

/// Summary row for case listing.
#[derive(Debug, Clone)]
pub struct CaseInfo {
    pub directory: String,
    pub case_name: String,
    pub created_at: DateTime<Utc>,
    pub iterations: usize,
}

/// Records iteration artifacts under timestamped case directories.
pub struct FsArtifactRecorder {
    base_dir: PathBuf,
    /// Open cases, case name to directory. A name maps to the directory
    /// created for it in this process; re-creating is idempotent.
    open_cases: Mutex<HashMap<String, PathBuf>>,
}

impl FsArtifactRecorder {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            open_cases: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn case_dir(&self, case_name: &str) -> DomainResult<PathBuf> {
        self.open_cases
            .lock()
            .expect("recorder lock poisoned")
            .get(case_name)
            .cloned()
            .ok_or_else(|| DomainError::CaseNotFound(case_name.to_string()))
    }

    fn read_metadata(case_dir: &Path) -> DomainResult<CaseMetadata> {
        let raw = fs::read_to_string(case_dir.join("metadata.json"))?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_metadata(case_dir: &Path, metadata: &CaseMetadata) -> DomainResult<()> {
        let raw = serde_json::to_string_pretty(metadata)?;
        fs::write(case_dir.join("metadata.json"), raw)?;
        Ok(())
    }

    /// List all case directories under the base directory, newest first.
    pub fn list_cases(&self) -> DomainResult<Vec<CaseInfo>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut cases = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let dir = entry.path();
            let Ok(metadata) = Self::read_metadata(&dir) else {
                // Not a case directory, skip.
                continue;
            };
            cases.push(CaseInfo {
                directory: entry.file_name().to_string_lossy().into_owned(),
                case_name: metadata.case_name,
                created_at: metadata.created_at,
                iterations: metadata.iterations.len(),
            });
        }
        cases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cases)
    }

    /// Write a Markdown evolution report summarizing the run so far.
    pub fn write_evolution_report(
        &self,
        state: &RunState,
    ) -> DomainResult<PathBuf> {
        let case_dir = self.case_dir(&state.case_name)?;
        let metadata = Self::read_metadata(&case_dir)?;

        let mut report = String::new();
        report.push_str(&format!("# Evolution Report: {}\n\n", state.case_name));
        report.push_str(&format!(
            "- Generated: {}\n- Outer iterations: {}\n- Recorded iterations: {}\n\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            state.outer_iteration,
            metadata.iterations.len(),
        ));

        for (title, evolvable) in [("Visual Features", &state.visual), ("Data Capabilities", &state.data)] {
            let summary = evolvable.evolution_summary();
            report.push_str(&format!("## {title}\n\n"));
            report.push_str(&format!(
                "Version {} after {} mutations.\n\nActive:\n",
                summary.current_version, summary.total_improvements
            ));
            for (flag, value) in &summary.active_features {
                report.push_str(&format!("- `{flag}` = {}\n", serde_json::to_string(value)?));
            }
            report.push('\n');
        }

        if let Some(trends) = state.ledger.trends() {
            report.push_str("## Feedback Trends\n\n");
            report.push_str(&format!(
                "- Average score: {:.2}\n- Trend: {}\n- Most common category: {}\n- Records: {}\n\n",
                trends.average_score,
                trends.score_trend.as_str(),
                trends.most_common_category.as_str(),
                trends.total_feedback,
            ));
        }

        report.push_str("## Iterations\n\n");
        for it in &metadata.iterations {
            report.push_str(&format!(
                "- `{}` ({}) at {}{}\n",
                it.key,
                it.kind,
                it.recorded_at.format("%H:%M:%S"),
                if it.has_code { ", code saved" } else { "" },
            ));
        }

        let path = case_dir.join("report.md");
        fs::write(&path, report)?;
        Ok(path)
    }
}

#[async_trait]
impl ArtifactRecorder for FsArtifactRecorder {
    async fn create_case(&self, case_name: &str) -> DomainResult<()> {
        {
            let open = self.open_cases.lock().expect("recorder lock poisoned");
            if open.contains_key(case_name) {
                return Ok(());
            }
        }

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let dir = self.base_dir.join(format!("{case_name}_{stamp}"));
        for sub in ["code", "feedback", "states"] {
            fs::create_dir_all(dir.join(sub))?;
        }
        Self::write_metadata(
            &dir,
            &CaseMetadata {
                case_id: Uuid::new_v4(),
                case_name: case_name.to_string(),
                created_at: Utc::now(),
                iterations: Vec::new(),
            },
        )?;

        tracing::info!(case = case_name, dir = %dir.display(), "case directory created");
        self.open_cases
            .lock()
            .expect("recorder lock poisoned")
            .insert(case_name.to_string(), dir);
        Ok(())
    }

    async fn record(&self, case_name: &str, artifact: &IterationArtifact) -> DomainResult<()> {
        let case_dir = self.case_dir(case_name)?;
        let key = artifact.key();

        if let Some(code) = &artifact.code {
            fs::write(case_dir.join("code").join(format!("{key}.py")), code)?;
        }

        let feedback_doc = format!(
            "source: {}\nrecorded_at: {}\n\n{}",
            artifact.kind.as_str(),
            Utc::now().to_rfc3339(),
            artifact.feedback,
        );
        fs::write(
            case_dir.join("feedback").join(format!("{key}.txt")),
            feedback_doc,
        )?;

        let states = serde_json::json!({
            "visual": artifact.visual_snapshot,
            "data": artifact.data_snapshot,
        });
        fs::write(
            case_dir.join("states").join(format!("{key}.json")),
            serde_json::to_string_pretty(&states)?,
        )?;

        let mut metadata = Self::read_metadata(&case_dir)?;
        metadata.iterations.push(IterationMeta {
            key: key.clone(),
            kind: artifact.kind.as_str().to_string(),
            recorded_at: Utc::now(),
            has_code: artifact.code.is_some(),
            plot_path: artifact.plot_path.clone(),
        });
        Self::write_metadata(&case_dir, &metadata)?;

        tracing::debug!(case = case_name, key = %key, "iteration recorded");
        Ok(())
    }
}
