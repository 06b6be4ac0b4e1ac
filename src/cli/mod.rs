//! Command-line interface.
//!
//! Four commands: `run` drives a full convergence loop with the scripted
//! collaborators, `score` evaluates a single feedback text, `cases` lists
//! recorded case directories, and `config` shows the effective
//! configuration. Every command honors the global `--json` flag.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};

use crate::domain::models::feedback::{FeedbackSource, UserPriority};
use crate::domain::models::run_state::{RunPhase, RunState};
use crate::infrastructure::{FsArtifactRecorder, ScriptedCritic, ScriptedGenerator};
use crate::services::config::Config;
use crate::services::convergence_controller::ConvergenceController;
use crate::services::scorer;

#[derive(Parser)]
#[command(name = "chartwright")]
#[command(about = "Feedback-scored evolution engine for generated charts", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Path to a configuration file (defaults to chartwright.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a full convergence loop with the scripted collaborators
    Run {
        /// Case name the run is recorded under
        case: String,

        /// User feedback applied after the first iteration
        #[arg(short, long)]
        user_feedback: Option<String>,

        /// Priority of the user feedback
        #[arg(short, long, default_value = "important")]
        priority: String,
    },

    /// Score a single feedback text and show the analysis
    Score {
        /// Feedback text to analyze
        text: String,
    },

    /// List recorded case directories
    Cases,

    /// Show the effective configuration
    Config {
        /// Print a sample configuration file instead
        #[arg(long)]
        sample: bool,
    },
}

pub fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {path}")),
        None => Config::load().context("failed to load configuration"),
    }
}

fn parse_priority(raw: &str) -> Result<UserPriority> {
    match raw.to_lowercase().as_str() {
        "nice-to-have" | "nice_to_have" | "low" => Ok(UserPriority::NiceToHave),
        "important" | "medium" => Ok(UserPriority::Important),
        "critical" | "high" => Ok(UserPriority::Critical),
        other => anyhow::bail!("unknown priority {other:?}, expected nice-to-have, important, or critical"),
    }
}

/// Borderless list table, the house style for CLI output.
fn list_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h.to_uppercase()).set_alignment(CellAlignment::Left)),
        );
    table
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub async fn handle_run(
    config: &Config,
    case: String,
    user_feedback: Option<String>,
    priority: String,
    json: bool,
) -> Result<()> {
    let priority = parse_priority(&priority)?;
    let recorder = Arc::new(FsArtifactRecorder::new(config.artifacts.base_dir.clone()));
    let controller = ConvergenceController::new(
        Arc::new(ScriptedGenerator::new()),
        Arc::new(ScriptedCritic::new()),
        Arc::clone(&recorder),
        config.iteration.clone(),
    );

    let mut state = RunState::new(case, config.ledger.capacity);
    let mut reports = Vec::new();

    let report = controller
        .run_iteration(&mut state)
        .await
        .context("first iteration failed")?;
    reports.push(report);

    if let Some(feedback) = user_feedback {
        let outcome = controller
            .apply_user_feedback(&mut state, &feedback, priority, false)
            .await
            .context("failed to apply user feedback")?;
        if outcome.phase == RunPhase::Running {
            let report = controller
                .run_iteration(&mut state)
                .await
                .context("follow-up iteration failed")?;
            reports.push(report);
        }
    }
    if state.phase == RunPhase::AwaitingUserFeedback {
        controller
            .apply_user_feedback(&mut state, "", UserPriority::NiceToHave, true)
            .await
            .context("failed to close the run")?;
    }

    let report_path = recorder
        .write_evolution_report(&state)
        .context("failed to write evolution report")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    println!("Run complete: {}", state.case_name);
    let mut table = list_table(&["iter", "turn", "score", "approved", "accepted", "category"]);
    for report in &reports {
        for turn in &report.turns {
            table.add_row(vec![
                report.outer_iteration.to_string(),
                turn.turn.to_string(),
                format!("{:.2}", turn.quality_score),
                turn.approved.to_string(),
                turn.accepted.to_string(),
                turn.category.as_str().to_string(),
            ]);
        }
    }
    println!("{table}");
    println!(
        "\nVisual v{}, data v{}, {} feedback records",
        state.visual.version(),
        state.data.version(),
        state.ledger.len(),
    );
    println!("Report: {}", report_path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// score
// ---------------------------------------------------------------------------

pub fn handle_score(text: &str, json: bool) -> Result<()> {
    let record = scorer::analyze(text, FeedbackSource::User, 0);

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("Score:      {:.2}", record.score);
    println!("Approved:   {}", scorer::is_approved(text));
    println!("Category:   {}", record.category.as_str());
    println!("Confidence: {:.2}", record.confidence);

    if record.improvements.is_empty() {
        println!("No improvement items detected.");
    } else {
        let mut table = list_table(&["category", "priority", "suggestion"]);
        for item in &record.improvements {
            table.add_row(vec![
                item.category.clone(),
                item.priority.as_str().to_string(),
                item.plan_key(),
            ]);
        }
        println!("\n{table}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// cases
// ---------------------------------------------------------------------------

pub fn handle_cases(config: &Config, json: bool) -> Result<()> {
    let recorder = FsArtifactRecorder::new(config.artifacts.base_dir.clone());
    let cases = recorder.list_cases().context("failed to list cases")?;

    if json {
        let rows: Vec<_> = cases
            .iter()
            .map(|c| {
                serde_json::json!({
                    "directory": c.directory,
                    "case_name": c.case_name,
                    "created_at": c.created_at,
                    "iterations": c.iterations,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if cases.is_empty() {
        println!("No cases found under {}.", config.artifacts.base_dir);
        return Ok(());
    }

    let mut table = list_table(&["case", "directory", "created", "iterations"]);
    for case in &cases {
        table.add_row(vec![
            case.case_name.clone(),
            case.directory.clone(),
            case.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            case.iterations.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

pub fn handle_config(config: &Config, sample: bool, json: bool) -> Result<()> {
    if sample {
        println!("{}", Config::sample_toml());
        return Ok(());
    }
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        println!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_aliases_parse() {
        assert_eq!(parse_priority("critical").unwrap(), UserPriority::Critical);
        assert_eq!(parse_priority("HIGH").unwrap(), UserPriority::Critical);
        assert_eq!(parse_priority("nice-to-have").unwrap(), UserPriority::NiceToHave);
        assert!(parse_priority("urgent").is_err());
    }

    #[test]
    fn cli_parses_run_command() {
        let cli = Cli::parse_from(["chartwright", "run", "aapl", "--user-feedback", "add volume"]);
        match cli.command {
            Commands::Run { case, user_feedback, priority } => {
                assert_eq!(case, "aapl");
                assert_eq!(user_feedback.as_deref(), Some("add volume"));
                assert_eq!(priority, "important");
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn cli_global_json_flag() {
        let cli = Cli::parse_from(["chartwright", "--json", "cases"]);
        assert!(cli.json);
    }
}
