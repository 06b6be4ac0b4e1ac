//! Scripted collaborators for demos and offline runs.
//!
//! No LLM backend is required: the critic replays a fixed escalation that
//! ends in approval, and the generator deterministically renders plotting
//! code from the active feature flags. Useful for exercising the full loop
//! end to end and for seeding artifact directories with realistic content.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::evolution::FlagValue;
use crate::domain::ports::{
    ArtifactGenerator, CriticAgent, CriticContext, GenerationContext, GenerationResult,
};

/// Canned critic escalation: concrete demands first, approval last.
const SCRIPTED_REPLIES: &[&str] = &[
    "The chart is functional but needs improvement:\n\
     1. Add moving averages to smooth the trend\n\
     2. The peaks and lows should be marked\n\
     3. Consider a volume subplot below the price axis",
    "Better. The moving average helps, but the labels are still missing \
     and the color contrast is poor. Fix the legend placement.",
    "Excellent work! The chart is professional and clear, with good use of \
     annotations. APPROVED.",
];

/// Critic that replays [`SCRIPTED_REPLIES`] in order, repeating the final
/// approval once the script is spent.
#[derive(Default)]
pub struct ScriptedCritic {
    cursor: AtomicUsize,
}

impl ScriptedCritic {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CriticAgent for ScriptedCritic {
    async fn evaluate(&self, context: &CriticContext) -> DomainResult<String> {
        if !context.execution_success {
            return Ok(format!(
                "There is an execution error that must be fixed first:\n{}",
                context.last_error.as_deref().unwrap_or("unknown failure"),
            ));
        }

        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let reply = SCRIPTED_REPLIES
            .get(index)
            .or(SCRIPTED_REPLIES.last())
            .copied()
            .unwrap_or_default();
        tracing::debug!(turn = context.turn, index, "scripted critic replying");
        Ok(reply.to_string())
    }
}

/// Generator that renders deterministic plotting code from the active
/// feature flags. Always succeeds.
#[derive(Default)]
pub struct ScriptedGenerator;

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self
    }

    fn render_code(context: &GenerationContext) -> String {
        let mut code = String::new();
        let _ = writeln!(code, "# generated chart for {}", context.case_name);
        let _ = writeln!(code, "fig, ax = plt.subplots()");
        let _ = writeln!(code, "ax.plot(dates, prices)");
        for (flag, value) in &context.visual_features {
            match (flag.as_str(), value) {
                ("moving_avg", _) => {
                    let _ = writeln!(code, "ax.plot(dates, prices.rolling(20).mean())");
                }
                ("peaks", _) => {
                    let _ = writeln!(code, "ax.scatter(peak_dates, peak_prices, marker='^')");
                }
                ("annotate", _) => {
                    let _ = writeln!(code, "ax.annotate(labels)");
                }
                ("volume", _) => {
                    let _ = writeln!(code, "ax_vol.bar(dates, volume)");
                }
                ("style", FlagValue::Style(style)) => {
                    let _ = writeln!(code, "plt.style.use({style:?})");
                }
                _ => {}
            }
        }
        code
    }
}

#[async_trait]
impl ArtifactGenerator for ScriptedGenerator {
    async fn generate(&self, context: &GenerationContext) -> DomainResult<GenerationResult> {
        let code = Self::render_code(context);
        tracing::debug!(
            case = %context.case_name,
            attempt = context.attempt,
            features = context.visual_features.len(),
            "scripted generation"
        );
        Ok(GenerationResult {
            success: true,
            error: None,
            artifact_path: Some(format!("{}_chart.png", context.case_name).into()),
            code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn generation_context(features: &[&str]) -> GenerationContext {
        GenerationContext {
            case_name: "demo".to_string(),
            attempt: 1,
            max_attempts: 2,
            visual_features: features
                .iter()
                .map(|f| ((*f).to_string(), FlagValue::Bool(true)))
                .collect(),
            data_capabilities: BTreeMap::new(),
            feedback_context: None,
            user_feedback: None,
            previous_error: None,
        }
    }

    fn critic_context(execution_success: bool) -> CriticContext {
        CriticContext {
            case_name: "demo".to_string(),
            turn: 1,
            visual_version: 1,
            active_features: BTreeMap::new(),
            execution_success,
            regen_attempts_used: 1,
            artifact_present: true,
            last_error: (!execution_success).then(|| "boom".to_string()),
            user_feedback: None,
            previous_feedback: None,
            code: String::new(),
        }
    }

    #[tokio::test]
    async fn script_escalates_then_approves() {
        let critic = ScriptedCritic::new();
        let first = critic.evaluate(&critic_context(true)).await.unwrap();
        assert!(first.contains("needs improvement"));

        let _ = critic.evaluate(&critic_context(true)).await.unwrap();
        let third = critic.evaluate(&critic_context(true)).await.unwrap();
        assert!(third.contains("APPROVED"));

        // Script spent: keeps approving.
        let fourth = critic.evaluate(&critic_context(true)).await.unwrap();
        assert_eq!(fourth, third);
    }

    #[tokio::test]
    async fn execution_failure_preempts_script() {
        let critic = ScriptedCritic::new();
        let reply = critic.evaluate(&critic_context(false)).await.unwrap();
        assert!(reply.contains("execution error"));
        assert!(reply.contains("boom"));
    }

    #[tokio::test]
    async fn generated_code_tracks_features() {
        let generator = ScriptedGenerator::new();
        let bare = generator
            .generate(&generation_context(&[]))
            .await
            .unwrap();
        assert!(bare.success);
        assert!(!bare.code.contains("rolling"));

        let rich = generator
            .generate(&generation_context(&["moving_avg", "volume"]))
            .await
            .unwrap();
        assert!(rich.code.contains("rolling(20)"));
        assert!(rich.code.contains("ax_vol.bar"));
    }
}
