//! Structured secondary-evaluation parsing.
//!
//! A secondary evaluator may return criterion scores as JSON embedded in a
//! free-form reply. Parsing is best-effort: direct parse first, then an
//! attempt to isolate the outermost brace pair. Malformed input yields an
//! empty result flagged via `parse_ok`, informational to the caller and
//! never fatal.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static BRACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

/// Parsed criterion scores from a secondary evaluator reply.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StructuredEval {
    /// Numeric criteria only; non-numeric fields are dropped.
    pub scores: BTreeMap<String, f64>,
    /// False when no JSON object could be recovered from the reply.
    pub parse_ok: bool,
}

impl StructuredEval {
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Extract numeric criterion scores from a free-form evaluator reply.
pub fn parse_structured_scores(raw: &str) -> StructuredEval {
    if raw.trim().is_empty() {
        return StructuredEval::default();
    }

    let value = serde_json::from_str::<serde_json::Value>(raw).ok().or_else(|| {
        BRACE_RE
            .find(raw)
            .and_then(|m| serde_json::from_str(m.as_str()).ok())
    });

    let Some(serde_json::Value::Object(map)) = value else {
        tracing::debug!("secondary evaluator reply had no parseable JSON object");
        return StructuredEval::default();
    };

    let scores = map
        .into_iter()
        .filter_map(|(k, v)| v.as_f64().map(|f| (k, f)))
        .collect();

    StructuredEval {
        scores,
        parse_ok: true,
    }
}
