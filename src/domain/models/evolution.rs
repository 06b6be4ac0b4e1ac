//! Evolvable flag state driven by keyword-triggered rules.
//!
//! An [`EvolvableState`] is a versioned bag of boolean/enum flags. Feedback
//! text is matched against a declarative keyword rule table; every matching
//! rule sets its flag forward. Two instances exist per run: the visual
//! feature state (what the plot shows) and the data capability state (what
//! the feeding service computes).
//!
//! Invariants:
//!
//! - `version` starts at 1 and increments by exactly 1 per [`evolve`] call,
//!   even when no keyword matched. A no-op mutation timestamps "feedback was
//!   considered", not "feedback changed behavior".
//! - Flags are only ever set forward; no rule resets a flag to its default.
//! - [`snapshot`]/[`restore`] round-trip exactly on version, flags, and
//!   mutation log.
//!
//! [`evolve`]: EvolvableState::evolve
//! [`snapshot`]: EvolvableState::snapshot
//! [`restore`]: EvolvableState::restore

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::feedback::FeedbackSource;

/// Maximum feedback excerpt length kept in the mutation log.
const EXCERPT_CHARS: usize = 400;

// ---------------------------------------------------------------------------
// Flag values
// ---------------------------------------------------------------------------

/// Plot style selection, a three-way exclusive enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotStyle {
    Ggplot,
    Classic,
    Plain,
}

/// Value of a single flag: a boolean toggle or a style selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Style(PlotStyle),
}

impl FlagValue {
    /// Whether this flag counts as an active feature.
    ///
    /// `Plain` is the unstyled baseline and does not count.
    pub fn is_active(self) -> bool {
        match self {
            Self::Bool(b) => b,
            Self::Style(style) => style != PlotStyle::Plain,
        }
    }
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// What a matched keyword does.
#[derive(Debug, Clone, Copy)]
enum RuleAction {
    /// Set the named boolean flag to true.
    Set(&'static str),
    /// Branch on the style keywords into one of the [`PlotStyle`] variants.
    SelectStyle,
}

/// One keyword-to-flag rule. Matching is substring containment on the
/// lowercased feedback; multiple rules may fire in one `evolve` call.
#[derive(Debug, Clone, Copy)]
struct EvolutionRule {
    keyword: &'static str,
    action: RuleAction,
}

const fn set(keyword: &'static str, flag: &'static str) -> EvolutionRule {
    EvolutionRule {
        keyword,
        action: RuleAction::Set(flag),
    }
}

/// Rules for the visual feature state.
const VISUAL_RULES: &[EvolutionRule] = &[
    set("ma", "moving_avg"),
    set("moving average", "moving_avg"),
    set("peak", "peaks"),
    set("high", "peaks"),
    set("low", "peaks"),
    set("annot", "annotate"),
    set("label", "annotate"),
    set("volume", "volume"),
    EvolutionRule {
        keyword: "style",
        action: RuleAction::SelectStyle,
    },
];

/// Rules for the data capability state.
const DATA_RULES: &[EvolutionRule] = &[
    set("ma", "moving_avg"),
    set("moving average", "moving_avg"),
    set("rsi", "rsi"),
    set("relative strength", "rsi"),
    set("vol", "volatility"),
    set("volatility", "volatility"),
    set("risk", "volatility"),
    set("corr", "correlation"),
    set("correlation", "correlation"),
    set("volume", "volume"),
];

// ---------------------------------------------------------------------------
// Mutation log and snapshot
// ---------------------------------------------------------------------------

/// One entry in the append-only mutation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationEntry {
    /// Version this mutation produced.
    pub version: u32,
    /// Truncated feedback text that drove the mutation.
    pub feedback_excerpt: String,
    pub kind: FeedbackSource,
    pub timestamp: DateTime<Utc>,
}

/// Serializable snapshot of an evolvable state.
///
/// Round-trips through the artifact recorder: restoring a snapshot yields a
/// state equal in version, flags, and mutation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub name: String,
    pub version: u32,
    pub flags: BTreeMap<String, FlagValue>,
    pub mutation_log: Vec<MutationEntry>,
}

/// Reporting view of a state: `{current_version, total_improvements,
/// active_features}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionSummary {
    pub current_version: u32,
    pub total_improvements: usize,
    pub active_features: BTreeMap<String, FlagValue>,
}

// ---------------------------------------------------------------------------
// EvolvableState
// ---------------------------------------------------------------------------

/// A versioned flag bag mutated by keyword-triggered rules.
#[derive(Debug, Clone)]
pub struct EvolvableState {
    name: &'static str,
    version: u32,
    flags: BTreeMap<String, FlagValue>,
    mutation_log: Vec<MutationEntry>,
    rules: &'static [EvolutionRule],
}

impl EvolvableState {
    /// The visual feature state: style, grid, moving averages, peak markers,
    /// annotations, volume subplot.
    pub fn visual_features() -> Self {
        let mut flags = BTreeMap::new();
        flags.insert("style".to_string(), FlagValue::Style(PlotStyle::Ggplot));
        flags.insert("grid".to_string(), FlagValue::Bool(true));
        flags.insert("moving_avg".to_string(), FlagValue::Bool(false));
        flags.insert("peaks".to_string(), FlagValue::Bool(false));
        flags.insert("annotate".to_string(), FlagValue::Bool(false));
        flags.insert("volume".to_string(), FlagValue::Bool(false));
        Self {
            name: "visual_features",
            version: 1,
            flags,
            mutation_log: Vec::new(),
            rules: VISUAL_RULES,
        }
    }

    /// The data capability state: which derived series the feeding service
    /// computes alongside raw prices.
    pub fn data_capabilities() -> Self {
        let mut flags = BTreeMap::new();
        flags.insert("prices".to_string(), FlagValue::Bool(true));
        flags.insert("moving_avg".to_string(), FlagValue::Bool(false));
        flags.insert("rsi".to_string(), FlagValue::Bool(false));
        flags.insert("volatility".to_string(), FlagValue::Bool(false));
        flags.insert("correlation".to_string(), FlagValue::Bool(false));
        flags.insert("volume".to_string(), FlagValue::Bool(false));
        Self {
            name: "data_capabilities",
            version: 1,
            flags,
            mutation_log: Vec::new(),
            rules: DATA_RULES,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn flags(&self) -> &BTreeMap<String, FlagValue> {
        &self.flags
    }

    pub fn mutation_log(&self) -> &[MutationEntry] {
        &self.mutation_log
    }

    /// Apply feedback to the state. Always succeeds and always increments
    /// the version by exactly 1, whether or not any keyword matched.
    ///
    /// Returns the new version.
    pub fn evolve(&mut self, feedback: &str, kind: FeedbackSource) -> u32 {
        self.version += 1;
        let lower = feedback.to_lowercase();

        for rule in self.rules {
            if !lower.contains(rule.keyword) {
                continue;
            }
            match rule.action {
                RuleAction::Set(flag) => {
                    self.flags.insert(flag.to_string(), FlagValue::Bool(true));
                }
                RuleAction::SelectStyle => {
                    if lower.contains("classic") {
                        self.flags
                            .insert("style".to_string(), FlagValue::Style(PlotStyle::Classic));
                    } else if lower.contains("default") {
                        self.flags
                            .insert("style".to_string(), FlagValue::Style(PlotStyle::Plain));
                    }
                }
            }
        }

        self.mutation_log.push(MutationEntry {
            version: self.version,
            feedback_excerpt: feedback.chars().take(EXCERPT_CHARS).collect(),
            kind,
            timestamp: Utc::now(),
        });

        tracing::debug!(
            state = self.name,
            version = self.version,
            "state evolved"
        );
        self.version
    }

    /// Flags that count as active features, for generation context and
    /// reporting.
    pub fn active_features(&self) -> BTreeMap<String, FlagValue> {
        self.flags
            .iter()
            .filter(|(_, v)| v.is_active())
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    pub fn evolution_summary(&self) -> EvolutionSummary {
        EvolutionSummary {
            current_version: self.version,
            total_improvements: self.mutation_log.len(),
            active_features: self.active_features(),
        }
    }

    /// Capture a serializable snapshot of the current state.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            name: self.name.to_string(),
            version: self.version,
            flags: self.flags.clone(),
            mutation_log: self.mutation_log.clone(),
        }
    }

    /// Restore from a snapshot, the exact inverse of [`snapshot`](Self::snapshot).
    pub fn restore(&mut self, snapshot: StateSnapshot) {
        self.version = snapshot.version;
        self.flags = snapshot.flags;
        self.mutation_log = snapshot.mutation_log;
    }
}
