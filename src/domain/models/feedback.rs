//! Feedback records and derived improvement items.
//!
//! A [`FeedbackRecord`] is the immutable, scored form of one piece of
//! free-form critique. Records are created by the scorer and owned
//! exclusively by the feedback ledger; nothing mutates them afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a piece of feedback came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSource {
    /// Automated critic inside the inner loop.
    Critic,
    /// Human feedback at an outer-loop checkpoint.
    User,
    /// Critic pass run on freshly applied user feedback.
    CriticPostUser,
    Unknown,
}

impl FeedbackSource {
    /// Stable string form, used in artifact keys (`v{NNN}_{kind}`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critic => "critic",
            Self::User => "user",
            Self::CriticPostUser => "critic_post_user",
            Self::Unknown => "unknown",
        }
    }
}

/// Classification of a feedback text, mutually exclusive per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    Approval,
    Error,
    Enhancement,
    Modification,
    General,
}

impl FeedbackCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approval => "approval",
            Self::Error => "error",
            Self::Enhancement => "enhancement",
            Self::Modification => "modification",
            Self::General => "general",
        }
    }
}

/// Priority of an extracted improvement, derived from emphasis tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Discrete priority tag attached to user-originated feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserPriority {
    NiceToHave,
    Important,
    Critical,
}

impl UserPriority {
    /// Label used when composing the feedback text (`[Priority: …]`).
    pub fn label(self) -> &'static str {
        match self {
            Self::NiceToHave => "Nice to have",
            Self::Important => "Important",
            Self::Critical => "Critical",
        }
    }
}

/// One structured improvement mined from feedback text.
///
/// Category-table hits carry `detected_keywords` and no suggestion text;
/// free-text suggestion hits carry the suggestion under the `specific`
/// category. Lifetime is tied to the owning [`FeedbackRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImprovementItem {
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detected_keywords: Vec<String>,
    pub priority: Priority,
}

impl ImprovementItem {
    /// The text this item is deduplicated and bucketed by: the explicit
    /// suggestion when present, otherwise a synthesized `Improve {category}`.
    pub fn plan_key(&self) -> String {
        self.suggestion
            .clone()
            .unwrap_or_else(|| format!("Improve {}", self.category))
    }
}

/// A scored, immutable feedback record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub text: String,
    pub source: FeedbackSource,
    /// Outer iteration (user sources) or inner turn (critic sources).
    pub iteration: u32,
    /// Quality score in `[0, 1]`.
    pub score: f64,
    /// Scorer confidence in `[0, 1]`.
    pub confidence: f64,
    pub category: FeedbackCategory,
    pub improvements: Vec<ImprovementItem>,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_strings_match_artifact_keys() {
        assert_eq!(FeedbackSource::Critic.as_str(), "critic");
        assert_eq!(FeedbackSource::CriticPostUser.as_str(), "critic_post_user");
    }

    #[test]
    fn plan_key_falls_back_to_category() {
        let item = ImprovementItem {
            category: "volume".to_string(),
            suggestion: None,
            detected_keywords: vec!["volume".to_string()],
            priority: Priority::Low,
        };
        assert_eq!(item.plan_key(), "Improve volume");
    }
}
