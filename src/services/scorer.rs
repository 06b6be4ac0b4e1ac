//! Lexicon-based feedback scoring.
//!
//! Turns free-form critique into a bounded quality score, an approval
//! signal, a category, extracted improvement items, and a confidence
//! estimate. Everything here is a pure function over the input text plus
//! the static lexicons below; determinism and auditability are the design
//! goals, not linguistic sophistication.
//!
//! Scoring pipeline, in order:
//!
//! 1. **Sentiment** -- weighted substring hits from two fixed lexicons,
//!    raw range roughly `[-10, +10]`, rescaled to `[0, 1]`.
//! 2. **Action penalty** -- distinct call-to-action terms subtract up to
//!    0.25. Text asking for more work should not score like pure praise.
//! 3. **Approval adjustment** -- floors/caps driven by explicit approval or
//!    rejection language. This override layer must run last.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

use crate::domain::models::feedback::{
    FeedbackCategory, FeedbackRecord, FeedbackSource, ImprovementItem, Priority,
};

// ---------------------------------------------------------------------------
// Lexicons
// ---------------------------------------------------------------------------

const APPROVAL_TERMS: &[&str] = &[
    "approved",
    "excellent",
    "perfect",
    "great job",
    "well done",
    "looks good",
];

const POSITIVE_TERMS: &[(&str, i32)] = &[
    ("excellent", 3),
    ("perfect", 3),
    ("great", 2),
    ("professional", 2),
    ("good", 1),
    ("clear", 1),
    ("accurate", 1),
    ("well", 1),
];

const NEGATIVE_TERMS: &[(&str, i32)] = &[
    ("error", 3),
    ("wrong", 3),
    ("missing", 2),
    ("bad", 2),
    ("poor", 2),
    ("unclear", 2),
    ("confusing", 2),
    ("fix", 1),
    ("improve", 1),
    ("needs", 1),
    ("add", 1),
    ("should", 1),
];

const ACTION_TERMS: &[&str] = &[
    "improve", "needs", "should", "add", "consider", "enhance", "fix",
];

const REJECTION_PHRASES: &[&str] = &["not approved", "rejected", "needs work"];

const ERROR_TERMS: &[&str] = &["error", "bug", "crash", "fail"];
const ENHANCEMENT_TERMS: &[&str] = &["improve", "enhance", "add", "include"];
const MODIFICATION_TERMS: &[&str] = &["change", "modify", "adjust", "update"];

const HIGH_PRIORITY_TOKENS: &[&str] = &["must", "required", "critical"];
const MEDIUM_PRIORITY_TOKENS: &[&str] = &["should", "important", "need"];

/// Fixed improvement-category keyword table. One [`ImprovementItem`] is
/// emitted per category with at least one hit.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("style", &["professional", "clean", "modern", "style", "appearance"]),
    ("colors", &["color", "contrast", "palette", "scheme", "visibility"]),
    ("annotations", &["label", "annotation", "mark", "highlight", "text"]),
    ("indicators", &["moving average", "ma", "technical", "indicator"]),
    ("volume", &["volume", "trading volume", "bar chart"]),
    ("trends", &["trend", "trendline", "direction", "pattern"]),
    ("peaks", &["peak", "valley", "high", "low", "maximum", "minimum"]),
    ("comparison", &["benchmark", "compare", "s&p", "index", "relative"]),
    ("risk", &["risk", "volatility", "standard deviation", "variance"]),
    ("layout", &["layout", "spacing", "size", "arrangement", "subplot"]),
];

// ---------------------------------------------------------------------------
// Suggestion-mining patterns
// ---------------------------------------------------------------------------

static NUMBERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d+\.\s+(.+)$").expect("valid regex"));

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[-*\u{2022}]\s+(.+)$").expect("valid regex"));

static MULTI_STEP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:first|second|third|fourth|lastly|finally|next)\b[:,]?\s+")
        .expect("valid regex")
});

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+\b").expect("valid regex"));

static NORM_STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s%\-:,.]").expect("valid regex"));

static NORM_WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

// ---------------------------------------------------------------------------
// Approval and categorization
// ---------------------------------------------------------------------------

/// Whether the text contains explicit approval language.
///
/// Case-insensitive substring match; negation is handled only by the later
/// adjustment layer in [`score_quality`].
pub fn is_approved(text: &str) -> bool {
    let lower = text.to_lowercase();
    APPROVAL_TERMS.iter().any(|t| lower.contains(t))
}

/// Categorize the feedback. First matching category wins:
/// approval > error > enhancement > modification > general.
pub fn categorize(text: &str) -> FeedbackCategory {
    let lower = text.to_lowercase();
    if APPROVAL_TERMS.iter().any(|t| lower.contains(t)) {
        FeedbackCategory::Approval
    } else if ERROR_TERMS.iter().any(|t| lower.contains(t)) {
        FeedbackCategory::Error
    } else if ENHANCEMENT_TERMS.iter().any(|t| lower.contains(t)) {
        FeedbackCategory::Enhancement
    } else if MODIFICATION_TERMS.iter().any(|t| lower.contains(t)) {
        FeedbackCategory::Modification
    } else {
        FeedbackCategory::General
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Sentiment score in `[0, 1]` plus the number of lexicon entries matched.
fn score_sentiment(lower: &str) -> (f64, usize) {
    let mut raw = 0i32;
    let mut matched = 0usize;
    for (term, weight) in POSITIVE_TERMS {
        if lower.contains(term) {
            raw += weight;
            matched += 1;
        }
    }
    for (term, weight) in NEGATIVE_TERMS {
        if lower.contains(term) {
            raw -= weight;
            matched += 1;
        }
    }
    // Raw range is approximately [-10, +10].
    let norm = (f64::from(raw) + 10.0) / 20.0;
    (norm.clamp(0.0, 1.0), matched)
}

/// Penalty for call-to-action language: `min(0.25, 0.05 * hits)`.
fn action_penalty(lower: &str) -> f64 {
    let hits = ACTION_TERMS.iter().filter(|t| lower.contains(*t)).count();
    if hits == 0 {
        0.0
    } else {
        (0.05 * hits as f64).min(0.25)
    }
}

/// The override layer: approval floors the score at 0.7, explicit rejection
/// caps it at 0.4. Applied after all lexicon arithmetic.
fn apply_approval_adjustments(base: f64, lower: &str) -> f64 {
    let mut score = base;
    if lower.contains("approved") && !lower.contains("not") {
        score = score.max(0.7);
    }
    if REJECTION_PHRASES.iter().any(|p| lower.contains(p)) {
        score = score.min(0.4);
    }
    score
}

/// Composite quality score in `[0, 1]`: sentiment minus action penalty,
/// then the approval adjustment layer, then a final clamp.
pub fn score_quality(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let (sentiment, _) = score_sentiment(&lower);
    let score = sentiment - action_penalty(&lower);
    apply_approval_adjustments(score, &lower).clamp(0.0, 1.0)
}

/// Scorer confidence in `[0.1, 1]`: the fraction of tokens that matched a
/// sentiment lexicon entry, nudged upward when the sentiment sits far from
/// the neutral midpoint. Empty text yields 0.3.
pub fn confidence(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let tokens = TOKEN_RE.find_iter(&lower).count();
    if tokens == 0 {
        return 0.3;
    }
    let (sentiment, matched) = score_sentiment(&lower);
    let decisiveness = (sentiment - 0.5).abs();
    (matched as f64 / tokens as f64 + 0.1 * decisiveness).clamp(0.1, 1.0)
}

// ---------------------------------------------------------------------------
// Improvement extraction
// ---------------------------------------------------------------------------

/// Normalize a suggestion for deduplication: lowercase, punctuation
/// stripped, whitespace collapsed.
pub fn normalize_suggestion(text: &str) -> String {
    let lower = text.to_lowercase();
    let stripped = NORM_STRIP_RE.replace_all(&lower, "");
    NORM_WS_RE.replace_all(&stripped, " ").trim().to_string()
}

/// Priority from emphasis tokens anywhere in the text.
fn calculate_priority(lower: &str) -> Priority {
    if HIGH_PRIORITY_TOKENS.iter().any(|t| lower.contains(t)) {
        Priority::High
    } else if MEDIUM_PRIORITY_TOKENS.iter().any(|t| lower.contains(t)) {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Category-table detection: one item per category with at least one hit.
fn detect_categories(lower: &str) -> Vec<ImprovementItem> {
    let priority = calculate_priority(lower);
    CATEGORY_KEYWORDS
        .iter()
        .filter_map(|(category, keywords)| {
            let hits: Vec<String> = keywords
                .iter()
                .filter(|kw| lower.contains(*kw))
                .map(|kw| (*kw).to_string())
                .collect();
            if hits.is_empty() {
                None
            } else {
                Some(ImprovementItem {
                    category: (*category).to_string(),
                    suggestion: None,
                    detected_keywords: hits,
                    priority,
                })
            }
        })
        .collect()
}

/// Mine explicit suggestion text: numbered list items, bullet lines,
/// sequencing connectives, and semicolon-delimited clauses of more than
/// two words.
fn extract_list_items(text: &str) -> Vec<String> {
    let mut items = Vec::new();

    for cap in NUMBERED_RE.captures_iter(text) {
        items.push(cap[1].trim().to_string());
    }
    for cap in BULLET_RE.captures_iter(text) {
        items.push(cap[1].trim().to_string());
    }

    // Sequencing connectives: each segment runs from the end of one
    // connective to the start of the next (or end of text).
    let marks: Vec<_> = MULTI_STEP_RE.find_iter(text).collect();
    for (i, mark) in marks.iter().enumerate() {
        let end = marks.get(i + 1).map_or(text.len(), |next| next.start());
        let segment = text[mark.end()..end].trim();
        if !segment.is_empty() {
            items.push(segment.to_string());
        }
    }

    // Dense inline lists: semicolon-delimited clauses longer than two words.
    for line in text.lines() {
        if !line.contains(';') {
            continue;
        }
        for clause in line.split(';') {
            let clause = clause.trim();
            if clause.split_whitespace().count() > 2 {
                items.push(clause.to_string());
            }
        }
    }

    items
}

/// Extract structured improvements: category-table hits plus mined
/// suggestions, deduplicated by normalized form across all methods
/// combined. First occurrence wins.
pub fn extract_improvements(text: &str) -> Vec<ImprovementItem> {
    let clean = text.trim();
    let lower = clean.to_lowercase();

    let mut seen = std::collections::HashSet::new();
    let mut improvements = Vec::new();

    for item in detect_categories(&lower) {
        let norm = normalize_suggestion(&item.plan_key());
        if !norm.is_empty() && seen.insert(norm) {
            improvements.push(item);
        }
    }

    for suggestion in extract_list_items(clean) {
        let norm = normalize_suggestion(&suggestion);
        if !norm.is_empty() && seen.insert(norm) {
            improvements.push(ImprovementItem {
                category: "specific".to_string(),
                suggestion: Some(suggestion),
                detected_keywords: Vec::new(),
                priority: Priority::Medium,
            });
        }
    }

    improvements
}

// ---------------------------------------------------------------------------
// Record construction
// ---------------------------------------------------------------------------

/// Score a feedback text into an immutable [`FeedbackRecord`].
pub fn analyze(text: &str, source: FeedbackSource, iteration: u32) -> FeedbackRecord {
    FeedbackRecord {
        text: text.to_string(),
        source,
        iteration,
        score: score_quality(text),
        confidence: confidence(text),
        category: categorize(text),
        improvements: extract_improvements(text),
        recorded_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Improvement plan aggregation
// ---------------------------------------------------------------------------

/// Improvements aggregated across several feedback texts, bucketed by
/// priority.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ImprovementPlan {
    pub high_priority: Vec<String>,
    pub medium_priority: Vec<String>,
    pub low_priority: Vec<String>,
}

impl ImprovementPlan {
    pub fn is_empty(&self) -> bool {
        self.high_priority.is_empty()
            && self.medium_priority.is_empty()
            && self.low_priority.is_empty()
    }
}

/// Aggregate improvements from a list of feedback texts into priority
/// buckets. Duplicates (by normalized form) collapse within a bucket; the
/// last occurrence's original casing wins.
pub fn improvement_plan<S: AsRef<str>>(feedback_texts: &[S]) -> ImprovementPlan {
    // Insertion-ordered norm -> display pairs per bucket.
    let mut buckets: [Vec<(String, String)>; 3] = [Vec::new(), Vec::new(), Vec::new()];

    for text in feedback_texts {
        for item in extract_improvements(text.as_ref()) {
            let key = item.plan_key();
            let norm = normalize_suggestion(&key);
            let bucket = &mut buckets[match item.priority {
                Priority::High => 0,
                Priority::Medium => 1,
                Priority::Low => 2,
            }];
            if let Some(entry) = bucket.iter_mut().find(|(n, _)| *n == norm) {
                entry.1 = key;
            } else {
                bucket.push((norm, key));
            }
        }
    }

    let [high, medium, low] = buckets;
    ImprovementPlan {
        high_priority: high.into_iter().map(|(_, v)| v).collect(),
        medium_priority: medium.into_iter().map(|(_, v)| v).collect(),
        low_priority: low.into_iter().map(|(_, v)| v).collect(),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_terms_detected_case_insensitively() {
        assert!(is_approved("APPROVED, ship it"));
        assert!(is_approved("Great job on the layout"));
        assert!(is_approved("looks good to me"));
        assert!(!is_approved("needs more work on the legend"));
    }

    #[test]
    fn approval_floors_score() {
        // Contains "approved" and no "not": floor at 0.7 regardless of the
        // action-term penalty from "add".
        let score = score_quality("Approved, but consider adding volume later.");
        assert!(score >= 0.7, "score was {score}");
    }

    #[test]
    fn rejection_caps_score() {
        for text in ["This is rejected.", "Honestly it needs work, colors are great"] {
            let score = score_quality(text);
            assert!(score <= 0.4, "{text:?} scored {score}");
        }
    }

    #[test]
    fn action_terms_penalize_mixed_praise() {
        let pure = score_quality("Excellent and professional.");
        let asking = score_quality("Excellent and professional, but you should improve the legend and fix the grid.");
        assert!(asking < pure);
    }

    #[test]
    fn neutral_text_scores_near_midpoint() {
        // No lexicon hits at all: raw 0 maps to 0.5.
        let score = score_quality("the quarterly numbers are on the chart");
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn score_is_always_bounded() {
        for text in [
            "",
            "error error wrong missing bad poor unclear confusing fix improve needs add should",
            "excellent perfect great professional good clear accurate well",
            "not approved, rejected, needs work",
        ] {
            let score = score_quality(text);
            assert!((0.0..=1.0).contains(&score), "{text:?} scored {score}");
        }
    }

    #[test]
    fn categorize_priority_order() {
        assert_eq!(categorize("APPROVED"), FeedbackCategory::Approval);
        // "error" outranks "improve" even when both appear.
        assert_eq!(
            categorize("there is an error, please improve"),
            FeedbackCategory::Error
        );
        assert_eq!(categorize("please enhance the colors"), FeedbackCategory::Enhancement);
        assert_eq!(categorize("adjust the axis range"), FeedbackCategory::Modification);
        assert_eq!(categorize("interesting"), FeedbackCategory::General);
    }

    #[test]
    fn confidence_bounds_and_empty_text() {
        assert!((confidence("") - 0.3).abs() < 1e-9);
        for text in ["excellent", "random words with no lexicon hits whatsoever"] {
            let c = confidence(text);
            assert!((0.1..=1.0).contains(&c), "{text:?} -> {c}");
        }
    }

    #[test]
    fn category_detection_with_priority() {
        let items = extract_improvements(
            "Missing volume data, please add a volume subplot. This is critical.",
        );
        let volume = items
            .iter()
            .find(|i| i.category == "volume")
            .expect("volume item");
        assert_eq!(volume.priority, Priority::High);
        assert!(volume.detected_keywords.contains(&"volume".to_string()));
        // "subplot" also trips the layout category.
        assert!(items.iter().any(|i| i.category == "layout"));
    }

    #[test]
    fn numbered_and_bullet_items_extracted() {
        let items = extract_improvements(
            "Needs changes:\n1. Move the legend outside\n2. Thicker lines\n- darker grid\n",
        );
        let specifics: Vec<_> = items
            .iter()
            .filter(|i| i.category == "specific")
            .map(|i| i.suggestion.as_deref().unwrap())
            .collect();
        assert!(specifics.contains(&"Move the legend outside"));
        assert!(specifics.contains(&"Thicker lines"));
        assert!(specifics.contains(&"darker grid"));
        for item in items.iter().filter(|i| i.category == "specific") {
            assert_eq!(item.priority, Priority::Medium);
        }
    }

    #[test]
    fn sequencing_connectives_extracted() {
        let items = extract_improvements(
            "First, normalize the axes. Second, shade the drawdown region.",
        );
        let specifics: Vec<_> = items
            .iter()
            .filter(|i| i.category == "specific")
            .map(|i| i.suggestion.as_deref().unwrap())
            .collect();
        assert_eq!(specifics.len(), 2);
        assert!(specifics[0].starts_with("normalize the axes"));
        assert!(specifics[1].starts_with("shade the drawdown region"));
    }

    #[test]
    fn semicolon_clauses_over_two_words_extracted() {
        let items =
            extract_improvements("Use darker gridlines please; too small; widen the left margin a bit");
        let specifics: Vec<_> = items
            .iter()
            .filter(|i| i.category == "specific")
            .map(|i| i.suggestion.as_deref().unwrap())
            .collect();
        assert!(specifics.contains(&"Use darker gridlines please"));
        assert!(specifics.contains(&"widen the left margin a bit"));
        // "too small" has only two words.
        assert!(!specifics.contains(&"too small"));
    }

    #[test]
    fn extraction_is_deterministic() {
        let text = "1. Add a benchmark line\n2. Add a benchmark line\nFirst, label the peaks.";
        assert_eq!(extract_improvements(text), extract_improvements(text));
    }

    #[test]
    fn duplicates_collapse_across_methods() {
        // Same suggestion as a numbered item and a bullet; normalization
        // makes them identical.
        let items = extract_improvements("1. Widen the margins!\n- widen the margins\n");
        let specifics: Vec<_> = items.iter().filter(|i| i.category == "specific").collect();
        assert_eq!(specifics.len(), 1);
        assert_eq!(
            specifics[0].suggestion.as_deref(),
            Some("Widen the margins!")
        );
    }

    #[test]
    fn approval_scenario_end_to_end() {
        let text = "APPROVED. Great job, very clear.";
        assert!(is_approved(text));
        assert!(score_quality(text) >= 0.7);
        assert_eq!(categorize(text), FeedbackCategory::Approval);
    }

    #[test]
    fn analyze_builds_consistent_record() {
        let record = analyze("Add moving averages, should help", FeedbackSource::Critic, 2);
        assert_eq!(record.source, FeedbackSource::Critic);
        assert_eq!(record.iteration, 2);
        assert!((0.0..=1.0).contains(&record.score));
        assert!((0.1..=1.0).contains(&record.confidence));
        assert_eq!(record.category, FeedbackCategory::Enhancement);
        assert!(record.improvements.iter().any(|i| i.category == "indicators"));
    }

    #[test]
    fn improvement_plan_buckets_and_dedupes() {
        let plan = improvement_plan(&[
            "You must add a volume subplot",
            "add a VOLUME subplot is required",
            "1. tidy up the legend spacing\n",
        ]);
        // Category items from both texts normalize to the same key.
        assert!(plan.high_priority.iter().any(|s| s == "Improve volume"));
        assert_eq!(
            plan.high_priority
                .iter()
                .filter(|s| s.as_str() == "Improve volume")
                .count(),
            1
        );
        assert!(plan
            .medium_priority
            .iter()
            .any(|s| s == "tidy up the legend spacing"));
    }
}
