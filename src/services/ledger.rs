//! Bounded, append-only history of scored feedback.
//!
//! The ledger is the only writer of [`FeedbackRecord`]s. Insertion past
//! capacity silently evicts the oldest record (FIFO); eviction is never an
//! error. Trend statistics are computed over the current window only.

use std::collections::VecDeque;

use serde::Serialize;

use crate::domain::models::feedback::{FeedbackCategory, FeedbackRecord};

/// Default history capacity.
pub const DEFAULT_CAPACITY: usize = 250;

/// Direction of the score trend across the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTrend {
    Improving,
    Declining,
    Stable,
}

impl ScoreTrend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Declining => "declining",
            Self::Stable => "stable",
        }
    }
}

/// Trailing aggregates over the ledger window.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackTrends {
    pub average_score: f64,
    pub score_trend: ScoreTrend,
    pub most_common_category: FeedbackCategory,
    pub total_feedback: usize,
}

/// Per-category averages and a recent-versus-overall delta.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedTrends {
    /// Average score per category, in first-encounter order.
    pub category_averages: Vec<(FeedbackCategory, f64)>,
    /// Average of the last 5 records minus the overall average.
    pub recent_avg_vs_overall_delta: f64,
    pub history_length: usize,
}

/// Bounded FIFO of feedback records.
#[derive(Debug)]
pub struct FeedbackLedger {
    records: VecDeque<FeedbackRecord>,
    capacity: usize,
}

impl FeedbackLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity: capacity.max(1),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Append a record, evicting the oldest when over capacity.
    pub fn store(&mut self, record: FeedbackRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn records(&self) -> impl Iterator<Item = &FeedbackRecord> {
        self.records.iter()
    }

    /// Trend statistics over the current window. `None` when empty.
    ///
    /// The score trend compares the newest record to the oldest one still in
    /// the window (not a regression fit); ties and single records are
    /// `Stable`. Category ties break toward the first-encountered category.
    pub fn trends(&self) -> Option<FeedbackTrends> {
        let first = self.records.front()?;
        let last = self.records.back()?;

        let total = self.records.len();
        let average_score =
            self.records.iter().map(|r| r.score).sum::<f64>() / total as f64;

        let score_trend = if total > 1 && last.score > first.score {
            ScoreTrend::Improving
        } else if total > 1 && last.score < first.score {
            ScoreTrend::Declining
        } else {
            ScoreTrend::Stable
        };

        // Stable counting: first-encountered category wins ties.
        let mut counts: Vec<(FeedbackCategory, usize)> = Vec::new();
        for record in &self.records {
            match counts.iter_mut().find(|(c, _)| *c == record.category) {
                Some((_, n)) => *n += 1,
                None => counts.push((record.category, 1)),
            }
        }
        let most_common_category = counts
            .iter()
            .max_by_key(|(_, n)| *n)
            .map(|(c, _)| *c)
            .unwrap_or(FeedbackCategory::General);

        Some(FeedbackTrends {
            average_score,
            score_trend,
            most_common_category,
            total_feedback: total,
        })
    }

    /// Detailed trends: per-category averages and how the recent 5 records
    /// compare to the overall average. `None` when empty.
    pub fn detailed_trends(&self) -> Option<DetailedTrends> {
        if self.records.is_empty() {
            return None;
        }

        let mut per_category: Vec<(FeedbackCategory, Vec<f64>)> = Vec::new();
        for record in &self.records {
            match per_category.iter_mut().find(|(c, _)| *c == record.category) {
                Some((_, scores)) => scores.push(record.score),
                None => per_category.push((record.category, vec![record.score])),
            }
        }
        let category_averages = per_category
            .into_iter()
            .map(|(c, scores)| {
                let avg = scores.iter().sum::<f64>() / scores.len() as f64;
                (c, avg)
            })
            .collect();

        let total = self.records.len();
        let overall = self.records.iter().map(|r| r.score).sum::<f64>() / total as f64;
        let recent: Vec<f64> = self
            .records
            .iter()
            .rev()
            .take(5)
            .map(|r| r.score)
            .collect();
        let recent_avg = recent.iter().sum::<f64>() / recent.len() as f64;

        Some(DetailedTrends {
            category_averages,
            recent_avg_vs_overall_delta: recent_avg - overall,
            history_length: total,
        })
    }
}

impl Default for FeedbackLedger {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
