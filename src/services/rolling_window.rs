//! Rolling window of raw critic feedback.
//!
//! Holds the raw text of recent critic replies for reuse as generation
//! context, independent of the ledger's structured records. Same FIFO
//! eviction as the ledger, fixed capacity of 20.

use std::collections::VecDeque;

/// Hard cap on retained feedback texts.
pub const WINDOW_CAPACITY: usize = 20;

/// Bounded FIFO buffer of raw feedback strings.
#[derive(Debug, Default)]
pub struct RollingFeedbackWindow {
    items: VecDeque<String>,
}

impl RollingFeedbackWindow {
    pub fn new() -> Self {
        Self {
            items: VecDeque::with_capacity(WINDOW_CAPACITY),
        }
    }

    /// Append a feedback text, evicting the oldest at capacity.
    pub fn push(&mut self, feedback: impl Into<String>) {
        if self.items.len() == WINDOW_CAPACITY {
            self.items.pop_front();
        }
        self.items.push_back(feedback.into());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The last `depth` entries, oldest first (most recent last), for
    /// readable context assembly.
    pub fn recent(&self, depth: usize) -> Vec<&str> {
        let skip = self.items.len().saturating_sub(depth);
        self.items.iter().skip(skip).map(String::as_str).collect()
    }
}
