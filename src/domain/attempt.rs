//! Attempt records for stage executions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One execution try of a stage under its retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-indexed attempt number
    pub number: u32,

    /// When the attempt started
    pub started_at: DateTime<Utc>,

    /// When the attempt finished
    pub finished_at: DateTime<Utc>,

    /// Combined stdout/stderr (or error text) from the unit of work
    pub diagnostic: String,

    /// How the attempt ended
    pub outcome: AttemptOutcome,
}

impl Attempt {
    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }

    /// Wall-clock duration of the attempt in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Outcome of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The unit of work reported success
    Success,

    /// The unit of work failed; the retry policy decides what happens next
    RetryableFailure,
}
