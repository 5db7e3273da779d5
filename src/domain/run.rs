//! Run state and the aggregate outcome of one pipeline execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attempt::Attempt;

/// State machine for a pipeline run.
///
/// `Pending -> Running(i) -> Running(i+1) | Failed(i) -> ... -> Succeeded`.
/// `Failed` and `Succeeded` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunState {
    /// Before any stage has started
    Pending,

    /// Executing the stage at this ordinal position
    Running { stage_index: usize },

    /// Every stage completed and its outputs validated
    Succeeded,

    /// A stage failed fatally; no later stage was executed
    Failed {
        stage: String,
        exit_code: i32,
        error: String,
    },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }
}

/// Terminal status of one stage within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Executed and all attempts plus output validation passed
    Succeeded,

    /// Exhausted its retry policy or violated its artifact contract
    Failed,

    /// Never reached because an earlier stage failed
    Skipped,
}

/// Attempt history and terminal status for one stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage name
    pub stage: String,

    /// Ordinal position within the pipeline (0-indexed)
    pub ordinal: usize,

    /// Every attempt made, including retries; empty when skipped
    pub attempts: Vec<Attempt>,

    /// How the stage ended
    pub status: StageStatus,
}

impl StageReport {
    /// A report for a stage that never ran
    pub fn skipped(stage: impl Into<String>, ordinal: usize) -> Self {
        Self {
            stage: stage.into(),
            ordinal,
            attempts: Vec::new(),
            status: StageStatus::Skipped,
        }
    }

    /// Diagnostic text of the last attempt, if any
    pub fn last_diagnostic(&self) -> Option<&str> {
        self.attempts.last().map(|a| a.diagnostic.as_str())
    }
}

/// Aggregate outcome of one pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique identifier for this run
    pub id: Uuid,

    /// Name of the pipeline that was executed
    pub pipeline_name: String,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run reached a terminal state
    pub finished_at: DateTime<Utc>,

    /// Terminal state; always `Succeeded` or `Failed`
    pub state: RunState,

    /// Per-stage attempt history, one report per stage in pipeline order
    pub reports: Vec<StageReport>,

    /// Names of artifacts that were produced and validated
    pub artifacts: Vec<String>,
}

impl RunResult {
    /// Process exit status for this run: 0 on success, the failing stage's
    /// reserved code otherwise.
    pub fn exit_code(&self) -> i32 {
        match &self.state {
            RunState::Failed { exit_code, .. } => *exit_code,
            _ => 0,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == RunState::Succeeded
    }

    /// Report for a stage by name
    pub fn report(&self, stage: &str) -> Option<&StageReport> {
        self.reports.iter().find(|r| r.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        let mut result = RunResult {
            id: Uuid::new_v4(),
            pipeline_name: "shorts".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            state: RunState::Succeeded,
            reports: Vec::new(),
            artifacts: Vec::new(),
        };
        assert_eq!(result.exit_code(), 0);
        assert!(result.succeeded());

        result.state = RunState::Failed {
            stage: "publish".to_string(),
            exit_code: 3,
            error: "upload rejected".to_string(),
        };
        assert_eq!(result.exit_code(), 3);
        assert!(!result.succeeded());
    }

    #[test]
    fn test_skipped_report_has_no_attempts() {
        let report = StageReport::skipped("publish", 4);
        assert_eq!(report.status, StageStatus::Skipped);
        assert!(report.attempts.is_empty());
        assert_eq!(report.last_diagnostic(), None);
    }
}
