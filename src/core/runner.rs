//! Stage runner: executes one stage under its retry policy.
//!
//! The runner owns attempt history and the retry loop. It deliberately
//! does not look at output artifacts; contract validation belongs to the
//! orchestrator.

use chrono::Utc;
use tracing::{error, info, warn};

use crate::domain::{Attempt, AttemptOutcome, StageReport, StageStatus};
use crate::exec::{StageContext, StageExec};

use super::pipeline::Stage;

/// Runs a single stage to success or retry exhaustion
pub struct StageRunner;

impl StageRunner {
    /// Execute `stage` with up to `retry.max_attempts` attempts.
    ///
    /// Every attempt is recorded, including retries; a first-try success
    /// produces a report with exactly one attempt.
    pub async fn run(
        stage: &Stage,
        ordinal: usize,
        ctx: &StageContext,
        exec: &dyn StageExec,
    ) -> StageReport {
        let mut attempts = Vec::new();

        loop {
            let number = attempts.len() as u32 + 1;
            let started_at = Utc::now();
            info!(stage = %stage.name, attempt = number, executor = exec.name(), "stage attempt starting");

            let result = exec.execute(ctx).await;
            let finished_at = Utc::now();

            match result {
                Ok(output) => {
                    attempts.push(Attempt {
                        number,
                        started_at,
                        finished_at,
                        diagnostic: output.diagnostic,
                        outcome: AttemptOutcome::Success,
                    });
                    info!(stage = %stage.name, attempt = number, "stage attempt succeeded");
                    return StageReport {
                        stage: stage.name.clone(),
                        ordinal,
                        attempts,
                        status: StageStatus::Succeeded,
                    };
                }
                Err(e) => {
                    attempts.push(Attempt {
                        number,
                        started_at,
                        finished_at,
                        diagnostic: e.diagnostic(),
                        outcome: AttemptOutcome::RetryableFailure,
                    });

                    if stage.retry.should_retry(number) {
                        let delay = stage.retry.delay_for_attempt(number);
                        warn!(
                            stage = %stage.name,
                            attempt = number,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "stage attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    error!(
                        stage = %stage.name,
                        attempts = number,
                        error = %e,
                        "stage failed after exhausting retries"
                    );
                    return StageReport {
                        stage: stage.name.clone(),
                        ordinal,
                        attempts,
                        status: StageStatus::Failed,
                    };
                }
            }
        }
    }
}
