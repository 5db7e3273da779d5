//! Fan-out/fan-in executor for intra-stage parallelism.
//!
//! The imagery stage issues several independent generation requests; each
//! worker is one subprocess invocation with a distinct `{index}`. A single
//! worker's failure is logged and does not abort its siblings; the stage
//! completes once every worker has finished. Whether enough files were
//! actually produced is decided afterwards by artifact validation, not
//! here.

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::{CommandExec, ExecError, ExecOutput, StageContext, StageExec};

/// Executor that runs a stage as N concurrent subprocess workers
#[derive(Debug, Default)]
pub struct FanOutExec;

impl FanOutExec {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StageExec for FanOutExec {
    fn name(&self) -> &str {
        "fan_out"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<ExecOutput, ExecError> {
        let workers = ctx.workers.max(1);
        let mut set = JoinSet::new();

        for index in 0..workers {
            let ctx = ctx.clone();
            set.spawn(async move {
                let result =
                    CommandExec::run_process(&ctx, Some(("index", index.to_string()))).await;
                (index, result)
            });
        }

        let mut diagnostics = Vec::new();
        let mut failed = 0u32;

        while let Some(joined) = set.join_next().await {
            let (index, result) = joined.map_err(|e| ExecError::Service {
                reason: format!("worker task panicked: {e}"),
            })?;

            match result {
                Ok(output) => {
                    if !output.diagnostic.is_empty() {
                        diagnostics.push(format!("worker {index}: {}", output.diagnostic));
                    }
                }
                Err(e) => {
                    failed += 1;
                    warn!(stage = %ctx.stage, worker = index, error = %e, "worker failed");
                    diagnostics.push(format!("worker {index} failed: {}", e.diagnostic()));
                }
            }
        }

        info!(
            stage = %ctx.stage,
            workers,
            failed,
            "fan-out complete"
        );

        diagnostics.sort();
        Ok(ExecOutput::new(diagnostics.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::TemplateVars;
    use std::path::PathBuf;
    use std::time::Duration;

    fn ctx(program: &str, args: &[&str], workers: u32, workdir: PathBuf) -> StageContext {
        StageContext {
            stage: "images".to_string(),
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            vars: TemplateVars::new(),
            workdir,
            timeout: Duration::from_secs(10),
            workers,
        }
    }

    #[tokio::test]
    async fn test_all_workers_run() {
        let dir = tempfile::tempdir().unwrap();
        let exec = FanOutExec::new();
        let ctx = ctx("touch", &["img-{index}.png"], 4, dir.path().to_path_buf());

        exec.execute(&ctx).await.unwrap();

        let produced = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(produced, 4);
    }

    #[tokio::test]
    async fn test_worker_failure_does_not_abort_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let exec = FanOutExec::new();
        // Worker 0 fails (touch refuses an empty path suffix trick is
        // unreliable, so use sh to fail on index 0 only).
        let ctx = ctx(
            "sh",
            &["-c", "test {index} -ne 0 && touch img-{index}.png"],
            3,
            dir.path().to_path_buf(),
        );

        // The stage itself still completes
        let output = exec.execute(&ctx).await.unwrap();
        assert!(output.diagnostic.contains("worker 0 failed"));

        let produced = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(produced, 2);
    }
}
