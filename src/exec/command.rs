//! Subprocess executor for single-command stages.
//!
//! Spawns the stage's program with substituted argv, captures stdout and
//! stderr, and enforces the stage timeout. Non-zero exit and timeout both
//! surface as retryable execution errors.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{ExecError, ExecOutput, StageContext, StageExec};

/// Executor that runs a stage as one external process
#[derive(Debug, Default)]
pub struct CommandExec;

impl CommandExec {
    pub fn new() -> Self {
        Self
    }

    /// Spawn the stage's program and collect its combined output.
    ///
    /// `extra` vars are layered on top of the stage vars; the fan-out
    /// executor uses this to inject the per-worker `{index}`.
    pub(crate) async fn run_process(
        ctx: &StageContext,
        extra: Option<(&str, String)>,
    ) -> Result<ExecOutput, ExecError> {
        let mut vars = ctx.vars.clone();
        if let Some((key, value)) = extra {
            vars.insert(key, value);
        }

        let argv: Vec<String> = ctx.args.iter().map(|a| vars.render(a)).collect();
        let shown: Vec<String> = ctx.args.iter().map(|a| vars.redacted(a)).collect();
        debug!(stage = %ctx.stage, program = %ctx.program, args = ?shown, "spawning stage process");

        let child = Command::new(&ctx.program)
            .args(&argv)
            .current_dir(&ctx.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::Spawn {
                program: ctx.program.clone(),
                reason: e.to_string(),
            })?;

        let output = timeout(ctx.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExecError::Timeout {
                program: ctx.program.clone(),
                timeout: ctx.timeout,
            })?
            .map_err(|e| ExecError::Spawn {
                program: ctx.program.clone(),
                reason: e.to_string(),
            })?;

        let mut diagnostic = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !diagnostic.is_empty() {
                diagnostic.push('\n');
            }
            diagnostic.push_str(stderr.trim());
        }

        if !output.status.success() {
            return Err(ExecError::NonZeroExit {
                program: ctx.program.clone(),
                code: output.status.code().unwrap_or(-1),
                diagnostic: diagnostic.trim().to_string(),
            });
        }

        Ok(ExecOutput::new(diagnostic.trim().to_string()))
    }
}

#[async_trait]
impl StageExec for CommandExec {
    fn name(&self) -> &str {
        "command"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<ExecOutput, ExecError> {
        Self::run_process(ctx, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::TemplateVars;
    use std::path::PathBuf;
    use std::time::Duration;

    fn ctx(program: &str, args: &[&str], timeout: Duration) -> StageContext {
        StageContext {
            stage: "test".to_string(),
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            vars: TemplateVars::new(),
            workdir: PathBuf::from("."),
            timeout,
            workers: 1,
        }
    }

    #[tokio::test]
    async fn test_successful_command_captures_stdout() {
        let exec = CommandExec::new();
        let ctx = ctx("echo", &["hello"], Duration::from_secs(5));

        let output = exec.execute(&ctx).await.unwrap();
        assert_eq!(output.diagnostic, "hello");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_an_error() {
        let exec = CommandExec::new();
        let ctx = ctx("false", &[], Duration::from_secs(5));

        let result = exec.execute(&ctx).await;
        assert!(matches!(result, Err(ExecError::NonZeroExit { .. })));
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let exec = CommandExec::new();
        let ctx = ctx(
            "newsreel-does-not-exist",
            &[],
            Duration::from_secs(5),
        );

        let result = exec.execute(&ctx).await;
        assert!(matches!(result, Err(ExecError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_timeout_enforced() {
        let exec = CommandExec::new();
        let ctx = ctx("sleep", &["5"], Duration::from_millis(100));

        let result = exec.execute(&ctx).await;
        assert!(matches!(result, Err(ExecError::Timeout { .. })));
    }
}
