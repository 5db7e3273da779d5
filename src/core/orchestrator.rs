//! Main orchestrator for pipeline execution.
//!
//! Owns the fixed stage sequence: wires declared inputs to prior outputs,
//! drives the stage runner, validates artifact contracts after each stage,
//! and terminates the run on the first unrecoverable failure. Strictly
//! sequential across stages; the only concurrency lives inside a stage's
//! unit of work.

use chrono::{Local, NaiveDate, Utc};
use tracing::{error, info};
use uuid::Uuid;

use anyhow::{Context, Result};

use crate::config::{voice_for, RunSettings, Secrets};
use crate::domain::{RunResult, RunState, StageReport, StageStatus};
use crate::exec::{ExecRegistry, StageContext, TemplateVars};

use super::pipeline::{Pipeline, Runner, Stage};
use super::runner::StageRunner;
use super::store::ArtifactStore;

/// Pipeline orchestrator
pub struct Orchestrator {
    settings: RunSettings,
    execs: ExecRegistry,
}

impl Orchestrator {
    /// Create an orchestrator with the real subprocess executors
    pub fn new(settings: RunSettings) -> Self {
        Self {
            settings,
            execs: ExecRegistry::default(),
        }
    }

    /// Create an orchestrator with custom executors (tests, embedding)
    pub fn with_execs(settings: RunSettings, execs: ExecRegistry) -> Self {
        Self { settings, execs }
    }

    /// Execute a pipeline, selecting credentials for today's date
    pub async fn execute(&self, pipeline: &Pipeline, secrets: &Secrets) -> Result<RunResult> {
        self.execute_on(pipeline, secrets, Local::now().date_naive())
            .await
    }

    /// Execute a pipeline with credential rotation evaluated as of `date`
    pub async fn execute_on(
        &self,
        pipeline: &Pipeline,
        secrets: &Secrets,
        date: NaiveDate,
    ) -> Result<RunResult> {
        pipeline.validate()?;

        std::fs::create_dir_all(&self.settings.workdir).with_context(|| {
            format!(
                "Failed to create working directory {}",
                self.settings.workdir.display()
            )
        })?;

        let store = ArtifactStore::new(&self.settings.workdir);
        let vars = self.build_vars(pipeline, secrets, date)?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = pipeline.stages.len();
        info!(%run_id, pipeline = %pipeline.name, stages = total, "pipeline run starting");

        let mut reports: Vec<StageReport> = Vec::with_capacity(total);
        let mut artifacts: Vec<String> = Vec::new();

        for (i, stage) in pipeline.stages.iter().enumerate() {
            info!(
                stage = %stage.name,
                position = i + 1,
                total,
                "=== stage starting ==="
            );

            // Stale outputs from an earlier run must not satisfy this run
            for output in &stage.outputs {
                store.clear(output);
            }

            let ctx = self.context_for(pipeline, stage, &vars);
            let exec = match &stage.runner {
                Runner::Command { .. } => &self.execs.command,
                Runner::FanOut { .. } => &self.execs.fan_out,
            };

            let mut report = StageRunner::run(stage, i, &ctx, exec.as_ref()).await;

            // Stage-scoped temp files go away on every exit path
            store.clean_scratch(&stage.scratch);

            if report.status == StageStatus::Failed {
                let diagnostic = report
                    .last_diagnostic()
                    .unwrap_or("no diagnostic output")
                    .to_string();
                error!(
                    stage = %stage.name,
                    attempts = report.attempts.len(),
                    %diagnostic,
                    "run failed: stage exhausted its retry policy"
                );
                reports.push(report);
                return Ok(self.failed(
                    run_id, pipeline, started_at, reports, artifacts, stage, diagnostic,
                ));
            }

            // Contract validation: a stage that "succeeds" without its
            // declared outputs is fatal, not retryable.
            let mut violation = None;
            for output in &stage.outputs {
                if let Err(e) = store.validate(output) {
                    violation = Some(e);
                    break;
                }
            }
            if let Some(e) = violation {
                error!(stage = %stage.name, error = %e, "run failed: artifact contract violated");
                report.status = StageStatus::Failed;
                reports.push(report);
                return Ok(self.failed(
                    run_id,
                    pipeline,
                    started_at,
                    reports,
                    artifacts,
                    stage,
                    e.to_string(),
                ));
            }

            artifacts.extend(stage.outputs.iter().map(|o| o.name.clone()));
            reports.push(report);

            // Settling delay between stages, a courtesy to rate-limited
            // external services
            if i + 1 < total && !pipeline.settle().is_zero() {
                tokio::time::sleep(pipeline.settle()).await;
            }
        }

        info!(%run_id, pipeline = %pipeline.name, "pipeline run succeeded");
        Ok(RunResult {
            id: run_id,
            pipeline_name: pipeline.name.clone(),
            started_at,
            finished_at: Utc::now(),
            state: RunState::Succeeded,
            reports,
            artifacts,
        })
    }

    /// Terminal failure: later stages are recorded as skipped with zero
    /// attempts, and the exit code is the failing stage's reserved code.
    #[allow(clippy::too_many_arguments)]
    fn failed(
        &self,
        run_id: Uuid,
        pipeline: &Pipeline,
        started_at: chrono::DateTime<Utc>,
        mut reports: Vec<StageReport>,
        artifacts: Vec<String>,
        stage: &Stage,
        error: String,
    ) -> RunResult {
        for (j, later) in pipeline.stages.iter().enumerate().skip(reports.len()) {
            reports.push(StageReport::skipped(&later.name, j));
        }

        RunResult {
            id: run_id,
            pipeline_name: pipeline.name.clone(),
            started_at,
            finished_at: Utc::now(),
            state: RunState::Failed {
                stage: stage.name.clone(),
                exit_code: stage.category.exit_code(),
                error,
            },
            reports,
            artifacts,
        }
    }

    /// Resolve every placeholder a stage argv may reference: artifact
    /// paths, process secrets, the day-active speech credential, and the
    /// narration voice.
    fn build_vars(
        &self,
        pipeline: &Pipeline,
        secrets: &Secrets,
        date: NaiveDate,
    ) -> Result<TemplateVars> {
        let mut vars = TemplateVars::new();

        for stage in &pipeline.stages {
            for output in &stage.outputs {
                vars.insert(&output.name, output.path.to_string_lossy());
            }
        }

        vars.insert_secret("newsdata_api_key", &secrets.newsdata_api_key);
        vars.insert_secret("gemini_api_key", &secrets.gemini_api_key);
        vars.insert_secret("imagerouter_api_key", &secrets.imagerouter_api_key);

        let (slot, key) = secrets
            .elevenlabs_key(date)
            .context("No active speech credential for the run date")?;
        info!(%date, slot, "speech credential slot selected");
        vars.insert_secret("elevenlabs_api_key", key);

        let voice = voice_for(&self.settings.voices, date)
            .context("No narration voices are configured")?;
        info!(voice = %voice.name, "narration voice selected");
        vars.insert("voice_id", &voice.id);
        vars.insert("voice_name", &voice.name);

        Ok(vars)
    }

    fn context_for(&self, pipeline: &Pipeline, stage: &Stage, vars: &TemplateVars) -> StageContext {
        let (program, args, workers) = match &stage.runner {
            Runner::Command { program, args } => (program.clone(), args.clone(), 1),
            Runner::FanOut {
                program,
                args,
                workers,
            } => (program.clone(), args.clone(), *workers),
        };

        StageContext {
            stage: stage.name.clone(),
            program,
            args,
            vars: vars.clone(),
            workdir: self.settings.workdir.clone(),
            timeout: stage.timeout(pipeline.stage_timeout_seconds),
            workers,
        }
    }
}
