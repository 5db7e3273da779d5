//! Command-line interface for newsreel.
//!
//! Provides commands for running the pipeline, validating pipeline files,
//! inspecting the stage plan, and checking credential rotation.

use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use crate::config::{RunSettings, Secrets, EXIT_CONFIG};
use crate::credentials::CredentialPool;
use crate::core::{Orchestrator, Pipeline, Runner};
use crate::domain::RunState;
use crate::runlog;

/// newsreel - short-news-video pipeline orchestrator
#[derive(Parser, Debug)]
#[command(name = "newsreel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute the pipeline end to end
    Run {
        /// Pipeline definition file (built-in `shorts` pipeline if omitted)
        #[arg(short, long)]
        pipeline: Option<PathBuf>,

        /// Working directory for artifacts and the run log
        #[arg(short, long, default_value = ".")]
        workdir: PathBuf,

        /// Override the settling delay between stages, in seconds
        #[arg(long)]
        settle_secs: Option<u64>,
    },

    /// Load and validate a pipeline definition file
    Validate {
        /// Pipeline definition file
        pipeline: PathBuf,
    },

    /// Print the stage plan without executing anything
    Plan {
        /// Pipeline definition file (built-in if omitted)
        #[arg(short, long)]
        pipeline: Option<PathBuf>,
    },

    /// Show which credential slot is active for a date
    Credentials {
        /// Date to evaluate (defaults to today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date '{s}': {e}"))
}

impl Cli {
    /// Execute the parsed command, returning the process exit code.
    ///
    /// 0 = success; 1-3 = the failing stage's reserved code; 78 =
    /// configuration error before any stage ran.
    pub async fn execute(self) -> i32 {
        match self.command {
            Commands::Run {
                pipeline,
                workdir,
                settle_secs,
            } => run(pipeline, workdir, settle_secs).await,
            Commands::Validate { pipeline } => validate(&pipeline),
            Commands::Plan { pipeline } => plan(pipeline),
            Commands::Credentials { date } => credentials(date),
        }
    }
}

async fn run(pipeline_file: Option<PathBuf>, workdir: PathBuf, settle_secs: Option<u64>) -> i32 {
    let settings = RunSettings {
        workdir,
        ..RunSettings::default()
    };

    if let Err(e) = runlog::init(Some(&settings.log_path())) {
        eprintln!("error: {e:#}");
        return EXIT_CONFIG;
    }

    let mut pipeline = match load_pipeline(pipeline_file) {
        Ok(p) => p,
        Err(e) => {
            error!("{e:#}");
            return EXIT_CONFIG;
        }
    };
    if let Some(secs) = settle_secs {
        pipeline.settle_seconds = secs;
    }

    // All secrets resolve before any stage executes
    let secrets = match Secrets::from_env(CredentialPool::elevenlabs()) {
        Ok(s) => s,
        Err(e) => {
            error!("configuration error: {e}");
            return EXIT_CONFIG;
        }
    };

    let orchestrator = Orchestrator::new(settings);
    match orchestrator.execute(&pipeline, &secrets).await {
        Ok(result) => {
            match &result.state {
                RunState::Succeeded => {
                    info!(run_id = %result.id, "=== all stages completed successfully ===");
                }
                RunState::Failed {
                    stage,
                    exit_code,
                    error,
                } => {
                    error!(%stage, exit_code, %error, "pipeline failed");
                }
                _ => {}
            }
            result.exit_code()
        }
        Err(e) => {
            error!("{e:#}");
            EXIT_CONFIG
        }
    }
}

fn validate(path: &PathBuf) -> i32 {
    if let Err(e) = runlog::init(None) {
        eprintln!("error: {e:#}");
        return EXIT_CONFIG;
    }

    match Pipeline::from_file(path).and_then(|p| {
        p.validate()?;
        Ok(p)
    }) {
        Ok(pipeline) => {
            println!(
                "OK: pipeline '{}' with {} stages",
                pipeline.name,
                pipeline.stages.len()
            );
            0
        }
        Err(e) => {
            error!("{e:#}");
            EXIT_CONFIG
        }
    }
}

fn plan(pipeline_file: Option<PathBuf>) -> i32 {
    if let Err(e) = runlog::init(None) {
        eprintln!("error: {e:#}");
        return EXIT_CONFIG;
    }

    let pipeline = match load_pipeline(pipeline_file) {
        Ok(p) => p,
        Err(e) => {
            error!("{e:#}");
            return EXIT_CONFIG;
        }
    };

    println!("{} - {}", pipeline.name, pipeline.description);
    for (i, stage) in pipeline.stages.iter().enumerate() {
        let program = match &stage.runner {
            Runner::Command { program, .. } => program.clone(),
            Runner::FanOut {
                program, workers, ..
            } => format!("{program} x{workers}"),
        };
        let outputs: Vec<&str> = stage.outputs.iter().map(|o| o.name.as_str()).collect();
        println!(
            "  {}. {:<10} exit={} runner={} inputs={:?} outputs={:?}",
            i + 1,
            stage.name,
            stage.category.exit_code(),
            program,
            stage.inputs,
            outputs,
        );
    }
    0
}

fn credentials(date: Option<NaiveDate>) -> i32 {
    if let Err(e) = runlog::init(None) {
        eprintln!("error: {e:#}");
        return EXIT_CONFIG;
    }

    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let pool = CredentialPool::elevenlabs();

    if let Err(e) = pool.validate() {
        error!("configuration error: {e}");
        return EXIT_CONFIG;
    }

    match pool.active_slot(date) {
        Ok(slot) => {
            println!(
                "{}: slot '{}' ({}) active on {} (days {}-{})",
                pool.name, slot.label, slot.env_var, date, slot.days.start, slot.days.end
            );
            0
        }
        Err(e) => {
            error!("configuration error: {e}");
            EXIT_CONFIG
        }
    }
}

fn load_pipeline(file: Option<PathBuf>) -> anyhow::Result<Pipeline> {
    let pipeline = match file {
        Some(path) => Pipeline::from_file(&path)?,
        None => Pipeline::shorts(),
    };
    pipeline.validate()?;
    Ok(pipeline)
}
