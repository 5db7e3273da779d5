//! newsreel - short-news-video pipeline orchestrator
//!
//! Automates production of a short video: fetch a trending news item,
//! synthesize supporting imagery, assemble a slideshow, overlay speech and
//! captions, then publish it. The leaf work lives in external programs
//! invoked through narrow subprocess contracts; this crate is the
//! orchestration discipline around them.
//!
//! # Architecture
//!
//! - Stages run strictly in order; stage i's outputs are stage i+1's inputs
//! - Each stage retries under its policy, then fails the run with its
//!   reserved exit code
//! - Artifact contracts are validated by the orchestrator after every
//!   stage; present-but-empty equals absent
//! - Exhaustible credentials rotate by calendar day, as a pure function of
//!   the date
//!
//! # Modules
//!
//! - `core`: orchestration (Pipeline, StageRunner, ArtifactStore, Orchestrator)
//! - `exec`: the stage execution boundary (subprocess and fan-out executors)
//! - `domain`: data structures (Artifact, Attempt, RunResult)
//! - `credentials`: calendar-scheduled credential rotation
//! - `config`: secrets and run settings
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Execute the built-in pipeline
//! newsreel run --workdir ./work
//!
//! # Inspect the stage plan
//! newsreel plan
//!
//! # Which speech key is active today?
//! newsreel credentials
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod credentials;
pub mod domain;
pub mod exec;
pub mod runlog;

// Re-export main types at crate root for convenience
pub use config::{RunSettings, Secrets};
pub use core::{Orchestrator, Pipeline};
pub use credentials::CredentialPool;
pub use domain::{RunResult, RunState, StageReport, StageStatus};
