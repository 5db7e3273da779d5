//! Domain types for the newsreel orchestrator.
//!
//! This module contains the core data structures:
//! - Artifact: declared on-disk contracts between stages
//! - Attempt: one execution try of a stage
//! - Run: pipeline execution state and aggregate outcome

pub mod artifact;
pub mod attempt;
pub mod run;

// Re-export commonly used types
pub use artifact::{ArtifactKind, ArtifactSpec, NewsMetadata};
pub use attempt::{Attempt, AttemptOutcome};
pub use run::{RunResult, RunState, StageReport, StageStatus};
