//! Core orchestration logic.
//!
//! This module contains:
//! - Pipeline: stage descriptors and loading
//! - StageRunner: retrying execution of one stage
//! - ArtifactStore: filesystem contract validation
//! - Orchestrator: the sequencing engine

pub mod orchestrator;
pub mod pipeline;
pub mod runner;
pub mod store;

// Re-export commonly used types
pub use orchestrator::Orchestrator;
pub use pipeline::{Pipeline, RetryPolicy, Runner, Stage, StageCategory};
pub use runner::StageRunner;
pub use store::{ArtifactError, ArtifactStore};
