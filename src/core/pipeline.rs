//! Pipeline definitions and loading.
//!
//! A pipeline is an ordered list of stages, each with declared input and
//! output artifacts, a runner descriptor, and a retry policy. Pipelines
//! can be loaded from YAML; the built-in `shorts` pipeline mirrors the
//! five-stage news-video flow.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::ArtifactSpec;

/// A complete pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline name (used in CLI and logs)
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// Settling delay between consecutive stages, in seconds
    #[serde(default = "default_settle_seconds")]
    pub settle_seconds: u64,

    /// Default per-stage timeout in seconds
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_seconds: u64,

    /// Ordered list of stages to execute
    pub stages: Vec<Stage>,
}

fn default_settle_seconds() -> u64 {
    2
}
fn default_stage_timeout() -> u64 {
    600
}

impl Pipeline {
    /// Load a pipeline from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;

        Self::from_yaml(&content)
    }

    /// Parse a pipeline from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse pipeline YAML")
    }

    /// Validate the pipeline definition.
    ///
    /// Stage names and output artifact names must be unique, and every
    /// declared input must be produced by an earlier stage.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("Pipeline name cannot be empty");
        }

        if self.stages.is_empty() {
            anyhow::bail!("Pipeline must have at least one stage");
        }

        let mut seen_stages: HashSet<&str> = HashSet::new();
        let mut produced: HashSet<&str> = HashSet::new();

        for (i, stage) in self.stages.iter().enumerate() {
            if stage.name.is_empty() {
                anyhow::bail!("Stage {} has an empty name", i);
            }
            if !seen_stages.insert(stage.name.as_str()) {
                anyhow::bail!("Duplicate stage name '{}'", stage.name);
            }

            for input in &stage.inputs {
                if !produced.contains(input.as_str()) {
                    anyhow::bail!(
                        "Stage '{}' consumes artifact '{}' that no earlier stage produces",
                        stage.name,
                        input
                    );
                }
            }

            for output in &stage.outputs {
                if !produced.insert(output.name.as_str()) {
                    anyhow::bail!(
                        "Artifact '{}' is produced by more than one stage",
                        output.name
                    );
                }
            }

            if let Runner::FanOut { workers, .. } = stage.runner {
                if workers == 0 {
                    anyhow::bail!("Stage '{}' declares zero fan-out workers", stage.name);
                }
            }
        }

        Ok(())
    }

    /// Settling delay between stages
    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_seconds)
    }

    /// Get a stage by name
    pub fn get_stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// The built-in short-news-video pipeline: fetch a trending headline,
    /// generate imagery, assemble a slideshow, narrate with captions, and
    /// publish.
    pub fn shorts() -> Self {
        let stages = vec![
            Stage {
                name: "news".to_string(),
                category: StageCategory::Text,
                inputs: vec![],
                outputs: vec![ArtifactSpec::metadata("news_json", "news.json")],
                scratch: vec![],
                runner: Runner::Command {
                    program: "newsreel-news".to_string(),
                    args: str_args(&[
                        "--gemini-api-key",
                        "{gemini_api_key}",
                        "--newsdata-api-key",
                        "{newsdata_api_key}",
                        "--output",
                        "{news_json}",
                    ]),
                },
                retry: RetryPolicy::default(),
                timeout_seconds: None,
            },
            Stage {
                name: "images".to_string(),
                category: StageCategory::Text,
                inputs: vec!["news_json".to_string()],
                outputs: vec![ArtifactSpec::directory(
                    "images_dir",
                    "generated_images",
                    "*.png",
                )],
                scratch: vec![],
                runner: Runner::FanOut {
                    program: "newsreel-image".to_string(),
                    args: str_args(&[
                        "--gemini-api-key",
                        "{gemini_api_key}",
                        "--imagerouter-api-key",
                        "{imagerouter_api_key}",
                        "--news-file",
                        "{news_json}",
                        "--save-folder",
                        "{images_dir}",
                        "--index",
                        "{index}",
                    ]),
                    workers: 6,
                },
                retry: RetryPolicy::default(),
                timeout_seconds: None,
            },
            Stage {
                name: "video".to_string(),
                category: StageCategory::Text,
                inputs: vec!["images_dir".to_string()],
                outputs: vec![ArtifactSpec::file("slideshow", "slideshow.mp4")],
                scratch: vec![],
                runner: Runner::Command {
                    program: "newsreel-video".to_string(),
                    args: str_args(&[
                        "--image-folder",
                        "{images_dir}",
                        "--output-video",
                        "{slideshow}",
                        "--video-duration",
                        "60",
                        "--segment-duration",
                        "10",
                    ]),
                },
                retry: RetryPolicy::default(),
                timeout_seconds: None,
            },
            Stage {
                name: "narrate".to_string(),
                category: StageCategory::Audio,
                inputs: vec!["slideshow".to_string(), "news_json".to_string()],
                outputs: vec![ArtifactSpec::file("final_video", "final_output.mp4")],
                scratch: vec![
                    PathBuf::from("temp_speech.mp3"),
                    PathBuf::from("temp_video.mp4"),
                    PathBuf::from("captions.srt"),
                ],
                runner: Runner::Command {
                    program: "newsreel-narrate".to_string(),
                    args: str_args(&[
                        "--video",
                        "{slideshow}",
                        "--news-file",
                        "{news_json}",
                        "--output",
                        "{final_video}",
                        "--api-key",
                        "{elevenlabs_api_key}",
                        "--voice-id",
                        "{voice_id}",
                    ]),
                },
                retry: RetryPolicy::default(),
                timeout_seconds: None,
            },
            Stage {
                name: "publish".to_string(),
                category: StageCategory::Publish,
                inputs: vec!["final_video".to_string(), "news_json".to_string()],
                outputs: vec![],
                scratch: vec![],
                runner: Runner::Command {
                    program: "newsreel-publish".to_string(),
                    args: str_args(&[
                        "--file",
                        "{final_video}",
                        "--news-file",
                        "{news_json}",
                        "--category",
                        "22",
                        "--privacy",
                        "public",
                    ]),
                },
                retry: RetryPolicy::default(),
                timeout_seconds: None,
            },
        ];

        Self {
            name: "shorts".to_string(),
            description: "Automated short news video: headline to published upload".to_string(),
            settle_seconds: default_settle_seconds(),
            stage_timeout_seconds: default_stage_timeout(),
            stages,
        }
    }
}

fn str_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// A single stage in a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name (unique within the pipeline)
    pub name: String,

    /// Failure category, mapped to the process exit code
    pub category: StageCategory,

    /// Names of artifacts this stage consumes
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Artifacts this stage promises to produce
    #[serde(default)]
    pub outputs: Vec<ArtifactSpec>,

    /// Stage-scoped temporary files, removed on the stage's exit path
    /// whether it succeeded or failed
    #[serde(default)]
    pub scratch: Vec<PathBuf>,

    /// How the stage's unit of work is executed
    pub runner: Runner,

    /// Retry policy for this stage
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Override timeout for this stage (uses the pipeline default if unset)
    pub timeout_seconds: Option<u64>,
}

impl Stage {
    /// Effective timeout for this stage
    pub fn timeout(&self, pipeline_default: u64) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(pipeline_default))
    }
}

/// Stage failure categories and their reserved exit codes.
///
/// A scheduler can distinguish the failure class from the exit status
/// alone, without parsing logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCategory {
    /// News selection, imagery, video assembly
    Text,

    /// Speech synthesis and caption burning
    Audio,

    /// Upload to the publishing platform
    Publish,
}

impl StageCategory {
    /// The non-zero exit code reserved for this category
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Text => 1,
            Self::Audio => 2,
            Self::Publish => 3,
        }
    }
}

/// How a stage's unit of work is dispatched
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Runner {
    /// One external process
    Command { program: String, args: Vec<String> },

    /// N concurrent worker processes, each with a distinct `{index}`
    FanOut {
        program: String,
        args: Vec<String>,
        workers: u32,
    },
}

/// Retry policy for failed stage attempts.
///
/// Defaults to three attempts with a fixed 5 s delay; a multiplier above
/// 1.0 turns the delay into exponential backoff capped at `max_delay_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the next attempt, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Backoff multiplier (1.0 keeps the delay fixed)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Cap on the between-attempt delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_delay_ms() -> u64 {
    5000
}
fn default_backoff_multiplier() -> f64 {
    1.0
}
fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Delay after a failed attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(self.delay_ms);
        }

        let delay = self.delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);
        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Whether another attempt is allowed after `attempt` failed
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PIPELINE_YAML: &str = r#"
name: test
description: Test pipeline
settle_seconds: 0

stages:
  - name: first
    category: text
    runner:
      kind: command
      program: gen-news
      args: ["--output", "{news_json}"]
    outputs:
      - name: news_json
        path: news.json
        kind: metadata

  - name: second
    category: audio
    inputs: [news_json]
    runner:
      kind: command
      program: narrate
      args: ["--news-file", "{news_json}"]
"#;

    #[test]
    fn test_pipeline_parsing() {
        let pipeline = Pipeline::from_yaml(TEST_PIPELINE_YAML).unwrap();

        assert_eq!(pipeline.name, "test");
        assert_eq!(pipeline.stages.len(), 2);
        assert_eq!(pipeline.settle_seconds, 0);
        assert!(pipeline.validate().is_ok());
    }

    #[test]
    fn test_unknown_input_rejected() {
        let yaml = r#"
name: invalid
description: Invalid pipeline
stages:
  - name: only
    category: text
    inputs: [nonexistent]
    runner:
      kind: command
      program: gen
      args: []
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_duplicate_output_rejected() {
        let yaml = r#"
name: invalid
description: Two producers for one artifact
stages:
  - name: a
    category: text
    runner: { kind: command, program: gen, args: [] }
    outputs:
      - { name: out, path: out.json, kind: file }
  - name: b
    category: text
    runner: { kind: command, program: gen, args: [] }
    outputs:
      - { name: out, path: out.json, kind: file }
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_builtin_shorts_pipeline_is_valid() {
        let pipeline = Pipeline::shorts();
        assert!(pipeline.validate().is_ok());
        assert_eq!(pipeline.stages.len(), 5);
        assert_eq!(
            pipeline.get_stage("publish").unwrap().category,
            StageCategory::Publish
        );
    }

    #[test]
    fn test_exit_codes_per_category() {
        assert_eq!(StageCategory::Text.exit_code(), 1);
        assert_eq!(StageCategory::Audio.exit_code(), 2);
        assert_eq!(StageCategory::Publish.exit_code(), 3);
    }

    #[test]
    fn test_fixed_delay_by_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(5000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(5000));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_backoff_delays_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 3000,
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(3000)); // capped
    }
}
