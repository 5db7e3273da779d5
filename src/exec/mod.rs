//! Stage execution boundary.
//!
//! Each stage's unit of work sits behind the [`StageExec`] trait, so a
//! stage can be an external process, an in-process function (tests), or
//! something else without the orchestrator changing. The two shipped
//! executors are [`CommandExec`] (one subprocess) and [`FanOutExec`]
//! (several subprocess workers in parallel).

pub mod command;
pub mod fanout;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use command::CommandExec;
pub use fanout::FanOutExec;

/// Substitution map for `{placeholder}` tokens in stage argv templates.
///
/// Values marked secret are substituted when building the real argv but
/// render as `[redacted]` in anything destined for the run log.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    values: HashMap<String, String>,
    secret_keys: HashSet<String>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn insert_secret(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.secret_keys.insert(key.clone());
        self.values.insert(key, value.into());
    }

    /// Substitute every known placeholder with its real value
    pub fn render(&self, template: &str) -> String {
        let mut out = template.to_string();
        for (key, value) in &self.values {
            out = out.replace(&format!("{{{key}}}"), value);
        }
        out
    }

    /// Substitute placeholders for logging; secret values are redacted
    pub fn redacted(&self, template: &str) -> String {
        let mut out = template.to_string();
        for (key, value) in &self.values {
            let replacement = if self.secret_keys.contains(key) {
                "[redacted]"
            } else {
                value.as_str()
            };
            out = out.replace(&format!("{{{key}}}"), replacement);
        }
        out
    }
}

/// Everything an executor needs to run one attempt of a stage
#[derive(Debug, Clone)]
pub struct StageContext {
    /// Stage name, for diagnostics
    pub stage: String,

    /// Program to invoke
    pub program: String,

    /// Argv templates; substituted per attempt (and per worker)
    pub args: Vec<String>,

    /// Placeholder values: artifact paths, credentials, voice id
    pub vars: TemplateVars,

    /// Working directory for the subprocess
    pub workdir: PathBuf,

    /// Hard cap on the attempt's wall-clock time
    pub timeout: Duration,

    /// Number of concurrent workers (1 for plain commands)
    pub workers: u32,
}

/// Output of one successful attempt
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    /// Combined stdout/stderr text captured from the unit of work
    pub diagnostic: String,
}

impl ExecOutput {
    pub fn new(diagnostic: impl Into<String>) -> Self {
        Self {
            diagnostic: diagnostic.into(),
        }
    }
}

/// Execution failures.
///
/// All variants are retryable: external generation and network services are
/// the dominant failure source and are usually transient, so the retry
/// policy does not try to distinguish causes.
#[derive(Debug, Clone, Error)]
pub enum ExecError {
    #[error("failed to spawn '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error("'{program}' exited with code {code}: {diagnostic}")]
    NonZeroExit {
        program: String,
        code: i32,
        diagnostic: String,
    },

    #[error("'{program}' timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("external service unavailable: {reason}")]
    Service { reason: String },
}

impl ExecError {
    /// Diagnostic text to record on the attempt
    pub fn diagnostic(&self) -> String {
        match self {
            Self::NonZeroExit { diagnostic, .. } if !diagnostic.is_empty() => {
                format!("{self} | {diagnostic}")
            }
            _ => self.to_string(),
        }
    }
}

/// Trait for stage executors
#[async_trait]
pub trait StageExec: Send + Sync {
    /// Executor name, for logs
    fn name(&self) -> &str;

    /// Run one attempt of the stage's unit of work
    async fn execute(&self, ctx: &StageContext) -> Result<ExecOutput, ExecError>;
}

/// The executors available to the orchestrator, one per runner kind
#[derive(Clone)]
pub struct ExecRegistry {
    pub command: Arc<dyn StageExec>,
    pub fan_out: Arc<dyn StageExec>,
}

impl Default for ExecRegistry {
    fn default() -> Self {
        Self {
            command: Arc::new(CommandExec::new()),
            fan_out: Arc::new(FanOutExec::new()),
        }
    }
}

impl ExecRegistry {
    /// Route every stage through one executor (used by tests)
    pub fn uniform(exec: Arc<dyn StageExec>) -> Self {
        Self {
            command: exec.clone(),
            fan_out: exec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_substitution() {
        let mut vars = TemplateVars::new();
        vars.insert("news_json", "news.json");
        vars.insert_secret("gemini_api_key", "sk-12345");

        assert_eq!(vars.render("--output"), "--output");
        assert_eq!(vars.render("{news_json}"), "news.json");
        assert_eq!(vars.render("{gemini_api_key}"), "sk-12345");
    }

    #[test]
    fn test_redaction_hides_secrets_only() {
        let mut vars = TemplateVars::new();
        vars.insert("news_json", "news.json");
        vars.insert_secret("gemini_api_key", "sk-12345");

        assert_eq!(vars.redacted("{news_json}"), "news.json");
        assert_eq!(vars.redacted("{gemini_api_key}"), "[redacted]");
    }

    #[test]
    fn test_unknown_placeholder_left_alone() {
        let vars = TemplateVars::new();
        assert_eq!(vars.render("{mystery}"), "{mystery}");
    }

    #[test]
    fn test_exec_error_diagnostic_includes_output() {
        let err = ExecError::NonZeroExit {
            program: "newsreel-news".to_string(),
            code: 1,
            diagnostic: "feed returned 503".to_string(),
        };
        let text = err.diagnostic();
        assert!(text.contains("exit"));
        assert!(text.contains("feed returned 503"));
    }
}
