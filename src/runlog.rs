//! Run log initialization.
//!
//! Every attempt is recorded as a timestamped, line-oriented log entry,
//! duplicated to the invoking terminal and (for pipeline runs) to one log
//! file per run, truncated at run start.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing with a console layer and, when `log_path` is given,
/// a persistent ANSI-free file layer.
pub fn init(log_path: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer().with_target(false);

    match log_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create log directory {}", parent.display())
                    })?;
                }
            }

            // One log file per run, overwritten at run start
            let file = File::create(path)
                .with_context(|| format!("Failed to create run log {}", path.display()))?;
            let file_layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::new(file));

            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file_layer)
                .try_init()
                .context("Failed to initialize run log")?;
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .try_init()
                .context("Failed to initialize run log")?;
        }
    }

    Ok(())
}
