//! Process configuration: secrets, run settings and voice selection.
//!
//! All secrets are resolved from the process environment once, at startup,
//! before any stage executes. A missing required variable is a
//! configuration error, not a mid-run discovery. Secret values are never
//! logged; only slot labels and variable names appear in diagnostics.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credentials::{CredentialPool, PoolError};

/// Exit status for configuration failures (sysexits EX_CONFIG); reserved
/// stage codes start at 1
pub const EXIT_CONFIG: i32 = 78;

/// Required single-key secrets
const NEWSDATA_VAR: &str = "NEWSDATA_API_KEY";
const GEMINI_VAR: &str = "GEMINI_API_KEY";
const IMAGEROUTER_VAR: &str = "IMAGEROUTER_API_KEY";

/// All process-wide secrets, resolved at startup
#[derive(Clone)]
pub struct Secrets {
    /// Headline feed key
    pub newsdata_api_key: String,

    /// Text-generation key (titles, descriptions, image prompts)
    pub gemini_api_key: String,

    /// Image-generation key
    pub imagerouter_api_key: String,

    /// Speech-synthesis pool, rotated by calendar day
    pool: CredentialPool,

    /// Resolved key value per slot label
    slot_keys: HashMap<String, String>,
}

// Manual Debug so a debug-formatted Secrets never leaks key material.
impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("pool", &self.pool.name)
            .field("slots", &self.slot_keys.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Secrets {
    /// Resolve every required secret from the environment.
    ///
    /// The pool is validated first, then every slot's variable must be
    /// present: partial pool configuration is rejected here rather than
    /// surfacing as a mid-month failure.
    pub fn from_env(pool: CredentialPool) -> Result<Self, ConfigError> {
        pool.validate()?;

        let mut slot_keys = HashMap::new();
        for slot in &pool.slots {
            slot_keys.insert(slot.label.clone(), required_var(&slot.env_var)?);
        }

        Ok(Self {
            newsdata_api_key: required_var(NEWSDATA_VAR)?,
            gemini_api_key: required_var(GEMINI_VAR)?,
            imagerouter_api_key: required_var(IMAGEROUTER_VAR)?,
            pool,
            slot_keys,
        })
    }

    /// Build secrets from explicit values (tests, embedding)
    pub fn from_values(
        newsdata: impl Into<String>,
        gemini: impl Into<String>,
        imagerouter: impl Into<String>,
        pool: CredentialPool,
        slot_keys: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        pool.validate()?;
        for slot in &pool.slots {
            if !slot_keys.contains_key(&slot.label) {
                return Err(ConfigError::MissingSecret {
                    var: slot.env_var.clone(),
                });
            }
        }
        Ok(Self {
            newsdata_api_key: newsdata.into(),
            gemini_api_key: gemini.into(),
            imagerouter_api_key: imagerouter.into(),
            pool,
            slot_keys,
        })
    }

    /// The speech-synthesis key active on `date`, with its slot label
    pub fn elevenlabs_key(&self, date: NaiveDate) -> Result<(&str, &str), ConfigError> {
        let slot = self.pool.active_slot(date)?;
        let key = self
            .slot_keys
            .get(&slot.label)
            .ok_or_else(|| ConfigError::MissingSecret {
                var: slot.env_var.clone(),
            })?;
        Ok((slot.label.as_str(), key.as_str()))
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }
}

fn required_var(var: &str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingSecret {
            var: var.to_string(),
        }),
    }
}

/// A narration voice the pipeline can use
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    pub id: String,
}

/// Built-in narration voices
pub fn default_voices() -> Vec<Voice> {
    [
        ("Liam", "TX3LPaxmHKxFdv7VOQHJ"),
        ("Alice", "Xb7hH8MSUJpSbSDYk0k2"),
        ("Aria", "9BWtsMINqrJLrRacOk9x"),
        ("Bill", "pqHfZKP75CvOlQylNhV4"),
        ("Brian", "nPczCjzI2devNBz1zQrb"),
        ("Mark", "UgBBYS2sOqTuMpoF3BR0"),
        ("Cassidy", "56AoDkrOh6qfVPDXZ7Pt"),
    ]
    .into_iter()
    .map(|(name, id)| Voice {
        name: name.to_string(),
        id: id.to_string(),
    })
    .collect()
}

/// Deterministic voice selection: same day, same voice.
///
/// Replaces the original shuffled pick so reruns within a day are
/// reproducible.
pub fn voice_for(voices: &[Voice], date: NaiveDate) -> Option<&Voice> {
    if voices.is_empty() {
        return None;
    }
    let idx = (date.day() as usize - 1) % voices.len();
    voices.get(idx)
}

/// Per-run settings, overridable from the CLI
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Root directory for artifacts and the run log
    pub workdir: PathBuf,

    /// Run log file name (relative to workdir), truncated at run start
    pub log_file: PathBuf,

    /// Narration voices to rotate through
    pub voices: Vec<Voice>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            log_file: PathBuf::from("newsreel.log"),
            voices: default_voices(),
        }
    }
}

impl RunSettings {
    /// Absolute path of the run log
    pub fn log_path(&self) -> PathBuf {
        self.workdir.join(&self.log_file)
    }
}

/// Configuration errors; all are fatal before any stage runs
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("required secret {var} is not set in the environment")]
    MissingSecret { var: String },

    #[error(transparent)]
    Pool(#[from] PoolError),
}
