//! Calendar-scheduled credential rotation.
//!
//! Exhaustible third-party quotas (the speech-synthesis service bills per
//! calendar cycle) are split across multiple keys whose reset dates are
//! offset. The active key for a date is a pure function of the day of
//! month, so the same day always selects the same slot and no rotation
//! state needs to be persisted.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum number of slots a pool must carry to be worth rotating
pub const MIN_SLOTS: usize = 2;

/// Inclusive day-of-month range during which a slot is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRange {
    pub start: u32,
    pub end: u32,
}

impl DayRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, day: u32) -> bool {
        day >= self.start && day <= self.end
    }
}

/// One labeled credential slot in a pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSlot {
    /// Short label used in logs (never the key itself)
    pub label: String,

    /// Environment variable holding the key value
    pub env_var: String,

    /// Days of the month during which this slot is active
    pub days: DayRange,
}

/// A set of interchangeable secrets for one logical external dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialPool {
    /// Pool name, e.g. "elevenlabs"
    pub name: String,

    /// Labeled slots with disjoint day ranges covering the whole month
    pub slots: Vec<CredentialSlot>,
}

impl CredentialPool {
    /// Default speech-synthesis pool: two keys with offset billing resets
    pub fn elevenlabs() -> Self {
        Self {
            name: "elevenlabs".to_string(),
            slots: vec![
                CredentialSlot {
                    label: "first-half".to_string(),
                    env_var: "ELEVENLABS_API_KEY_1".to_string(),
                    days: DayRange::new(1, 15),
                },
                CredentialSlot {
                    label: "second-half".to_string(),
                    env_var: "ELEVENLABS_API_KEY_2".to_string(),
                    days: DayRange::new(16, 31),
                },
            ],
        }
    }

    /// Validate the pool shape: enough slots, ranges within 1..=31,
    /// pairwise disjoint, and jointly covering every calendar day.
    ///
    /// Partial configuration is rejected here, at startup, not discovered
    /// mid-run.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.slots.len() < MIN_SLOTS {
            return Err(PoolError::TooFewSlots {
                pool: self.name.clone(),
                actual: self.slots.len(),
                minimum: MIN_SLOTS,
            });
        }

        for slot in &self.slots {
            let days = slot.days;
            if days.start < 1 || days.end > 31 || days.start > days.end {
                return Err(PoolError::BadRange {
                    pool: self.name.clone(),
                    slot: slot.label.clone(),
                    start: days.start,
                    end: days.end,
                });
            }
        }

        // Every day of the month maps to exactly one slot
        for day in 1..=31u32 {
            let hits = self.slots.iter().filter(|s| s.days.contains(day)).count();
            match hits {
                0 => {
                    return Err(PoolError::Gap {
                        pool: self.name.clone(),
                        day,
                    })
                }
                1 => {}
                _ => {
                    return Err(PoolError::Overlap {
                        pool: self.name.clone(),
                        day,
                    })
                }
            }
        }

        Ok(())
    }

    /// The slot active on `date`.
    ///
    /// Pure in `date`: repeated calls with the same date return the same
    /// slot. Only fails if the pool was never validated.
    pub fn active_slot(&self, date: NaiveDate) -> Result<&CredentialSlot, PoolError> {
        let day = date.day();
        self.slots
            .iter()
            .find(|s| s.days.contains(day))
            .ok_or(PoolError::Gap {
                pool: self.name.clone(),
                day,
            })
    }
}

/// Credential pool configuration errors
#[derive(Debug, Clone, Error)]
pub enum PoolError {
    #[error("credential pool '{pool}' has {actual} slots, minimum is {minimum}")]
    TooFewSlots {
        pool: String,
        actual: usize,
        minimum: usize,
    },

    #[error("credential pool '{pool}' slot '{slot}' has invalid day range {start}-{end}")]
    BadRange {
        pool: String,
        slot: String,
        start: u32,
        end: u32,
    },

    #[error("credential pool '{pool}' covers no slot for day {day}")]
    Gap { pool: String, day: u32 },

    #[error("credential pool '{pool}' has overlapping slots on day {day}")]
    Overlap { pool: String, day: u32 },
}
