//! # Runtime configuration.
//!
//! [`Config`] is read from a JSON document and decides how the cleanup runs:
//! dry-run mode, how often to repeat, where state lives, and which rules run.
//!
//! ```json
//! {
//!   "dryRun": false,
//!   "runFrequency": "00:15:00",
//!   "stateFilePath": "/var/lib/runvisor/state.json",
//!   "rules": [
//!     { "rule": "DeleteByCheckbox", "label": "inbox", "propertyName": "Done" }
//!   ]
//! }
//! ```
//!
//! ## Sentinel values
//! - `run_frequency = 0s` → run once and stop (see [`Config::run_frequency`])
//! - `state_file_path = None` → state is kept in memory only
//!
//! Durations are written as `"HH:MM:SS"`, `"HH:MM"` or `"D.HH:MM:SS"`, with an
//! optional fraction on the seconds (`"00:00:01.5"`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::rules::RawRuleSpec;

/// Options every rule sees during a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    /// Rules must not modify documents and state is not persisted.
    pub dry_run: bool,
    /// Interval between runs; `None` for a single run.
    pub run_frequency: Option<Duration>,
}

/// Top-level configuration.
///
/// ## Notes
/// All fields are public. Prefer the helper accessors to avoid sprinkling
/// sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Run rules without modifying documents or persisting state.
    pub dry_run: bool,

    /// Interval between runs (`0s` = run once).
    #[serde(deserialize_with = "deserialize_duration")]
    pub run_frequency: Duration,

    /// JSON state file. Without it, state only lives as long as the process.
    pub state_file_path: Option<PathBuf>,

    /// Name of the remote state table, when state is kept remotely.
    pub table_name: Option<String>,

    /// Rule entries in execution order.
    pub rules: Vec<RawRuleSpec>,
}

impl Config {
    /// Parses a configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Returns the run interval, or `None` for a single run.
    pub fn run_frequency(&self) -> Option<Duration> {
        (self.run_frequency > Duration::ZERO).then_some(self.run_frequency)
    }

    /// Options handed to every rule.
    pub fn global_options(&self) -> GlobalOptions {
        GlobalOptions {
            dry_run: self.dry_run,
            run_frequency: self.run_frequency(),
        }
    }
}

fn deserialize_duration<'de, D>(de: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(de)? {
        None => Ok(Duration::ZERO),
        Some(s) => parse_duration(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid duration '{s}' (expected 'HH:MM:SS')"))
        }),
    }
}

/// Parses `"D"`, `"HH:MM"`, `"HH:MM:SS"` or `"D.HH:MM:SS"`, with an optional
/// seconds fraction.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use runvisor::config::parse_duration;
///
/// assert_eq!(parse_duration("00:15:00"), Some(Duration::from_secs(900)));
/// assert_eq!(parse_duration("1.02:00:00"), Some(Duration::from_secs(93_600)));
/// assert_eq!(parse_duration("25:00:00"), None);
/// ```
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (head, rest) = match s.split_once(':') {
        None => {
            let days: u64 = digits(s)?;
            return Some(Duration::from_secs(days.checked_mul(86_400)?));
        }
        Some(split) => split,
    };

    let (days, hours) = match head.split_once('.') {
        Some((d, h)) => (digits(d)?, h),
        None => (0, head),
    };
    let hours = bounded(hours, 23)?;

    let (minutes, seconds) = match rest.split_once(':') {
        Some((m, sec)) => (bounded(m, 59)?, Some(sec)),
        None => (bounded(rest, 59)?, None),
    };

    let (secs, nanos) = match seconds {
        None => (0, 0),
        Some(sec) => match sec.split_once('.') {
            Some((whole, frac)) => (bounded(whole, 59)?, fraction_nanos(frac)?),
            None => (bounded(sec, 59)?, 0),
        },
    };

    let total = days
        .checked_mul(86_400)?
        .checked_add(hours * 3_600 + minutes * 60 + secs)?;
    Some(Duration::new(total, nanos))
}

fn digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn bounded(s: &str, max: u64) -> Option<u64> {
    digits(s).filter(|v| *v <= max)
}

fn fraction_nanos(frac: &str) -> Option<u32> {
    if frac.is_empty() || frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let padded = format!("{frac:0<9}");
    padded.parse().ok()
}
