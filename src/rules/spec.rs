//! # Rule specifications.
//!
//! A configuration lists rules as raw JSON objects. [`RuleSpec::parse`] pulls
//! out the two fields every rule has and keeps the whole object as
//! [`RuleOptions`] for the provider to read its own options from.
//!
//! ```json
//! { "rule": "DeleteByCheckbox", "label": "inbox", "databaseId": "…", "propertyName": "Done" }
//! ```
//!
//! ## Option types
//! Getters accept the native JSON type or a string holding it, so values coming
//! from environment-style configuration work too:
//!
//! | getter              | native     | from string                      |
//! |---------------------|------------|----------------------------------|
//! | `optional_string`   | string     |                                  |
//! | `optional_integer`  | number     | `"42"`                           |
//! | `optional_bool`     | bool       | `"true"` / `"false"` (any case)  |
//! | `optional_duration` |            | `"HH:MM:SS"`, `"D.HH:MM:SS"`     |
//!
//! A JSON `null` counts as absent.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::config::parse_duration;
use crate::error::ConfigError;

/// A rule entry as written in the configuration.
pub type RawRuleSpec = Map<String, Value>;

/// Key holding the rule name.
pub const RULE_KEY: &str = "rule";
/// Key holding the rule instance label.
pub const LABEL_KEY: &str = "label";

/// A parsed rule entry.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleSpec {
    /// The rule name; selects the provider.
    pub rule: String,
    /// The instance label.
    pub label: String,
    /// Every key of the entry, including `rule` and `label`.
    pub options: RuleOptions,
}

impl RuleSpec {
    /// Reads `rule` and `label` from a raw entry.
    pub fn parse(raw: &RawRuleSpec) -> Result<Self, ConfigError> {
        Ok(Self {
            rule: required_field(raw, RULE_KEY)?,
            label: required_field(raw, LABEL_KEY)?,
            options: RuleOptions::new(raw.clone()),
        })
    }
}

fn required_field(raw: &RawRuleSpec, key: &'static str) -> Result<String, ConfigError> {
    match raw.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(ConfigError::MissingField { key }),
    }
}

/// Typed access to a rule's options.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuleOptions {
    raw: RawRuleSpec,
}

impl RuleOptions {
    /// Wraps a raw option map.
    pub fn new(raw: RawRuleSpec) -> Self {
        Self { raw }
    }

    fn value(&self, key: &str) -> Option<&Value> {
        self.raw.get(key).filter(|v| !v.is_null())
    }

    /// Reads a string option.
    pub fn optional_string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(invalid(key, "string")),
        }
    }

    /// Reads an integer option.
    pub fn optional_integer(&self, key: &str) -> Result<Option<i64>, ConfigError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| invalid(key, "integer")),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| invalid(key, "integer")),
            Some(_) => Err(invalid(key, "integer")),
        }
    }

    /// Reads a boolean option.
    pub fn optional_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(Some(true)),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(Some(false)),
            Some(Value::String(_)) => Err(invalid(key, "'true' or 'false'")),
            Some(_) => Err(invalid(key, "bool")),
        }
    }

    /// Reads a duration option.
    pub fn optional_duration(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::String(s)) => parse_duration(s)
                .map(Some)
                .ok_or_else(|| invalid(key, "'HH:MM:SS'")),
            Some(_) => Err(invalid(key, "duration string")),
        }
    }

    /// Reads a required string option.
    pub fn string(&self, key: &str) -> Result<String, ConfigError> {
        self.optional_string(key)?.ok_or_else(|| missing(key))
    }

    /// Reads a required integer option.
    pub fn integer(&self, key: &str) -> Result<i64, ConfigError> {
        self.optional_integer(key)?.ok_or_else(|| missing(key))
    }
}

fn invalid(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidOption {
        key: key.to_string(),
        expected,
    }
}

fn missing(key: &str) -> ConfigError {
    ConfigError::MissingOption {
        key: key.to_string(),
    }
}
