//! Error types used by the run coordinator, the completion bus and the state stores.
//!
//! - [`LockError`]: acquiring a [`RunLock`](crate::RunLock) failed.
//! - [`TableError`]: a call against the backing key/value table failed.
//! - [`StateError`]: a [`StateStore`](crate::StateStore) operation failed.
//! - [`ConfigError`]: the configuration or a rule specification is invalid.
//! - [`RuleError`]: a rule execution failed.
//! - [`PublishError`]: a completion listener failed.
//! - [`RunError`]: what [`RunCoordinator::run`](crate::RunCoordinator::run) returns.
//!
//! Every enum provides `as_label` (stable snake_case) for logs.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced while acquiring a lock.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    /// The lock stayed held for the whole wait.
    #[error("lock still held after {timeout:?}")]
    TimedOut {
        /// The bounded wait that elapsed.
        timeout: Duration,
    },

    /// The caller cancelled the wait.
    #[error("lock acquisition cancelled")]
    Cancelled,
}

impl LockError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            LockError::TimedOut { .. } => "lock_timed_out",
            LockError::Cancelled => "lock_cancelled",
        }
    }
}

/// # Errors produced by the backing key/value table.
///
/// Transport failures and per-attempt timeouts are retryable, see [`TableError::is_retryable`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// The request did not reach the table or the table answered with a transient failure.
    #[error("transport failure: {error}")]
    Transport {
        /// The underlying error message.
        error: String,
    },

    /// A single attempt exceeded its time budget.
    #[error("attempt timed out after {timeout:?}")]
    Timeout {
        /// The per-attempt timeout.
        timeout: Duration,
    },

    /// The table refused the request as malformed (never retried).
    #[error("request rejected: {error}")]
    Rejected {
        /// Why the request was refused.
        error: String,
    },

    /// The caller cancelled the operation.
    #[error("table operation cancelled")]
    Cancelled,
}

impl TableError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TableError::Transport { .. } => "table_transport",
            TableError::Timeout { .. } => "table_timeout",
            TableError::Rejected { .. } => "table_rejected",
            TableError::Cancelled => "table_cancelled",
        }
    }

    /// Indicates whether another attempt may succeed.
    ///
    /// Returns `true` for [`TableError::Transport`] and [`TableError::Timeout`].
    ///
    /// # Example
    /// ```
    /// use runvisor::TableError;
    ///
    /// assert!(TableError::Transport { error: "reset".into() }.is_retryable());
    /// assert!(!TableError::Cancelled.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, TableError::Transport { .. } | TableError::Timeout { .. })
    }
}

/// # Errors produced by state stores.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StateError {
    /// Reading or writing the state file failed.
    #[error("state file {path:?}: {source}")]
    Io {
        /// The configured state file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The in-memory map could not be serialized.
    #[error("state serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The backing table failed after the resilience policy gave up.
    #[error("backing table: {0}")]
    Table(#[from] TableError),

    /// A stored value does not have the expected shape.
    #[error("invalid stored value for key {key:?}: {error}")]
    InvalidValue {
        /// The state key.
        key: String,
        /// What was wrong with it.
        error: String,
    },

    /// The caller cancelled the operation.
    #[error("state operation cancelled")]
    Cancelled,
}

impl StateError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StateError::Io { .. } => "state_io",
            StateError::Serialize(_) => "state_serialize",
            StateError::Table(_) => "state_table",
            StateError::InvalidValue { .. } => "state_invalid_value",
            StateError::Cancelled => "state_cancelled",
        }
    }
}

/// # Configuration errors.
///
/// Always fatal for the run that hits them; never retried.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No rule is configured.
    #[error("rule configuration is missing, check your configuration file")]
    NoRules,

    /// The configuration file could not be read.
    #[error("cannot read configuration {path:?}: {source}")]
    Read {
        /// The configuration path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration document is not valid.
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A required field of a rule specification is absent.
    #[error("{key} is required")]
    MissingField {
        /// The missing field.
        key: &'static str,
    },

    /// A required rule option is absent.
    #[error("missing required option '{key}'")]
    MissingOption {
        /// The option name.
        key: String,
    },

    /// A rule option has the wrong type or format.
    #[error("option '{key}' is invalid (expected {expected})")]
    InvalidOption {
        /// The option name.
        key: String,
        /// A short description of the accepted shape.
        expected: &'static str,
    },

    /// No provider is registered for the rule name.
    #[error("the rule provider for '{name}' does not exist")]
    UnknownRule {
        /// The configured rule name.
        name: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::NoRules => "config_no_rules",
            ConfigError::Read { .. } => "config_read",
            ConfigError::Parse(_) => "config_parse",
            ConfigError::MissingField { .. } => "config_missing_field",
            ConfigError::MissingOption { .. } => "config_missing_option",
            ConfigError::InvalidOption { .. } => "config_invalid_option",
            ConfigError::UnknownRule { .. } => "config_unknown_rule",
        }
    }
}

/// # Errors produced by rule executions.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuleError {
    /// The rule failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The rule could not read or write its state.
    #[error("state access failed: {0}")]
    State(#[from] StateError),

    /// The rule observed cancellation and stopped.
    #[error("rule cancelled")]
    Cancelled,
}

impl RuleError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuleError::Fail { .. } => "rule_failed",
            RuleError::State(_) => "rule_state",
            RuleError::Cancelled => "rule_cancelled",
        }
    }
}

/// # Errors produced while notifying completion listeners.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PublishError {
    /// A listener returned an error.
    #[error("listener '{listener}' failed: {source}")]
    Listener {
        /// The listener name.
        listener: &'static str,
        /// The listener's error.
        #[source]
        source: StateError,
    },

    /// A listener panicked.
    #[error("listener '{listener}' panicked: {info}")]
    Panicked {
        /// The listener name.
        listener: &'static str,
        /// Panic payload, if it was a string.
        info: String,
    },
}

impl PublishError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            PublishError::Listener { .. } => "publish_listener_failed",
            PublishError::Panicked { .. } => "publish_listener_panicked",
        }
    }
}

/// # Errors returned by a coordinated run.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RunError {
    /// The configuration is invalid; the run did not start any rule.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Another run held the run lock for the whole wait.
    #[error("a cleanup is already running")]
    AlreadyRunning,

    /// The caller cancelled the run while it waited for the run lock.
    #[error("run cancelled")]
    Cancelled,

    /// A rule failed; the remaining rules were skipped and nothing was flushed.
    #[error("rule {rule} ({label}) failed: {source}")]
    Rule {
        /// Rule name.
        rule: String,
        /// Rule instance label.
        label: String,
        /// The rule's error.
        #[source]
        source: RuleError,
    },

    /// Every rule succeeded but a completion listener failed.
    #[error("completion publish failed: {0}")]
    Publish(#[from] PublishError),
}

impl RunError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use runvisor::RunError;
    ///
    /// assert_eq!(RunError::AlreadyRunning.as_label(), "run_already_running");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RunError::Config(_) => "run_config",
            RunError::AlreadyRunning => "run_already_running",
            RunError::Cancelled => "run_cancelled",
            RunError::Rule { .. } => "run_rule_failed",
            RunError::Publish(_) => "run_publish_failed",
        }
    }

    /// Indicates whether a scheduler may simply try again on its next trigger.
    pub fn is_transient(&self) -> bool {
        matches!(self, RunError::AlreadyRunning)
    }
}

impl From<LockError> for RunError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::TimedOut { .. } => RunError::AlreadyRunning,
            LockError::Cancelled => RunError::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_retryable_kinds() {
        assert!(TableError::Transport { error: "x".into() }.is_retryable());
        assert!(
            TableError::Timeout {
                timeout: Duration::from_secs(10)
            }
            .is_retryable()
        );
        assert!(!TableError::Rejected { error: "x".into() }.is_retryable());
        assert!(!TableError::Cancelled.is_retryable());
    }

    #[test]
    fn test_lock_error_maps_to_run_error() {
        let busy: RunError = LockError::TimedOut {
            timeout: Duration::from_secs(10),
        }
        .into();
        assert!(matches!(busy, RunError::AlreadyRunning));
        assert!(busy.is_transient());

        let cancelled: RunError = LockError::Cancelled.into();
        assert!(matches!(cancelled, RunError::Cancelled));
        assert!(!cancelled.is_transient());
    }

    #[test]
    fn test_already_running_message() {
        assert_eq!(
            RunError::AlreadyRunning.to_string(),
            "a cleanup is already running"
        );
    }
}
