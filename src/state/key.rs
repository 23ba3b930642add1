//! # State addressing.
//!
//! - [`Scope`]: one configured rule instance, `(rule, label)`.
//! - [`StateKey`]: a scope plus an opaque key.
//! - [`PendingEntry`]: one not-yet-flushed change in a write-back overlay.
//!
//! The file store flattens a [`StateKey`] into a single string:
//! ```text
//! rule ␜ label ␝ key        (␜ = 0x1C, ␝ = 0x1D)
//! ```

use std::fmt;

const RULE_SEPARATOR: char = '\x1c';
const LABEL_SEPARATOR: char = '\x1d';

/// One configured rule instance.
///
/// Two instances of the same rule with different labels have independent state.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Scope {
    rule: String,
    label: String,
}

impl Scope {
    /// Creates a scope for rule `rule` configured with label `label`.
    pub fn new(rule: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            label: label.into(),
        }
    }

    /// The rule name.
    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// The rule instance label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Addresses `key` inside this scope.
    pub fn key(&self, key: impl Into<String>) -> StateKey {
        StateKey {
            scope: self.clone(),
            key: key.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.rule, self.label)
    }
}

/// Full address of one state value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StateKey {
    /// The owning rule instance.
    pub scope: Scope,
    /// Opaque key inside the scope.
    pub key: String,
}

impl StateKey {
    /// Flattens the key for the single-file store.
    pub fn encode(&self) -> String {
        let mut s = String::with_capacity(
            self.scope.rule.len() + self.scope.label.len() + self.key.len() + 2,
        );
        s.push_str(&self.scope.rule);
        s.push(RULE_SEPARATOR);
        s.push_str(&self.scope.label);
        s.push(LABEL_SEPARATOR);
        s.push_str(&self.key);
        s
    }

    /// Reverses [`StateKey::encode`]. Returns `None` if a separator is missing.
    pub fn decode(encoded: &str) -> Option<Self> {
        let (rule, rest) = encoded.split_once(RULE_SEPARATOR)?;
        let (label, key) = rest.split_once(LABEL_SEPARATOR)?;
        Some(Scope::new(rule, label).key(key))
    }
}

/// A not-yet-flushed change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingEntry {
    /// The key was set to this value.
    Value(String),
    /// The key was removed.
    Tombstone,
}

impl PendingEntry {
    /// The value a read should observe (`None` for a tombstone).
    pub fn as_value(&self) -> Option<&str> {
        match self {
            PendingEntry::Value(v) => Some(v),
            PendingEntry::Tombstone => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let k = Scope::new("DeleteByCheckbox", "inbox").key("last_run");
        assert_eq!(k.encode(), "DeleteByCheckbox\u{1c}inbox\u{1d}last_run");
    }

    #[test]
    fn test_decode_keeps_separators_in_key() {
        let k = Scope::new("rule", "label").key("a\u{1c}b\u{1d}c");
        assert_eq!(StateKey::decode(&k.encode()), Some(k));
    }

    #[test]
    fn test_decode_rejects_plain_strings() {
        assert_eq!(StateKey::decode("no separators"), None);
        assert_eq!(StateKey::decode("rule\u{1c}label only"), None);
    }

    #[test]
    fn test_tombstone_reads_as_missing() {
        assert_eq!(PendingEntry::Tombstone.as_value(), None);
        assert_eq!(PendingEntry::Value("v".into()).as_value(), Some("v"));
    }
}
