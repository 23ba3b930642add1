//! # Cleanup rules.
//!
//! - [`Rule`]: one configured cleanup step, executed by the coordinator.
//! - [`RuleFn`]: closure-backed [`Rule`].
//! - [`RuleSpec`] / [`RuleOptions`]: a parsed configuration entry.
//! - [`RuleProvider`] / [`RuleRegistry`]: turn configuration entries into rules.
//! - [`DocumentClient`]: what rules may ask of the document database.

mod client;
mod registry;
mod rule;
mod rule_fn;
mod spec;

pub use client::{ClientRef, DocumentClient};
pub use registry::{RuleProvider, RuleRegistry};
pub use rule::{Rule, RuleRef};
pub use rule_fn::RuleFn;
pub use spec::{LABEL_KEY, RULE_KEY, RawRuleSpec, RuleOptions, RuleSpec};
