//! # Rule providers and activation.
//!
//! A [`RuleProvider`] turns a [`RuleSpec`] into a runnable [`Rule`](crate::rules::Rule).
//! [`RuleRegistry`] maps rule names to providers and activates the configured
//! entries in order.
//!
//! ```text
//! RawRuleSpec ──parse──► RuleSpec ──lookup(rule)──► RuleProvider
//!                                                       │ build(spec, StateHandle(rule, label))
//!                                                       ▼
//!                                                    RuleRef
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::ConfigError;
use crate::rules::{RawRuleSpec, RuleRef, RuleSpec};
use crate::state::{Scope, StateHandle, StateStore};

/// Builds rules of one kind.
pub trait RuleProvider: Send + Sync + 'static {
    /// The rule name this provider answers to.
    fn name(&self) -> &str;

    /// Builds a rule instance from its specification.
    ///
    /// `state` is already scoped to `(spec.rule, spec.label)`.
    fn build(&self, spec: &RuleSpec, state: StateHandle) -> Result<RuleRef, ConfigError>;
}

/// Name-indexed set of [`RuleProvider`]s.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    providers: HashMap<String, Arc<dyn RuleProvider>>,
}

impl RuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider. A provider with the same name is replaced.
    pub fn with_provider(mut self, provider: Arc<dyn RuleProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Adds a provider. A provider with the same name is replaced.
    pub fn register(&mut self, provider: Arc<dyn RuleProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// True if a provider answers to `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Parses one entry and builds its rule.
    pub fn activate(
        &self,
        raw: &RawRuleSpec,
        store: &Arc<dyn StateStore>,
    ) -> Result<RuleRef, ConfigError> {
        let spec = RuleSpec::parse(raw)?;
        let provider = self
            .providers
            .get(&spec.rule)
            .ok_or_else(|| ConfigError::UnknownRule {
                name: spec.rule.clone(),
            })?;

        let state = StateHandle::new(Arc::clone(store), Scope::new(&spec.rule, &spec.label));
        let rule = provider.build(&spec, state)?;
        debug!(rule = %spec.rule, label = %spec.label, "rule activated");
        Ok(rule)
    }

    /// Activates every entry in configuration order, failing on the first bad one.
    pub fn activate_all(
        &self,
        raw: &[RawRuleSpec],
        store: &Arc<dyn StateStore>,
    ) -> Result<Vec<RuleRef>, ConfigError> {
        raw.iter().map(|r| self.activate(r, store)).collect()
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.providers.keys().collect();
        names.sort();
        f.debug_struct("RuleRegistry")
            .field("providers", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalOptions;
    use crate::error::RuleError;
    use crate::notify::CompletionBus;
    use crate::rules::{ClientRef, Rule, RuleFn};
    use crate::state::FileStateStore;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    struct Cursor;

    impl RuleProvider for Cursor {
        fn name(&self) -> &str {
            "Cursor"
        }

        fn build(&self, spec: &RuleSpec, state: StateHandle) -> Result<RuleRef, ConfigError> {
            let value = spec.options.string("value")?;
            Ok(RuleFn::arc(
                spec.rule.clone(),
                spec.label.clone(),
                move |_client: ClientRef, _opts: GlobalOptions, ctx: CancellationToken| {
                    let state = state.clone();
                    let value = value.clone();
                    async move {
                        state.set("cursor", value, &ctx).await?;
                        Ok::<_, RuleError>(())
                    }
                },
            ))
        }
    }

    fn raw(v: serde_json::Value) -> RawRuleSpec {
        v.as_object().cloned().unwrap()
    }

    fn store() -> Arc<dyn StateStore> {
        FileStateStore::in_memory(&CompletionBus::new())
    }

    #[test]
    fn test_unknown_rule() {
        let registry = RuleRegistry::new().with_provider(Arc::new(Cursor));
        let err = registry
            .activate(&raw(json!({ "rule": "Nope", "label": "x" })), &store())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::UnknownRule { ref name } if name == "Nope"));
    }

    #[test]
    fn test_provider_option_errors_surface() {
        let registry = RuleRegistry::new().with_provider(Arc::new(Cursor));
        let err = registry
            .activate(&raw(json!({ "rule": "Cursor", "label": "x" })), &store())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::MissingOption { .. }));
    }

    #[test]
    fn test_activate_all_keeps_order() {
        let registry = RuleRegistry::new().with_provider(Arc::new(Cursor));
        let rules = registry
            .activate_all(
                &[
                    raw(json!({ "rule": "Cursor", "label": "b", "value": "1" })),
                    raw(json!({ "rule": "Cursor", "label": "a", "value": "2" })),
                ],
                &store(),
            )
            .unwrap();
        let labels: Vec<_> = rules.iter().map(|r| r.label().to_string()).collect();
        assert_eq!(labels, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_rule_state_is_scoped_to_label() {
        struct NoClient;

        #[async_trait::async_trait]
        impl crate::rules::DocumentClient for NoClient {
            async fn query_database(
                &self,
                _: &str,
                _: &serde_json::Value,
                _: &CancellationToken,
            ) -> Result<serde_json::Value, RuleError> {
                Ok(serde_json::Value::Null)
            }

            async fn archive_page(&self, _: &str, _: &CancellationToken) -> Result<(), RuleError> {
                Ok(())
            }
        }

        let registry = RuleRegistry::new().with_provider(Arc::new(Cursor));
        let store = store();
        let rule = registry
            .activate(
                &raw(json!({ "rule": "Cursor", "label": "inbox", "value": "7" })),
                &store,
            )
            .unwrap();
        let ctx = CancellationToken::new();
        rule.execute(Arc::new(NoClient), &GlobalOptions::default(), ctx.clone())
            .await
            .unwrap();

        let scope = Scope::new("Cursor", "inbox");
        assert_eq!(
            store.get_string(&scope, "cursor", &ctx).await.unwrap(),
            Some("7".to_string())
        );
        let other = Scope::new("Cursor", "archive");
        assert_eq!(store.get_string(&other, "cursor", &ctx).await.unwrap(), None);
    }
}
