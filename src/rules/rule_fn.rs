//! # Function-backed rule (`RuleFn`)
//!
//! [`RuleFn`] wraps a closure `F: Fn(ClientRef, GlobalOptions, CancellationToken) -> Fut`,
//! producing a fresh future per execution. Providers use it to build small
//! rules without a dedicated type; if the closure needs state between runs it
//! captures a [`StateHandle`](crate::state::StateHandle).
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use runvisor::{ClientRef, GlobalOptions, Rule, RuleError, RuleFn, RuleRef};
//!
//! let r: RuleRef = RuleFn::arc(
//!     "Noop",
//!     "default",
//!     |_client: ClientRef, _opts: GlobalOptions, _ctx: CancellationToken| async {
//!         Ok::<_, RuleError>(())
//!     },
//! );
//!
//! assert_eq!(r.name(), "Noop");
//! assert_eq!(r.label(), "default");
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::GlobalOptions;
use crate::error::RuleError;
use crate::rules::{ClientRef, Rule};

/// Function-backed rule implementation.
pub struct RuleFn<F> {
    name: Cow<'static, str>,
    label: Cow<'static, str>,
    f: F,
}

impl<F> RuleFn<F> {
    /// Creates a new function-backed rule.
    ///
    /// Prefer [`RuleFn::arc`] when you immediately need a [`RuleRef`](crate::rules::RuleRef).
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        label: impl Into<Cow<'static, str>>,
        f: F,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            f,
        }
    }

    /// Creates the rule and returns it as a shared handle.
    pub fn arc(
        name: impl Into<Cow<'static, str>>,
        label: impl Into<Cow<'static, str>>,
        f: F,
    ) -> Arc<Self> {
        Arc::new(Self::new(name, label, f))
    }
}

impl<F> fmt::Debug for RuleFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleFn")
            .field("name", &self.name)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> Rule for RuleFn<F>
where
    F: Fn(ClientRef, GlobalOptions, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), RuleError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.label
    }

    async fn execute(
        &self,
        client: ClientRef,
        options: &GlobalOptions,
        ctx: CancellationToken,
    ) -> Result<(), RuleError> {
        (self.f)(client, *options, ctx).await
    }
}
