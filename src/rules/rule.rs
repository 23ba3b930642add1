//! # Rule abstraction.
//!
//! A [`Rule`] is one configured cleanup step. It has a stable
//! [`name`](Rule::name) (which provider built it), a human
//! [`label`](Rule::label) (which configuration entry it came from), and an
//! async [`execute`](Rule::execute) that receives the document client, the
//! global run options and a [`CancellationToken`].
//!
//! Rules keep state only through the [`StateHandle`](crate::state::StateHandle)
//! their provider gave them, scoped to `(name, label)`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::GlobalOptions;
use crate::error::RuleError;
use crate::rules::ClientRef;

/// Shared handle to an activated rule.
pub type RuleRef = Arc<dyn Rule>;

/// One activated cleanup rule.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use runvisor::{ClientRef, GlobalOptions, Rule, RuleError};
///
/// struct Noop;
///
/// #[async_trait]
/// impl Rule for Noop {
///     fn name(&self) -> &str { "Noop" }
///     fn label(&self) -> &str { "default" }
///
///     async fn execute(
///         &self,
///         _client: ClientRef,
///         options: &GlobalOptions,
///         ctx: CancellationToken,
///     ) -> Result<(), RuleError> {
///         if ctx.is_cancelled() {
///             return Err(RuleError::Cancelled);
///         }
///         if options.dry_run {
///             return Ok(());
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Rule: Send + Sync + 'static {
    /// Name of the rule kind, e.g. `DeleteByCheckbox`.
    fn name(&self) -> &str;

    /// Label of this configured instance.
    fn label(&self) -> &str;

    /// Runs the rule once.
    ///
    /// In a dry run the rule must not modify documents; state writes are fine,
    /// they are discarded at the end of the run.
    async fn execute(
        &self,
        client: ClientRef,
        options: &GlobalOptions,
        ctx: CancellationToken,
    ) -> Result<(), RuleError>;
}
