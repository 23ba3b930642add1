//! # Run listener trait.
//!
//! [`RunListener`] is implemented by everything that must react to the end of
//! a run; both state stores use it to flush (or discard) their overlay.
//!
//! ## Rules
//! - Listeners are invoked concurrently; they must not rely on each other's order.
//! - A listener error does not stop the other listeners.
//! - `dry_run = true` means the run suppressed its mutations; nothing is persisted.
//!   The remote store drops its overlay, the file store keeps its changes unwritten.
//! - `on_run_aborted` fires when a rule failed; changes made during that run are thrown away.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StateError;

/// Reacts to the end of a coordinated run.
#[async_trait]
pub trait RunListener: Send + Sync + 'static {
    /// Called once per successfully completed run.
    async fn on_run_finished(&self, dry_run: bool, ctx: &CancellationToken)
    -> Result<(), StateError>;

    /// Called once per run that stopped on a failing rule.
    ///
    /// The default does nothing.
    async fn on_run_aborted(&self) {}

    /// Returns the listener name used in logs and [`PublishError`](crate::PublishError).
    ///
    /// The default uses `type_name::<Self>()`; override it with something short.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
