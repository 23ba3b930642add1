//! # State store trait.
//!
//! [`StateStore`] is the only way rules read and write persistent state.
//!
//! ## Rules
//! - `set_string`/`remove_string` only touch the in-process overlay; they never
//!   wait on remote I/O and return quickly.
//! - `get_string` may wait on I/O, but only when the overlay has no entry for the key.
//! - Changes become durable when the store is flushed after a successful, non-dry run.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StateError;
use crate::state::Scope;

/// Key/value state addressed by `(scope, key)`.
#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    /// Reads a value; `Ok(None)` if it does not exist or was removed in the overlay.
    async fn get_string(
        &self,
        scope: &Scope,
        key: &str,
        ctx: &CancellationToken,
    ) -> Result<Option<String>, StateError>;

    /// Records a value in the overlay.
    async fn set_string(
        &self,
        scope: &Scope,
        key: &str,
        value: String,
        ctx: &CancellationToken,
    ) -> Result<(), StateError>;

    /// Records a removal in the overlay.
    async fn remove_string(
        &self,
        scope: &Scope,
        key: &str,
        ctx: &CancellationToken,
    ) -> Result<(), StateError>;
}
