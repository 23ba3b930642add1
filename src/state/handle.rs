//! # Scoped state handle.
//!
//! [`StateHandle`] binds a [`StateStore`] to one [`Scope`]. Rules receive a
//! handle at activation, which keeps every rule instance inside its own
//! `(rule, label)` namespace.
//!
//! Timestamps are stored as RFC 3339 strings with offset, e.g.
//! `2024-03-01T08:15:00.000000+00:00`.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use tokio_util::sync::CancellationToken;

use crate::error::StateError;
use crate::state::{Scope, StateStore};

/// A [`StateStore`] restricted to one scope.
#[derive(Clone)]
pub struct StateHandle {
    store: Arc<dyn StateStore>,
    scope: Scope,
}

impl StateHandle {
    /// Binds `store` to `scope`.
    pub fn new(store: Arc<dyn StateStore>, scope: Scope) -> Self {
        Self { store, scope }
    }

    /// The scope this handle writes to.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// See [`StateStore::get_string`].
    pub async fn get(&self, key: &str, ctx: &CancellationToken) -> Result<Option<String>, StateError> {
        self.store.get_string(&self.scope, key, ctx).await
    }

    /// See [`StateStore::set_string`].
    pub async fn set(
        &self,
        key: &str,
        value: impl Into<String>,
        ctx: &CancellationToken,
    ) -> Result<(), StateError> {
        self.store
            .set_string(&self.scope, key, value.into(), ctx)
            .await
    }

    /// See [`StateStore::remove_string`].
    pub async fn remove(&self, key: &str, ctx: &CancellationToken) -> Result<(), StateError> {
        self.store.remove_string(&self.scope, key, ctx).await
    }

    /// Reads a timestamp written by [`StateHandle::set_datetime`].
    pub async fn get_datetime(
        &self,
        key: &str,
        ctx: &CancellationToken,
    ) -> Result<Option<DateTime<FixedOffset>>, StateError> {
        let Some(raw) = self.get(key, ctx).await? else {
            return Ok(None);
        };
        DateTime::parse_from_rfc3339(&raw)
            .map(Some)
            .map_err(|e| StateError::InvalidValue {
                key: key.to_string(),
                error: e.to_string(),
            })
    }

    /// Stores a timestamp, keeping its offset.
    pub async fn set_datetime(
        &self,
        key: &str,
        value: DateTime<FixedOffset>,
        ctx: &CancellationToken,
    ) -> Result<(), StateError> {
        let raw = value.to_rfc3339_opts(SecondsFormat::Micros, false);
        self.set(key, raw, ctx).await
    }
}
