//! # FileStateStore: state kept in one JSON file.
//!
//! The whole state is one JSON object mapping encoded keys
//! (see [`StateKey::encode`]) to string values. The file is read lazily on
//! first access and rewritten as a whole on flush.
//!
//! ## Lifecycle
//! ```text
//! Unloaded ── first get/set/remove ──► Loaded { data, dirty }
//!    ▲                                   │
//!    └──────────── run aborted ──────────┘   (pending changes discarded, file re-read later)
//!
//! run finished (not dry) ─► flush: write file if dirty, clear dirty on success
//! drop                   ─► flush synchronously, then unregister from the bus
//! ```
//!
//! ## Rules
//! - A missing, unreadable, corrupt or `null` file yields an empty map; the
//!   failure is logged, never returned. State is a cache, not a system of record.
//! - Without a configured path the store is purely in-memory; flush only marks
//!   the current map as the one an aborted run returns to.
//! - Entries whose key cannot be decoded are dropped at load time.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::select;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::StateError;
use crate::notify::{CompletionBus, ListenerId, RunListener};
use crate::state::{Scope, StateKey, StateStore};

#[derive(Default)]
struct FileState {
    data: BTreeMap<String, String>,
    /// Last flushed map of an in-memory store; what an aborted run restores.
    committed: BTreeMap<String, String>,
    loaded: bool,
    dirty: bool,
}

/// [`StateStore`] persisted to a single JSON file.
pub struct FileStateStore {
    path: Option<PathBuf>,
    state: Mutex<FileState>,
    bus: CompletionBus,
    listener: ListenerId,
}

impl FileStateStore {
    /// Creates a store backed by `path` and registers it on `bus`.
    ///
    /// Nothing is read until the first access.
    pub fn new(path: impl Into<PathBuf>, bus: &CompletionBus) -> Arc<Self> {
        Self::build(Some(path.into()), bus)
    }

    /// Creates a store that never touches the disk.
    pub fn in_memory(bus: &CompletionBus) -> Arc<Self> {
        Self::build(None, bus)
    }

    /// Creates a file-backed store if `path` is set, an in-memory one otherwise.
    pub fn from_optional_path(path: Option<PathBuf>, bus: &CompletionBus) -> Arc<Self> {
        Self::build(path, bus)
    }

    fn build(path: Option<PathBuf>, bus: &CompletionBus) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Self>| {
            let listener = bus.register_weak(me.clone());
            Self {
                path,
                state: Mutex::new(FileState::default()),
                bus: bus.clone(),
                listener,
            }
        })
    }

    /// The configured file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes the map to the file if anything changed since the last write.
    ///
    /// An in-memory store only records the map as the state an aborted run
    /// falls back to.
    pub async fn flush(&self, ctx: &CancellationToken) -> Result<(), StateError> {
        let mut state = self.lock(ctx).await?;
        let Some(path) = self.path.as_deref() else {
            if state.dirty {
                state.committed = state.data.clone();
                state.dirty = false;
                debug!(entries = state.committed.len(), "in-memory state committed");
            }
            return Ok(());
        };
        if !state.dirty {
            debug!(?path, "state unchanged, skipping write");
            return Ok(());
        }

        let json = serde_json::to_string(&state.data)?;
        tokio::fs::write(path, json)
            .await
            .map_err(|source| StateError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        state.dirty = false;
        info!(?path, entries = state.data.len(), "state file written");
        Ok(())
    }

    fn flush_blocking(&mut self) -> Result<(), StateError> {
        let state = self.state.get_mut();
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        if !state.dirty {
            return Ok(());
        }

        let json = serde_json::to_string(&state.data)?;
        std::fs::write(path, json).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        state.dirty = false;
        info!(?path, entries = state.data.len(), "state file written on shutdown");
        Ok(())
    }

    async fn lock(&self, ctx: &CancellationToken) -> Result<MutexGuard<'_, FileState>, StateError> {
        select! {
            biased;
            _ = ctx.cancelled() => Err(StateError::Cancelled),
            guard = self.state.lock() => Ok(guard),
        }
    }

    /// Locks the state and loads the file on first use.
    async fn loaded(&self, ctx: &CancellationToken) -> Result<MutexGuard<'_, FileState>, StateError> {
        let mut state = self.lock(ctx).await?;
        if !state.loaded {
            if let Some(path) = self.path.as_deref() {
                state.data = load(path).await;
            }
            state.loaded = true;
            state.dirty = false;
        }
        Ok(state)
    }
}

async fn load(path: &Path) -> BTreeMap<String, String> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(?path, "state file does not exist yet, starting with blank state");
            return BTreeMap::new();
        }
        Err(e) => {
            error!(?path, error = %e, "failed to read state file, will use blank state");
            return BTreeMap::new();
        }
    };

    let parsed = match serde_json::from_str::<Option<BTreeMap<String, String>>>(&raw) {
        Ok(Some(map)) => map,
        Ok(None) => {
            error!(?path, "state file holds null, will use blank state");
            return BTreeMap::new();
        }
        Err(e) => {
            error!(?path, error = %e, "failed to parse state file, will use blank state");
            return BTreeMap::new();
        }
    };

    let total = parsed.len();
    let data: BTreeMap<String, String> = parsed
        .into_iter()
        .filter(|(k, _)| StateKey::decode(k).is_some())
        .collect();
    if data.len() != total {
        warn!(
            ?path,
            dropped = total - data.len(),
            "ignoring state entries with undecodable keys"
        );
    }
    debug!(?path, entries = data.len(), "state file loaded");
    data
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get_string(
        &self,
        scope: &Scope,
        key: &str,
        ctx: &CancellationToken,
    ) -> Result<Option<String>, StateError> {
        let state = self.loaded(ctx).await?;
        Ok(state.data.get(&scope.key(key).encode()).cloned())
    }

    async fn set_string(
        &self,
        scope: &Scope,
        key: &str,
        value: String,
        ctx: &CancellationToken,
    ) -> Result<(), StateError> {
        let mut state = self.loaded(ctx).await?;
        state.data.insert(scope.key(key).encode(), value);
        state.dirty = true;
        Ok(())
    }

    async fn remove_string(
        &self,
        scope: &Scope,
        key: &str,
        ctx: &CancellationToken,
    ) -> Result<(), StateError> {
        let mut state = self.loaded(ctx).await?;
        state.data.remove(&scope.key(key).encode());
        state.dirty = true;
        Ok(())
    }
}

#[async_trait]
impl RunListener for FileStateStore {
    async fn on_run_finished(
        &self,
        dry_run: bool,
        ctx: &CancellationToken,
    ) -> Result<(), StateError> {
        if dry_run {
            return Ok(());
        }
        self.flush(ctx).await
    }

    async fn on_run_aborted(&self) {
        let mut state = self.state.lock().await;
        if state.dirty {
            warn!(path = ?self.path, "discarding state changes of the aborted run");
        }
        if self.path.is_some() {
            *state = FileState::default();
        } else {
            state.data = state.committed.clone();
            state.dirty = false;
        }
    }

    fn name(&self) -> &'static str {
        "file_state_store"
    }
}

impl Drop for FileStateStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush_blocking() {
            error!(error = %e, label = e.as_label(), "failed to write state file on shutdown");
        }
        self.bus.unregister(self.listener);
    }
}
