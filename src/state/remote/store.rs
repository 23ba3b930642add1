//! # RemoteStateStore: write-back overlay over a [`KvTable`].
//!
//! Reads go to the overlay first and fall through to a consistent point read.
//! Writes only touch the overlay; the overlay is pushed to the table in
//! batches when a run completes.
//!
//! ## Flush
//! ```text
//! on_run_finished(dry_run)
//!   ├─ dry run or empty overlay ─► clear overlay, return
//!   └─ queue = overlay as put/delete ops
//!        loop while queue not empty:
//!          chunk = up to 25 ops ─► batch_write (RetryPolicy)
//!            ├─ Err(e)                    ─► return Err (overlay already cleared)
//!            ├─ unprocessed, round < 5    ─► round += 1, requeue, sleep(round * 500ms)
//!            ├─ unprocessed, round == 5   ─► error!, drop those ops, next chunk
//!            └─ all processed             ─► next chunk
//! ```
//!
//! ## Rules
//! - The overlay is empty once a flush returns, whatever the outcome.
//! - A key that was not found remotely is not cached; the next read queries again.
//! - The round counter is shared by every chunk of one flush.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::select;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{StateError, TableError};
use crate::notify::{CompletionBus, ListenerId, RunListener};
use crate::policies::{BackoffPolicy, RetryPolicy};
use crate::state::remote::table::{KvTable, MAX_BATCH_OPS, TableKey, WriteOp};
use crate::state::{PendingEntry, Scope, StateKey, StateStore};

/// Rounds of resubmitting unprocessed operations before they are dropped.
pub const MAX_UNPROCESSED_ROUNDS: u32 = 5;

const ROUND_DELAY_STEP: Duration = Duration::from_millis(500);

/// [`StateStore`] backed by a remote [`KvTable`] with a write-back overlay.
pub struct RemoteStateStore {
    table: Arc<dyn KvTable>,
    overlay: Mutex<HashMap<StateKey, PendingEntry>>,
    retry: RetryPolicy,
    rounds: BackoffPolicy,
    bus: CompletionBus,
    listener: ListenerId,
}

impl RemoteStateStore {
    /// Creates a store over `table` with the default [`RetryPolicy`] and registers it on `bus`.
    pub fn new(table: Arc<dyn KvTable>, bus: &CompletionBus) -> Arc<Self> {
        Self::with_retry_policy(table, RetryPolicy::default(), bus)
    }

    /// Same as [`RemoteStateStore::new`] with an explicit policy for table calls.
    pub fn with_retry_policy(
        table: Arc<dyn KvTable>,
        retry: RetryPolicy,
        bus: &CompletionBus,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Self>| {
            let listener = bus.register_weak(me.clone());
            Self {
                table,
                overlay: Mutex::new(HashMap::new()),
                retry,
                rounds: BackoffPolicy::linear(ROUND_DELAY_STEP, Duration::from_secs(60)),
                bus: bus.clone(),
                listener,
            }
        })
    }

    /// Number of changes waiting for the next flush.
    pub async fn pending(&self) -> usize {
        self.overlay.lock().await.len()
    }

    async fn lock(
        &self,
        ctx: &CancellationToken,
    ) -> Result<MutexGuard<'_, HashMap<StateKey, PendingEntry>>, StateError> {
        select! {
            biased;
            _ = ctx.cancelled() => Err(StateError::Cancelled),
            guard = self.overlay.lock() => Ok(guard),
        }
    }

    /// Pushes the overlay to the table and empties it.
    ///
    /// Ops still unprocessed once the rounds are exhausted are logged and
    /// dropped; the rest of the queue is still written. A table error that survives the retry policy is returned.
    pub async fn flush(&self, dry_run: bool, ctx: &CancellationToken) -> Result<(), StateError> {
        let mut overlay = self.lock(ctx).await?;
        let pending = std::mem::take(&mut *overlay);

        if dry_run {
            if !pending.is_empty() {
                info!(discarded = pending.len(), "dry run, skipping state write");
            }
            return Ok(());
        }
        if pending.is_empty() {
            debug!("no pending state changes");
            return Ok(());
        }

        let queue = pending
            .into_iter()
            .map(|(key, entry)| {
                let key = TableKey::from(&key);
                match entry {
                    PendingEntry::Value(value) => WriteOp::Put { key, value },
                    PendingEntry::Tombstone => WriteOp::Delete { key },
                }
            })
            .collect();

        self.write_all(queue, ctx).await
    }

    async fn write_all(
        &self,
        mut queue: VecDeque<WriteOp>,
        ctx: &CancellationToken,
    ) -> Result<(), StateError> {
        let mut round: u32 = 0;

        while !queue.is_empty() {
            let take = queue.len().min(MAX_BATCH_OPS);
            let chunk: Vec<WriteOp> = queue.drain(..take).collect();
            info!(ops = chunk.len(), "writing state batch");

            let out = self
                .retry
                .run(ctx, || self.table.batch_write(chunk.clone()))
                .await
                .map_err(table_error)?;

            if out.unprocessed.is_empty() {
                continue;
            }

            if round >= MAX_UNPROCESSED_ROUNDS {
                error!(
                    dropped = out.unprocessed.len(),
                    remaining = queue.len(),
                    rounds = round,
                    "state batch still unprocessed after retries, dropping it"
                );
                continue;
            }

            round += 1;
            warn!(
                unprocessed = out.unprocessed.len(),
                round, "state batch partially processed, requeueing"
            );
            queue.extend(out.unprocessed);

            let delay = self.rounds.next(round - 1);
            select! {
                biased;
                _ = ctx.cancelled() => return Err(StateError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        Ok(())
    }
}

fn table_error(err: TableError) -> StateError {
    match err {
        TableError::Cancelled => StateError::Cancelled,
        other => StateError::Table(other),
    }
}

#[async_trait]
impl StateStore for RemoteStateStore {
    async fn get_string(
        &self,
        scope: &Scope,
        key: &str,
        ctx: &CancellationToken,
    ) -> Result<Option<String>, StateError> {
        let state_key = scope.key(key);
        {
            let overlay = self.lock(ctx).await?;
            if let Some(entry) = overlay.get(&state_key) {
                trace!(%scope, key, "state overlay hit");
                return Ok(entry.as_value().map(str::to_owned));
            }
        }

        trace!(%scope, key, "state overlay miss, reading table");
        let table_key = TableKey::from(&state_key);
        self.retry
            .run(ctx, || self.table.get_item(&table_key))
            .await
            .map_err(table_error)
    }

    async fn set_string(
        &self,
        scope: &Scope,
        key: &str,
        value: String,
        ctx: &CancellationToken,
    ) -> Result<(), StateError> {
        self.lock(ctx)
            .await?
            .insert(scope.key(key), PendingEntry::Value(value));
        Ok(())
    }

    async fn remove_string(
        &self,
        scope: &Scope,
        key: &str,
        ctx: &CancellationToken,
    ) -> Result<(), StateError> {
        self.lock(ctx)
            .await?
            .insert(scope.key(key), PendingEntry::Tombstone);
        Ok(())
    }
}

#[async_trait]
impl RunListener for RemoteStateStore {
    async fn on_run_finished(
        &self,
        dry_run: bool,
        ctx: &CancellationToken,
    ) -> Result<(), StateError> {
        self.flush(dry_run, ctx).await
    }

    async fn on_run_aborted(&self) {
        let mut overlay = self.overlay.lock().await;
        if !overlay.is_empty() {
            warn!(
                discarded = overlay.len(),
                "discarding state changes of the aborted run"
            );
            overlay.clear();
        }
    }

    fn name(&self) -> &'static str {
        "remote_state_store"
    }
}

impl Drop for RemoteStateStore {
    fn drop(&mut self) {
        self.bus.unregister(self.listener);
    }
}
