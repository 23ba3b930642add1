//! # CompletionBus: fan-out of the run completion signal.
//!
//! [`CompletionBus`] keeps a registry of [`RunListener`]s and notifies all of
//! them when a run completes ([`CompletionBus::publish`]) or stops on a
//! failing rule ([`CompletionBus::publish_aborted`]).
//!
//! ## Architecture
//! ```text
//! publish(dry_run, ctx)
//!     │  snapshot listeners under the registry lock, then release it
//!     ├────────► listener 1 .on_run_finished() ─┐
//!     ├────────► listener 2 .on_run_finished() ─┼─► await all
//!     └────────► listener N .on_run_finished() ─┘
//!                                                └─► first failure (registration order) or Ok
//! ```
//!
//! ## Rules
//! - **Unordered**: listeners run concurrently; no relative order is guaranteed.
//! - **Run to completion**: one listener failing does not cancel the others.
//! - **Panic isolation**: a panicking listener is reported as [`PublishError::Panicked`].
//! - **Weak registry**: the bus holds weak references, so registering does not
//!   keep a store alive; listeners that were dropped without unregistering are skipped.
//! - **No dedup**: registering the same listener twice notifies it twice.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use futures::FutureExt;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::PublishError;
use crate::notify::RunListener;

/// Identifies one registration on a [`CompletionBus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    listener: Weak<dyn RunListener>,
}

#[derive(Default)]
struct Inner {
    listeners: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
}

/// Registry of completion listeners.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone, Default)]
pub struct CompletionBus {
    inner: Arc<Inner>,
}

impl CompletionBus {
    /// Creates a bus with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns the id needed to unregister it.
    pub fn register(&self, listener: &Arc<dyn RunListener>) -> ListenerId {
        self.register_weak(Arc::downgrade(listener))
    }

    /// Registers a listener that may not be fully constructed yet
    /// (see [`Arc::new_cyclic`]).
    pub fn register_weak(&self, listener: Weak<dyn RunListener>) -> ListenerId {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.registrations().push(Registration { id, listener });
        id
    }

    /// Removes a registration. Unknown ids are ignored.
    pub fn unregister(&self, id: ListenerId) {
        self.registrations().retain(|r| r.id != id);
    }

    /// Number of registrations (including ones whose listener was already dropped).
    pub fn len(&self) -> usize {
        self.registrations().len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.registrations().is_empty()
    }

    /// Notifies every live listener and waits for all of them.
    ///
    /// Returns the first failure in registration order after every listener has finished.
    pub async fn publish(&self, dry_run: bool, ctx: &CancellationToken) -> Result<(), PublishError> {
        let listeners = self.snapshot();

        debug!(listeners = listeners.len(), dry_run, "publishing run completion");

        let outcomes = join_all(listeners.into_iter().map(|listener| async move {
            let name = listener.name();
            let fut = listener.on_run_finished(dry_run, ctx);
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(source)) => Err(PublishError::Listener {
                    listener: name,
                    source,
                }),
                Err(panic) => Err(PublishError::Panicked {
                    listener: name,
                    info: panic_message(panic.as_ref()),
                }),
            }
        }))
        .await;

        let mut first = None;
        for err in outcomes.into_iter().filter_map(Result::err) {
            error!(error = %err, label = err.as_label(), "completion listener failed");
            first.get_or_insert(err);
        }
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Tells every live listener that the run stopped on a failing rule.
    pub async fn publish_aborted(&self) {
        let listeners = self.snapshot();
        debug!(listeners = listeners.len(), "publishing run abort");

        join_all(listeners.into_iter().map(|listener| async move {
            let name = listener.name();
            if let Err(panic) = AssertUnwindSafe(listener.on_run_aborted())
                .catch_unwind()
                .await
            {
                error!(
                    listener = name,
                    info = %panic_message(panic.as_ref()),
                    "run listener panicked while discarding state"
                );
            }
        }))
        .await;
    }

    fn snapshot(&self) -> Vec<Arc<dyn RunListener>> {
        self.registrations()
            .iter()
            .filter_map(|r| r.listener.upgrade())
            .collect()
    }

    fn registrations(&self) -> std::sync::MutexGuard<'_, Vec<Registration>> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
