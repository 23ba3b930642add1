//! # Run completion notifications.
//!
//! ```text
//! RunCoordinator ── publish(dry_run) ──► CompletionBus ──► RunListener::on_run_finished()
//!                                                          │
//!                                                   ┌──────┴──────┐
//!                                                   ▼             ▼
//!                                            FileStateStore  RemoteStateStore
//!                                              (flush)          (flush)
//!
//! RunCoordinator ── publish_aborted() ─► CompletionBus ──► RunListener::on_run_aborted()
//!                                                          (discard pending changes)
//! ```

mod bus;
mod listener;

pub use bus::{CompletionBus, ListenerId};
pub use listener::RunListener;
