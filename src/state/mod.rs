//! # Rule state persistence.
//!
//! Rules keep small pieces of state between runs (cursors, last-seen
//! timestamps). All access goes through [`StateStore`]; changes are held in
//! memory and made durable only when a run completes successfully.
//!
//! - [`FileStateStore`]: one JSON file on local disk.
//! - [`RemoteStateStore`]: a hosted key/value table with a write-back overlay.
//! - [`StateHandle`]: a store bound to one rule instance.

mod file;
mod handle;
mod key;
pub mod remote;
mod store;

pub use file::FileStateStore;
pub use handle::StateHandle;
pub use key::{PendingEntry, Scope, StateKey};
pub use remote::{KvTable, MemoryTable, RemoteStateStore};
pub use store::StateStore;
