//! # Remote state tier.
//!
//! ```text
//! RemoteStateStore ──(overlay miss / flush)──► RetryPolicy ──► dyn KvTable
//!                                                              ├─ MemoryTable (in-process)
//!                                                              └─ hosted table client (external)
//! ```

mod memory;
mod store;
mod table;

pub use memory::MemoryTable;
pub use store::{MAX_UNPROCESSED_ROUNDS, RemoteStateStore};
pub use table::{BatchWriteOutput, KvTable, MAX_BATCH_OPS, TableKey, WriteOp};
