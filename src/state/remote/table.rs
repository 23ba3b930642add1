//! # Backing key/value table.
//!
//! [`KvTable`] is the seam to the hosted table. Items are addressed by a
//! [`TableKey`] and carry a single string value.
//!
//! ## Schema
//! ```text
//! partition key (string) = "{rule}::{label}"
//! sort key      (string) = state key
//! value         (string)
//! ```
//!
//! ## Contract
//! - `get_item` is a strongly consistent point read.
//! - `batch_write` accepts at most [`MAX_BATCH_OPS`] operations and may hand back
//!   a subset of them as unprocessed; that is a successful response, not an error.

use std::fmt;

use async_trait::async_trait;

use crate::error::TableError;
use crate::state::StateKey;

/// Hard ceiling of operations in one [`KvTable::batch_write`] request.
pub const MAX_BATCH_OPS: usize = 25;

/// Primary key of one table item.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableKey {
    /// `"{rule}::{label}"`.
    pub partition: String,
    /// The state key.
    pub sort: String,
}

impl From<&StateKey> for TableKey {
    fn from(k: &StateKey) -> Self {
        Self {
            partition: format!("{}::{}", k.scope.rule(), k.scope.label()),
            sort: k.key.clone(),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition, self.sort)
    }
}

/// One operation of a batch write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    /// Create or overwrite an item.
    Put {
        /// Item key.
        key: TableKey,
        /// Item value.
        value: String,
    },
    /// Delete an item (deleting a missing item succeeds).
    Delete {
        /// Item key.
        key: TableKey,
    },
}

impl WriteOp {
    /// The key this operation targets.
    pub fn key(&self) -> &TableKey {
        match self {
            WriteOp::Put { key, .. } | WriteOp::Delete { key } => key,
        }
    }
}

/// Response of a batch write.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchWriteOutput {
    /// Operations the table did not apply; the caller may resubmit them.
    pub unprocessed: Vec<WriteOp>,
}

impl BatchWriteOutput {
    /// Every operation was applied.
    pub fn complete() -> Self {
        Self::default()
    }
}

/// The hosted key/value table.
#[async_trait]
pub trait KvTable: Send + Sync + 'static {
    /// Strongly consistent point read; `Ok(None)` if the item does not exist.
    async fn get_item(&self, key: &TableKey) -> Result<Option<String>, TableError>;

    /// Applies up to [`MAX_BATCH_OPS`] operations.
    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<BatchWriteOutput, TableError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Scope;

    #[test]
    fn test_partition_joins_rule_and_label() {
        let k = Scope::new("DeleteZeroSum", "ledger").key("pairs");
        let t = TableKey::from(&k);
        assert_eq!(t.partition, "DeleteZeroSum::ledger");
        assert_eq!(t.sort, "pairs");
        assert_eq!(t.to_string(), "DeleteZeroSum::ledger/pairs");
    }
}
