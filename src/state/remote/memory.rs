//! # In-process table.
//!
//! [`MemoryTable`] implements [`KvTable`] over a map. It enforces the
//! [`MAX_BATCH_OPS`] ceiling like the hosted table does, which makes it
//! suitable for local runs and tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::TableError;
use crate::state::remote::table::{BatchWriteOutput, KvTable, MAX_BATCH_OPS, TableKey, WriteOp};

/// Thread-safe in-memory [`KvTable`].
#[derive(Debug, Default)]
pub struct MemoryTable {
    items: Mutex<BTreeMap<TableKey, String>>,
}

impl MemoryTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an item directly, bypassing the batch API.
    pub fn insert(&self, key: TableKey, value: impl Into<String>) {
        self.items().insert(key, value.into());
    }

    /// Reads an item directly.
    pub fn get(&self, key: &TableKey) -> Option<String> {
        self.items().get(key).cloned()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items().len()
    }

    /// True if the table holds no item.
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    fn items(&self) -> MutexGuard<'_, BTreeMap<TableKey, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl KvTable for MemoryTable {
    async fn get_item(&self, key: &TableKey) -> Result<Option<String>, TableError> {
        Ok(self.get(key))
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<BatchWriteOutput, TableError> {
        if ops.len() > MAX_BATCH_OPS {
            return Err(TableError::Rejected {
                error: format!("{} operations exceed the limit of {MAX_BATCH_OPS}", ops.len()),
            });
        }

        let mut items = self.items();
        for op in ops {
            match op {
                WriteOp::Put { key, value } => {
                    items.insert(key, value);
                }
                WriteOp::Delete { key } => {
                    items.remove(&key);
                }
            }
        }
        Ok(BatchWriteOutput::complete())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(sort: &str) -> TableKey {
        TableKey {
            partition: "rule::label".into(),
            sort: sort.into(),
        }
    }

    #[tokio::test]
    async fn test_put_and_delete() {
        let table = MemoryTable::new();
        table.insert(key("old"), "x");

        let out = table
            .batch_write(vec![
                WriteOp::Put {
                    key: key("new"),
                    value: "y".into(),
                },
                WriteOp::Delete { key: key("old") },
                WriteOp::Delete { key: key("never") },
            ])
            .await
            .unwrap();

        assert!(out.unprocessed.is_empty());
        assert_eq!(table.get_item(&key("new")).await.unwrap(), Some("y".into()));
        assert_eq!(table.get_item(&key("old")).await.unwrap(), None);
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_batch_is_rejected() {
        let table = MemoryTable::new();
        let ops = (0..=MAX_BATCH_OPS)
            .map(|i| WriteOp::Delete {
                key: key(&i.to_string()),
            })
            .collect();

        let err = table.batch_write(ops).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
