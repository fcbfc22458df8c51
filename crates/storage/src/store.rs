// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared table store with transactional journals

use crate::journal::{TableOp, Tables};
use sluice_core::{Enlistment, Row, Transaction, TransactionError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Errors from table store operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("seed data for {table} must be an array of objects (item {index} is not)")]
    NotARow { table: String, index: usize },
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

struct StoreInner {
    id: u64,
    tables: Mutex<Tables>,
    /// Staged operations keyed by transaction id
    journals: Mutex<HashMap<String, Vec<TableOp>>>,
}

impl StoreInner {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn journals(&self) -> MutexGuard<'_, HashMap<String, Vec<TableOp>>> {
        self.journals.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// In-memory tables shared by sources and sinks
///
/// Cloning yields another handle to the same tables.
#[derive(Clone)]
pub struct TableStore {
    inner: Arc<StoreInner>,
}

impl Default for TableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TableStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
                tables: Mutex::new(Tables::default()),
                journals: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create an empty table if it does not exist yet
    pub fn create_table(&self, name: &str) {
        self.inner.tables().create(name);
    }

    pub fn table_names(&self) -> Vec<String> {
        self.inner.tables().names().map(String::from).collect()
    }

    /// Append a row, staged in `tx` if given
    pub fn insert(
        &self,
        table: &str,
        row: Row,
        tx: Option<&Transaction>,
    ) -> Result<(), StorageError> {
        self.write(
            TableOp::Insert {
                table: table.to_string(),
                row,
            },
            tx,
        )
    }

    /// Remove every row, staged in `tx` if given
    pub fn truncate(&self, table: &str, tx: Option<&Transaction>) -> Result<(), StorageError> {
        self.write(
            TableOp::Truncate {
                table: table.to_string(),
            },
            tx,
        )
    }

    /// Committed rows of a table
    pub fn rows(&self, table: &str) -> Result<Vec<Row>, StorageError> {
        self.inner
            .tables()
            .rows(table)
            .map(<[Row]>::to_vec)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))
    }

    /// Rows of a table as seen from inside `tx`, including its staged writes
    pub fn rows_in(&self, table: &str, tx: Option<&Transaction>) -> Result<Vec<Row>, StorageError> {
        let Some(tx) = tx else {
            return self.rows(table);
        };
        let pending = self
            .inner
            .journals()
            .get(tx.id())
            .cloned()
            .unwrap_or_default();
        self.inner
            .tables()
            .overlay(table, &pending)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))
    }

    /// Number of committed rows in a table
    pub fn count(&self, table: &str) -> Result<usize, StorageError> {
        self.inner
            .tables()
            .rows(table)
            .map(<[Row]>::len)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))
    }

    /// Number of operations staged by `tx` and not yet committed
    pub fn pending(&self, tx: &Transaction) -> usize {
        self.inner.journals().get(tx.id()).map_or(0, Vec::len)
    }

    /// Create `table` and append rows parsed from a JSON array of objects
    pub fn seed_json(&self, table: &str, json: &str) -> Result<usize, StorageError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let items = match value {
            serde_json::Value::Array(items) => items,
            _ => {
                return Err(StorageError::NotARow {
                    table: table.to_string(),
                    index: 0,
                })
            }
        };

        let rows = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                Row::from_json(item).ok_or_else(|| StorageError::NotARow {
                    table: table.to_string(),
                    index,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let count = rows.len();
        let mut tables = self.inner.tables();
        tables.create(table);
        for row in rows {
            tables.apply(&TableOp::Insert {
                table: table.to_string(),
                row,
            });
        }
        tracing::debug!(table, rows = count, "table seeded");
        Ok(count)
    }

    /// Like [`seed_json`](Self::seed_json), reading the array from a file
    pub fn load_json_file(&self, table: &str, path: &Path) -> Result<usize, StorageError> {
        let content = std::fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.seed_json(table, &content)
    }

    fn write(&self, op: TableOp, tx: Option<&Transaction>) -> Result<(), StorageError> {
        let Some(tx) = tx else {
            let mut tables = self.inner.tables();
            if !tables.apply(&op) {
                return Err(StorageError::UnknownTable(op.table().to_string()));
            }
            tracing::trace!(table = op.table(), "applied");
            return Ok(());
        };

        if !self.inner.tables().contains(op.table()) {
            return Err(StorageError::UnknownTable(op.table().to_string()));
        }

        let key = format!("table-store-{}", self.inner.id);
        let enlisted = tx.enlist_once(&key, || {
            Arc::new(Journal {
                store: Arc::clone(&self.inner),
                transaction: tx.id().to_string(),
            })
        })?;
        if enlisted {
            tracing::debug!(transaction = tx.id(), store = self.inner.id, "journal enlisted");
        }

        tracing::trace!(table = op.table(), transaction = tx.id(), "staged");
        self.inner
            .journals()
            .entry(tx.id().to_string())
            .or_default()
            .push(op);
        Ok(())
    }
}

/// The store's stake in one transaction
struct Journal {
    store: Arc<StoreInner>,
    transaction: String,
}

impl Enlistment for Journal {
    fn commit(&self) -> Result<(), TransactionError> {
        let ops = self
            .store
            .journals()
            .remove(&self.transaction)
            .unwrap_or_default();

        let mut tables = self.store.tables();
        if let Some(op) = ops.iter().find(|op| !tables.contains(op.table())) {
            return Err(TransactionError::CommitFailed {
                resource: format!("table-store-{}", self.store.id),
                message: format!("unknown table {}", op.table()),
            });
        }
        for op in &ops {
            tables.apply(op);
        }
        tracing::debug!(
            transaction = %self.transaction,
            ops = ops.len(),
            "journal committed"
        );
        Ok(())
    }

    fn rollback(&self) {
        let discarded = self
            .store
            .journals()
            .remove(&self.transaction)
            .map_or(0, |ops| ops.len());
        tracing::debug!(transaction = %self.transaction, discarded, "journal rolled back");
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
