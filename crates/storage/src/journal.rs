// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Table operations and the state they materialize

use serde::{Deserialize, Serialize};
use sluice_core::Row;
use std::collections::BTreeMap;

/// A single change to a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableOp {
    Insert { table: String, row: Row },
    Truncate { table: String },
}

impl TableOp {
    pub fn table(&self) -> &str {
        match self {
            TableOp::Insert { table, .. } | TableOp::Truncate { table } => table,
        }
    }
}

/// Named tables built by applying [`TableOp`]s in order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    tables: BTreeMap<String, Vec<Row>>,
}

impl Tables {
    /// Register an empty table; existing contents are kept
    pub fn create(&mut self, name: &str) {
        self.tables.entry(name.to_string()).or_default();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn rows(&self, name: &str) -> Option<&[Row]> {
        self.tables.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Apply an operation; returns `false` if its table does not exist
    pub fn apply(&mut self, op: &TableOp) -> bool {
        let Some(rows) = self.tables.get_mut(op.table()) else {
            return false;
        };
        match op {
            TableOp::Insert { row, .. } => rows.push(row.clone()),
            TableOp::Truncate { .. } => rows.clear(),
        }
        true
    }

    /// Rows of `name` as they would read after applying `pending`
    pub fn overlay(&self, name: &str, pending: &[TableOp]) -> Option<Vec<Row>> {
        let mut rows = self.tables.get(name)?.clone();
        for op in pending.iter().filter(|op| op.table() == name) {
            match op {
                TableOp::Insert { row, .. } => rows.push(row.clone()),
                TableOp::Truncate { .. } => rows.clear(),
            }
        }
        Some(rows)
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
