// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Table-writing stage

use crate::AdapterError;
use async_trait::async_trait;
use sluice_core::{
    Connection, ConnectionUser, Outlet, Row, RunId, Stage, StageContext, StageError,
};
use sluice_storage::TableStore;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// How a sink treats rows already in its table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Keep existing rows and add new ones
    #[default]
    Append,
    /// Clear the table once per run before the first write
    Replace,
}

/// Writes every incoming row to a table
///
/// Writes go through the run's transaction when there is one, so they are
/// committed or rolled back with it. Rows are also forwarded downstream.
pub struct TableSink {
    name: String,
    store: TableStore,
    table: String,
    mode: WriteMode,
    connection: Option<Arc<Connection>>,
    /// Runs whose table has already been cleared in `Replace` mode
    cleared: Mutex<HashSet<RunId>>,
}

impl TableSink {
    pub fn new(name: impl Into<String>, store: TableStore, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store,
            table: table.into(),
            mode: WriteMode::Append,
            connection: None,
            cleared: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_connection(mut self, connection: Arc<Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Runs that have cleared the table and not yet finished
    pub fn open_runs(&self) -> usize {
        self.cleared().len()
    }

    fn cleared(&self) -> MutexGuard<'_, HashSet<RunId>> {
        self.cleared.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn prepare_run(&self, ctx: &StageContext) -> Result<(), StageError> {
        if self.mode != WriteMode::Replace {
            return Ok(());
        }
        let first = self.cleared().insert(ctx.run_id().clone());
        if first {
            tracing::debug!(sink = %self.name, table = %self.table, "clearing table");
            self.store
                .truncate(&self.table, ctx.transaction())
                .map_err(|e| StageError::other(AdapterError::from(e)))?;
        }
        Ok(())
    }
}

impl ConnectionUser for TableSink {
    fn connection_instance(&self) -> Option<&Arc<Connection>> {
        self.connection.as_ref()
    }
}

#[async_trait]
impl Stage for TableSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn connection_user(&self) -> Option<&dyn ConnectionUser> {
        Some(self)
    }

    async fn process(
        &self,
        ctx: &StageContext,
        _input: &str,
        row: Row,
        out: &Outlet,
    ) -> Result<(), StageError> {
        self.prepare_run(ctx)?;
        if out.fan_out() > 0 {
            out.send(row.clone());
        }
        self.store
            .insert(&self.table, row, ctx.transaction())
            .map_err(|e| StageError::other(AdapterError::from(e)))
    }

    async fn finish(&self, ctx: &StageContext, _out: &Outlet) -> Result<(), StageError> {
        // A run with no rows still replaces the table
        self.prepare_run(ctx)?;
        self.cleared().remove(ctx.run_id());
        Ok(())
    }

    fn discard_run(&self, ctx: &StageContext) {
        self.cleared().remove(ctx.run_id());
    }
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
