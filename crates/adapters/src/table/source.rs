// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Table-reading data source

use crate::AdapterError;
use async_trait::async_trait;
use sluice_core::{
    Connection, ConnectionUser, DataSource, Outlet, StageContext, StageError,
};
use sluice_storage::TableStore;
use std::sync::Arc;

/// Emits every row of a table
///
/// Inside a transaction the rows already staged by that transaction are
/// included.
pub struct TableSource {
    name: String,
    store: TableStore,
    table: String,
    connection: Option<Arc<Connection>>,
}

impl TableSource {
    pub fn new(name: impl Into<String>, store: TableStore, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store,
            table: table.into(),
            connection: None,
        }
    }

    /// Draw from `connection` while the owning pipeline runs
    pub fn with_connection(mut self, connection: Arc<Connection>) -> Self {
        self.connection = Some(connection);
        self
    }
}

impl ConnectionUser for TableSource {
    fn connection_instance(&self) -> Option<&Arc<Connection>> {
        self.connection.as_ref()
    }
}

#[async_trait]
impl DataSource for TableSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn connection_user(&self) -> Option<&dyn ConnectionUser> {
        Some(self)
    }

    async fn start(&self, ctx: &StageContext, out: &Outlet) -> Result<(), StageError> {
        let rows = self
            .store
            .rows_in(&self.table, ctx.transaction())
            .map_err(|e| StageError::other(AdapterError::from(e)))?;
        tracing::debug!(
            source = %self.name,
            table = %self.table,
            rows = rows.len(),
            "reading table"
        );
        for row in rows {
            out.send(row);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "source_tests.rs"]
mod tests;
