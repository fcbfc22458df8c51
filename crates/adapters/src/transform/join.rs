// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-input hash join

use crate::AdapterError;
use async_trait::async_trait;
use sluice_core::{Outlet, Row, RunId, Stage, StageContext, StageError};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct JoinBuffer {
    left: Vec<Row>,
    right: HashMap<String, Vec<Row>>,
}

/// Inner join of two named inputs on a key column
///
/// Both inputs are buffered until every input has closed; joined rows are
/// emitted from `finish` in left-input order. Right-side columns win on
/// name clashes.
pub struct JoinStage {
    name: String,
    left: String,
    right: String,
    left_key: String,
    right_key: String,
    runs: Mutex<HashMap<RunId, JoinBuffer>>,
}

impl JoinStage {
    /// Join `left` and `right` where both carry the column `key`
    pub fn new(
        name: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        let key = key.into();
        Self {
            name: name.into(),
            left: left.into(),
            right: right.into(),
            left_key: key.clone(),
            right_key: key,
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Use a different key column on the right input
    pub fn with_right_key(mut self, key: impl Into<String>) -> Self {
        self.right_key = key.into();
        self
    }

    /// Runs with rows still buffered
    pub fn open_runs(&self) -> usize {
        self.runs().len()
    }

    fn runs(&self) -> MutexGuard<'_, HashMap<RunId, JoinBuffer>> {
        self.runs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn key_of(row: &Row, column: &str) -> Result<String, StageError> {
    Ok(row.require(column)?.to_string())
}

#[async_trait]
impl Stage for JoinStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(
        &self,
        ctx: &StageContext,
        input: &str,
        row: Row,
        _out: &Outlet,
    ) -> Result<(), StageError> {
        if input == self.left {
            key_of(&row, &self.left_key)?;
            self.runs()
                .entry(ctx.run_id().clone())
                .or_default()
                .left
                .push(row);
        } else if input == self.right {
            let key = key_of(&row, &self.right_key)?;
            self.runs()
                .entry(ctx.run_id().clone())
                .or_default()
                .right
                .entry(key)
                .or_default()
                .push(row);
        } else {
            return Err(StageError::other(AdapterError::UnknownInput {
                stage: self.name.clone(),
                input: input.to_string(),
            }));
        }
        Ok(())
    }

    async fn finish(&self, ctx: &StageContext, out: &Outlet) -> Result<(), StageError> {
        let Some(buffer) = self.runs().remove(ctx.run_id()) else {
            return Ok(());
        };

        let mut joined = 0usize;
        for left in &buffer.left {
            let key = key_of(left, &self.left_key)?;
            let Some(matches) = buffer.right.get(&key) else {
                continue;
            };
            for right in matches {
                let mut row = left.clone();
                row.merge(right);
                out.send(row);
                joined += 1;
            }
        }

        tracing::debug!(
            stage = %self.name,
            left = buffer.left.len(),
            right = buffer.right.values().map(Vec::len).sum::<usize>(),
            joined,
            "join complete"
        );
        Ok(())
    }

    fn discard_run(&self, ctx: &StageContext) {
        if let Some(buffer) = self.runs().remove(ctx.run_id()) {
            tracing::debug!(stage = %self.name, left = buffer.left.len(), "join buffer discarded");
        }
    }
}

#[cfg(test)]
#[path = "join_tests.rs"]
mod tests;
