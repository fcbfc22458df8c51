// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Predicate filter

use async_trait::async_trait;
use sluice_core::{Outlet, Row, Stage, StageContext, StageError};
use std::sync::atomic::{AtomicU64, Ordering};

type Predicate = Box<dyn Fn(&Row) -> bool + Send + Sync>;

/// Forwards rows that satisfy a predicate and skips the rest
pub struct FilterStage {
    name: String,
    predicate: Predicate,
    skipped: AtomicU64,
}

impl FilterStage {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Row) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
            skipped: AtomicU64::new(0),
        }
    }

    /// Rows skipped across all runs
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Stage for FilterStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(
        &self,
        ctx: &StageContext,
        input: &str,
        row: Row,
        out: &Outlet,
    ) -> Result<(), StageError> {
        if (self.predicate)(&row) {
            out.send(row);
        } else {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                stage = %self.name,
                pipeline = ctx.pipeline(),
                input,
                "row skipped"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
