// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced participant wrappers for consistent observability

use async_trait::async_trait;
use sluice_core::{ConnectionUser, DataSource, Outlet, Row, Stage, StageContext, StageError};
use tracing::Instrument;

/// Wrapper that adds tracing to any Stage
#[derive(Clone)]
pub struct TracedStage<S> {
    inner: S,
}

impl<S> TracedStage<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: Stage> Stage for TracedStage<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn connection_user(&self) -> Option<&dyn ConnectionUser> {
        self.inner.connection_user()
    }

    async fn process(
        &self,
        ctx: &StageContext,
        input: &str,
        row: Row,
        out: &Outlet,
    ) -> Result<(), StageError> {
        let columns = row.len();
        let result = self.inner.process(ctx, input, row, out).await;
        match &result {
            Ok(()) => tracing::trace!(stage = self.inner.name(), input, columns, "processed"),
            Err(e) => tracing::error!(
                stage = self.inner.name(),
                pipeline = ctx.pipeline(),
                input,
                error = %e,
                "process failed"
            ),
        }
        result
    }

    async fn finish(&self, ctx: &StageContext, out: &Outlet) -> Result<(), StageError> {
        let span = tracing::info_span!("stage.finish", stage = self.inner.name(), run = %ctx.run_id());

        let start = std::time::Instant::now();
        let result = self.inner.finish(ctx, out).instrument(span.clone()).await;
        let elapsed = start.elapsed();
        let _guard = span.enter();

        match &result {
            Ok(()) => tracing::info!(
                rows_sent = out.rows_sent(),
                elapsed_ms = elapsed.as_millis() as u64,
                "stage finished"
            ),
            Err(e) => tracing::error!(
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "finish failed"
            ),
        }

        result
    }

    fn discard_run(&self, ctx: &StageContext) {
        tracing::debug!(stage = self.inner.name(), run = %ctx.run_id(), "run discarded");
        self.inner.discard_run(ctx);
    }
}

/// Wrapper that adds tracing to any DataSource
#[derive(Clone)]
pub struct TracedSource<S> {
    inner: S,
}

impl<S> TracedSource<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: DataSource> DataSource for TracedSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn connection_user(&self) -> Option<&dyn ConnectionUser> {
        self.inner.connection_user()
    }

    async fn start(&self, ctx: &StageContext, out: &Outlet) -> Result<(), StageError> {
        let span = tracing::info_span!(
            "source.start",
            source = self.inner.name(),
            pipeline = ctx.pipeline(),
            run = %ctx.run_id()
        );
        span.in_scope(|| tracing::info!(fan_out = out.fan_out(), "starting"));

        let start = std::time::Instant::now();
        let result = self.inner.start(ctx, out).instrument(span.clone()).await;
        let elapsed = start.elapsed();
        let _guard = span.enter();

        match &result {
            Ok(()) => tracing::info!(
                rows_sent = out.rows_sent(),
                elapsed_ms = elapsed.as_millis() as u64,
                "source drained"
            ),
            Err(e) => tracing::error!(
                rows_sent = out.rows_sent(),
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "source failed"
            ),
        }

        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
