// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake participants for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use async_trait::async_trait;
use sluice_core::{
    Connection, ConnectionUser, DataSource, Outlet, Row, Stage, StageContext, StageError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Source that emits a fixed set of rows
#[derive(Clone)]
pub struct FakeSource {
    name: String,
    rows: Vec<Row>,
    connection: Option<Arc<Connection>>,
    error: Option<String>,
    starts: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
            connection: None,
            error: None,
            starts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_connection(mut self, connection: Arc<Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Fail after emitting every row
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Number of times `start` has been called
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

impl ConnectionUser for FakeSource {
    fn connection_instance(&self) -> Option<&Arc<Connection>> {
        self.connection.as_ref()
    }
}

#[async_trait]
impl DataSource for FakeSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn connection_user(&self) -> Option<&dyn ConnectionUser> {
        Some(self)
    }

    async fn start(&self, _ctx: &StageContext, out: &Outlet) -> Result<(), StageError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        for row in &self.rows {
            out.send(row.clone());
        }
        match &self.error {
            Some(message) => Err(StageError::failed(&self.name, message)),
            None => Ok(()),
        }
    }
}

/// Source that holds its rows until its gate is opened
///
/// Keeps a pipeline (and its connections) busy for as long as a test needs.
#[derive(Clone)]
pub struct GatedSource {
    inner: FakeSource,
    gate: Arc<watch::Sender<bool>>,
}

impl GatedSource {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            inner: FakeSource::new(name, rows),
            gate: Arc::new(gate),
        }
    }

    pub fn with_connection(mut self, connection: Arc<Connection>) -> Self {
        self.inner = self.inner.with_connection(connection);
        self
    }

    /// Let current and future starts emit their rows
    pub fn open(&self) {
        self.gate.send_replace(true);
    }

    pub fn starts(&self) -> usize {
        self.inner.starts()
    }
}

impl ConnectionUser for GatedSource {
    fn connection_instance(&self) -> Option<&Arc<Connection>> {
        self.inner.connection_instance()
    }
}

#[async_trait]
impl DataSource for GatedSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn connection_user(&self) -> Option<&dyn ConnectionUser> {
        Some(self)
    }

    async fn start(&self, ctx: &StageContext, out: &Outlet) -> Result<(), StageError> {
        let mut gate = self.gate.subscribe();
        // The sender lives in self, so the channel cannot close while waiting
        let _ = gate.wait_for(|open| *open).await;
        self.inner.start(ctx, out).await
    }
}

/// Stage that records every row it receives and forwards it
#[derive(Clone)]
pub struct RecordingStage {
    name: String,
    connection: Option<Arc<Connection>>,
    rows: Arc<Mutex<Vec<(String, Row)>>>,
    finishes: Arc<AtomicUsize>,
}

impl RecordingStage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connection: None,
            rows: Arc::new(Mutex::new(Vec::new())),
            finishes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_connection(mut self, connection: Arc<Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Every received row with the name of the input it came from
    pub fn received(&self) -> Vec<(String, Row)> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of times `finish` has been called
    pub fn finishes(&self) -> usize {
        self.finishes.load(Ordering::SeqCst)
    }
}

impl ConnectionUser for RecordingStage {
    fn connection_instance(&self) -> Option<&Arc<Connection>> {
        self.connection.as_ref()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn connection_user(&self) -> Option<&dyn ConnectionUser> {
        Some(self)
    }

    async fn process(
        &self,
        _ctx: &StageContext,
        input: &str,
        row: Row,
        out: &Outlet,
    ) -> Result<(), StageError> {
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((input.to_string(), row.clone()));
        out.send(row);
        Ok(())
    }

    async fn finish(&self, _ctx: &StageContext, _out: &Outlet) -> Result<(), StageError> {
        self.finishes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    Error,
    Panic,
}

/// Stage that forwards rows until the Nth one, which fails
#[derive(Clone)]
pub struct FailingStage {
    name: String,
    fail_on: usize,
    kind: FailureKind,
    seen: Arc<AtomicUsize>,
}

impl FailingStage {
    /// Fail with an error on the `fail_on`th row (1-based)
    pub fn new(name: impl Into<String>, fail_on: usize) -> Self {
        Self {
            name: name.into(),
            fail_on,
            kind: FailureKind::Error,
            seen: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Panic instead of returning an error
    pub fn panicking(name: impl Into<String>, fail_on: usize) -> Self {
        Self {
            kind: FailureKind::Panic,
            ..Self::new(name, fail_on)
        }
    }

    /// Rows received so far, including the failing one
    pub fn seen(&self) -> usize {
        self.seen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    #[allow(clippy::panic)]
    async fn process(
        &self,
        _ctx: &StageContext,
        _input: &str,
        row: Row,
        out: &Outlet,
    ) -> Result<(), StageError> {
        let n = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on {
            if self.kind == FailureKind::Panic {
                panic!("{} blew up on row {}", self.name, n);
            }
            return Err(StageError::failed(
                &self.name,
                format!("refused row {}", n),
            ));
        }
        out.send(row);
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
