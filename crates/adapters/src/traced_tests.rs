// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::fake::{FailingStage, FakeSource};
use crate::FilterStage;
use sluice_core::RunId;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// A writer that captures log output for testing
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn new() -> Self {
        Self::default()
    }

    fn contents(&self) -> String {
        let logs = self.logs.lock().unwrap();
        String::from_utf8_lossy(&logs).to_string()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run a test with captured tracing output
fn with_tracing<F, Fut>(f: F) -> (String, Fut::Output)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    let logs = CapturedLogs::new();
    let logs_clone = logs.clone();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(logs_clone)
        .with_ansi(false)
        .without_time()
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f())
    });

    (logs.contents(), result)
}

fn ctx() -> StageContext {
    StageContext::new("copy", "default", RunId("copy:1".to_string()), None)
}

fn rows(n: i64) -> Vec<Row> {
    (0..n).map(|id| Row::new().with("id", id)).collect()
}

// =============================================================================
// Delegation tests
// =============================================================================

#[tokio::test]
async fn traced_stage_delegates_to_inner() {
    let traced = TracedStage::new(FilterStage::new("evens", |row: &Row| {
        row.get("id").and_then(|v| v.as_i64()).is_some_and(|id| id % 2 == 0)
    }));
    let out = Outlet::empty();

    for row in rows(4) {
        traced.process(&ctx(), "src", row, &out).await.unwrap();
    }

    assert_eq!(traced.name(), "evens");
    assert_eq!(out.rows_sent(), 2);
    assert_eq!(traced.inner().skipped(), 2);
}

#[tokio::test]
async fn traced_source_delegates_to_inner() {
    let traced = TracedSource::new(FakeSource::new("src", rows(3)));
    let out = Outlet::empty();

    traced.start(&ctx(), &out).await.unwrap();

    assert_eq!(out.rows_sent(), 3);
    assert_eq!(traced.inner().starts(), 1);
    assert!(traced.connection_user().is_some());
}

// =============================================================================
// Tracing output verification tests
// =============================================================================

#[test]
fn traced_source_logs_entry_and_completion() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedSource::new(FakeSource::new("UsersSource", rows(2)));
        traced.start(&ctx(), &Outlet::empty()).await
    });

    assert!(result.is_ok(), "start should succeed: {:?}", result);
    assert!(
        logs.contains("source.start"),
        "Should log span name. Logs:\n{}",
        logs
    );
    assert!(
        logs.contains("UsersSource"),
        "Should log source name. Logs:\n{}",
        logs
    );
    assert!(
        logs.contains("source drained"),
        "Should log completion. Logs:\n{}",
        logs
    );
    assert!(
        logs.contains("elapsed_ms"),
        "Should log timing. Logs:\n{}",
        logs
    );
}

#[test]
fn traced_stage_logs_process_failure() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedStage::new(FailingStage::new("Explode", 1));
        traced
            .process(&ctx(), "UsersSource", Row::new(), &Outlet::empty())
            .await
    });

    assert!(result.is_err());
    assert!(
        logs.contains("process failed"),
        "Should log failure. Logs:\n{}",
        logs
    );
    assert!(
        logs.contains("Explode"),
        "Should log stage name. Logs:\n{}",
        logs
    );
}

#[test]
fn traced_stage_logs_finish_timing() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedStage::new(FilterStage::new("all", |_: &Row| true));
        traced.finish(&ctx(), &Outlet::empty()).await
    });

    assert!(result.is_ok());
    assert!(
        logs.contains("stage.finish"),
        "Should log span name. Logs:\n{}",
        logs
    );
    assert!(
        logs.contains("stage finished"),
        "Should log completion. Logs:\n{}",
        logs
    );
}
