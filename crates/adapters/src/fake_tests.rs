// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sluice_core::RunId;
use std::time::Duration;

fn ctx() -> StageContext {
    StageContext::new("p", "t", RunId("p:1".to_string()), None)
}

fn rows(n: i64) -> Vec<Row> {
    (0..n).map(|id| Row::new().with("id", id)).collect()
}

#[tokio::test]
async fn fake_source_counts_starts_and_can_fail() {
    let source = FakeSource::new("src", rows(2)).failing("boom");
    let out = Outlet::empty();

    let err = source.start(&ctx(), &out).await.unwrap_err();

    assert!(err.to_string().contains("boom"));
    assert_eq!(out.rows_sent(), 2);
    assert_eq!(source.clone().starts(), 1);
}

#[tokio::test]
async fn gated_source_waits_for_open() {
    let source = GatedSource::new("src", rows(3));
    let out = Arc::new(Outlet::empty());

    let task = {
        let source = source.clone();
        let out = Arc::clone(&out);
        tokio::spawn(async move { source.start(&ctx(), &out).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(out.rows_sent(), 0);

    source.open();
    task.await.unwrap().unwrap();
    assert_eq!(out.rows_sent(), 3);
}

#[tokio::test]
async fn open_gate_lets_later_starts_through() {
    let source = GatedSource::new("src", rows(1));
    source.open();
    source.start(&ctx(), &Outlet::empty()).await.unwrap();
    assert_eq!(source.starts(), 1);
}

#[tokio::test]
async fn recording_stage_records_and_forwards() {
    let stage = RecordingStage::new("rec");
    let out = Outlet::empty();

    stage.process(&ctx(), "a", Row::new().with("id", 1), &out).await.unwrap();
    stage.process(&ctx(), "b", Row::new().with("id", 2), &out).await.unwrap();
    stage.finish(&ctx(), &out).await.unwrap();

    let received = stage.received();
    assert_eq!(received.len(), 2);
    assert_eq!(received[1].0, "b");
    assert_eq!(out.rows_sent(), 2);
    assert_eq!(stage.finishes(), 1);
}

#[tokio::test]
async fn failing_stage_fails_on_nth_row() {
    let stage = FailingStage::new("fail", 3);
    let out = Outlet::empty();

    for row in rows(2) {
        stage.process(&ctx(), "in", row, &out).await.unwrap();
    }
    let err = stage.process(&ctx(), "in", Row::new(), &out).await.unwrap_err();

    assert!(err.to_string().contains("refused row 3"));
    assert_eq!(out.rows_sent(), 2);
    assert_eq!(stage.seen(), 3);
}

#[tokio::test]
async fn panicking_stage_panics_on_nth_row() {
    let stage = FailingStage::panicking("fail", 1);
    let task = tokio::spawn(async move {
        stage
            .process(&ctx(), "in", Row::new(), &Outlet::empty())
            .await
    });
    assert!(task.await.unwrap_err().is_panic());
}
