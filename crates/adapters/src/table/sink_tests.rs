// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sluice_core::{IsolationLevel, Transaction};

fn ctx(run: &str, transaction: Option<Transaction>) -> StageContext {
    StageContext::new("copy", "default", RunId(run.to_string()), transaction)
}

fn store() -> TableStore {
    let store = TableStore::new();
    store.create_table("users");
    store
}

#[tokio::test]
async fn append_mode_writes_through() {
    let store = store();
    let sink = TableSink::new("UsersDestination", store.clone(), "users");
    let ctx = ctx("copy:1", None);

    for id in 0..3 {
        sink.process(&ctx, "UsersSource", Row::new().with("id", id), &Outlet::empty())
            .await
            .unwrap();
    }
    sink.finish(&ctx, &Outlet::empty()).await.unwrap();

    assert_eq!(store.count("users").unwrap(), 3);
}

#[tokio::test]
async fn transactional_writes_wait_for_commit() {
    let store = store();
    let sink = TableSink::new("UsersDestination", store.clone(), "users");
    let tx = Transaction::begin("tx-1", IsolationLevel::default());
    let ctx = ctx("copy:1", Some(tx.clone()));

    sink.process(&ctx, "in", Row::new().with("id", 1), &Outlet::empty())
        .await
        .unwrap();
    assert_eq!(store.count("users").unwrap(), 0);

    tx.commit().unwrap();
    assert_eq!(store.count("users").unwrap(), 1);
}

#[tokio::test]
async fn replace_mode_clears_once_per_run() {
    let store = store();
    store
        .insert("users", Row::new().with("id", 99), None)
        .unwrap();
    let sink = TableSink::new("dst", store.clone(), "users").with_mode(WriteMode::Replace);

    for run in ["copy:1", "copy:2"] {
        let ctx = ctx(run, None);
        for id in 0..2 {
            sink.process(&ctx, "in", Row::new().with("id", id), &Outlet::empty())
                .await
                .unwrap();
        }
        sink.finish(&ctx, &Outlet::empty()).await.unwrap();
    }

    assert_eq!(store.count("users").unwrap(), 2);
}

#[tokio::test]
async fn replace_mode_clears_even_without_rows() {
    let store = store();
    store
        .insert("users", Row::new().with("id", 1), None)
        .unwrap();
    let sink = TableSink::new("dst", store.clone(), "users").with_mode(WriteMode::Replace);

    sink.finish(&ctx("copy:1", None), &Outlet::empty())
        .await
        .unwrap();

    assert_eq!(store.count("users").unwrap(), 0);
}

#[tokio::test]
async fn unknown_table_surfaces_as_stage_error() {
    let sink = TableSink::new("dst", TableStore::new(), "missing");
    let err = sink
        .process(&ctx("copy:1", None), "in", Row::new(), &Outlet::empty())
        .await
        .unwrap_err();
    assert!(matches!(err, StageError::Other(_)));
}

#[tokio::test]
async fn failed_replace_run_is_forgotten_once_discarded() {
    let sink =
        TableSink::new("dst", TableStore::new(), "missing").with_mode(WriteMode::Replace);
    let ctx = ctx("copy:1", None);

    assert!(sink
        .process(&ctx, "in", Row::new(), &Outlet::empty())
        .await
        .is_err());
    assert_eq!(sink.open_runs(), 1);

    sink.discard_run(&ctx);

    assert_eq!(sink.open_runs(), 0);
}

#[tokio::test]
async fn finished_runs_are_not_kept() {
    let store = store();
    let sink = TableSink::new("dst", store, "users").with_mode(WriteMode::Replace);
    let ctx = ctx("copy:1", None);

    sink.process(&ctx, "in", Row::new().with("id", 1), &Outlet::empty())
        .await
        .unwrap();
    sink.finish(&ctx, &Outlet::empty()).await.unwrap();

    assert_eq!(sink.open_runs(), 0);
}
