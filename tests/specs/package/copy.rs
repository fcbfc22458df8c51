//! Row copy specs
//!
//! Verify a target moves rows from source to destination through a filter.

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test]
async fn default_target_copies_valid_users() {
    let etl = Etl::new();

    let result = etl.package.execute("default").await;

    assert!(result.is_success(), "{:?}", result.errors);
    assert_ne!(etl.count("users_copy"), 0);
}

#[tokio::test]
async fn users_with_bad_email_are_skipped() {
    let etl = Etl::new();

    etl.package.execute("default").await;

    assert_eq!(etl.ids("users_copy"), vec![1, 2, 3, 5, 6, 7, 8, 9]);
}

#[tokio::test]
async fn copied_rows_keep_every_column() {
    let etl = Etl::new();

    etl.package.execute("default").await;

    let copied = etl.store.rows("users_copy").unwrap();
    let expected: Vec<Row> = etl
        .store
        .rows("users")
        .unwrap()
        .into_iter()
        .filter(has_valid_email)
        .collect();
    assert_eq!(copied, expected);
}

#[tokio::test]
async fn running_a_target_twice_appends() {
    let etl = Etl::new();

    assert!(etl.package.execute("default").await.is_success());
    assert!(etl.package.execute("default").await.is_success());

    assert_eq!(etl.count("users_copy"), 16);
}

#[tokio::test]
async fn pipeline_without_associations_completes_untouched() {
    let etl = Etl::new();

    let result = etl.package.execute("nothing").await;

    assert_eq!(result.status, ExecutionStatus::Success);
    assert!(etl.package.pipeline("Empty").unwrap().is_completed());
    assert_eq!(etl.package.connection("db").unwrap().in_use(), 0);
    assert_eq!(etl.count("users_copy"), 0);
}

#[tokio::test]
async fn unknown_target_is_a_failed_result() {
    let etl = Etl::new();

    let result = etl.package.execute("nightly").await;

    assert_eq!(result.status, ExecutionStatus::Failure);
    assert_eq!(
        result.error().map(ToString::to_string),
        Some("target not found: nightly".to_string())
    );
}
