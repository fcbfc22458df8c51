//! Transactional execution specs
//!
//! Verify a failing target keeps or discards its writes depending on
//! whether it runs inside a transaction.

use crate::prelude::*;
use similar_asserts::assert_eq;

/// Validator that lets eight users through and fails on the ninth
fn failing_validator() -> Arc<dyn Stage> {
    Arc::new(FailingStage::new("ValidateEmail", 9))
}

#[tokio::test]
async fn failure_without_transaction_keeps_earlier_rows() {
    let etl = Etl::with_validator(failing_validator());

    let result = etl.package.execute("default").await;

    assert_eq!(result.status, ExecutionStatus::Failure);
    assert_eq!(etl.count("users_copy"), 8);
}

#[tokio::test]
async fn failure_inside_transaction_leaves_nothing() {
    let etl = Etl::with_validator(failing_validator());

    let result = etl.package.execute("withTransaction").await;

    assert_eq!(result.status, ExecutionStatus::Failure);
    assert!(matches!(result.error(), Some(EngineError::Stage { .. })));
    assert_eq!(etl.count("users_copy"), 0);
}

#[tokio::test]
async fn explicit_isolation_level_rolls_back_too() {
    let etl = Etl::with_validator(failing_validator());

    let result = etl
        .package
        .execute_with_isolation("default", IsolationLevel::ReadCommitted)
        .await;

    assert_eq!(result.status, ExecutionStatus::Failure);
    assert_eq!(etl.count("users_copy"), 0);
}

#[tokio::test]
async fn successful_transaction_commits_every_row() {
    let etl = Etl::new();

    let result = etl.package.execute("withTransaction").await;

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(etl.ids("users_copy"), vec![1, 2, 3, 5, 6, 7, 8, 9]);
}

#[tokio::test]
async fn panicking_validator_rolls_back() {
    let etl = Etl::with_validator(Arc::new(FailingStage::panicking("ValidateEmail", 3)));

    let result = etl.package.execute("withTransaction").await;

    assert_eq!(result.status, ExecutionStatus::Failure);
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, EngineError::StagePanicked { .. })));
    assert_eq!(etl.count("users_copy"), 0);
    assert_eq!(etl.package.connection("db").unwrap().in_use(), 0);
}
