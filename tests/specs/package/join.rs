//! Join specs
//!
//! Verify two sources joined on a key produce one row per match.

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test]
async fn join_produces_one_row_per_role() {
    let etl = Etl::new();

    let result = etl.package.execute("join").await;

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(etl.count("users_roles"), 4);
}

#[tokio::test]
async fn joined_rows_carry_both_sides() {
    let etl = Etl::new();

    etl.package.execute("join").await;

    let roles: Vec<(String, String)> = etl
        .store
        .rows("users_roles")
        .unwrap()
        .iter()
        .map(|row| {
            (
                row.get_str("name").unwrap_or_default().to_string(),
                row.get_str("role").unwrap_or_default().to_string(),
            )
        })
        .collect();
    assert_eq!(
        roles,
        vec![
            ("ayende".to_string(), "admin".to_string()),
            ("foo".to_string(), "editor".to_string()),
            ("bar".to_string(), "viewer".to_string()),
            ("broken".to_string(), "viewer".to_string()),
        ]
    );
}

#[tokio::test]
async fn rerunning_the_join_replaces_its_output() {
    let etl = Etl::new();

    assert!(etl.package.execute("join").await.is_success());
    assert!(etl.package.execute("join").await.is_success());

    assert_eq!(etl.count("users_roles"), 4);
}
