//! Package file specs
//!
//! Verify packages load from disk and bad files are reported.

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test]
async fn package_file_drives_execution() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.toml");
    std::fs::write(&path, PACKAGE).unwrap();

    let definition = load_package(&path).unwrap();
    let etl = Etl::from_definition(
        definition,
        Arc::new(FilterStage::new("ValidateEmail", has_valid_email)),
    );

    assert!(etl.package.execute("withTransaction").await.is_success());
    assert_eq!(etl.count("users_copy"), 8);
}

#[test]
fn target_names_come_from_the_file() {
    let etl = Etl::new();
    assert_eq!(
        etl.package.target_names().collect::<Vec<_>>(),
        vec!["default", "join", "nothing", "withTransaction"]
    );
}

#[test]
fn missing_file_is_reported_with_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let err = load_package(&path).unwrap_err();

    assert!(matches!(err, ParseError::Io { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn unbound_participant_fails_the_build() {
    let definition = parse_package(PACKAGE).unwrap();

    let err = ConfigurationContext::builder(definition)
        .build()
        .err()
        .unwrap();

    let messages = match err {
        EngineError::Invalid(messages) => messages,
        other => panic!("expected validation messages, got {other}"),
    };
    assert!(messages
        .contains(&"pipeline 'CopyUsers' references unknown participant 'UsersSource'".to_string()));
}
