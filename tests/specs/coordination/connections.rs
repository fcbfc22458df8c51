//! Connection coordination specs
//!
//! Verify pipelines that share connections never over-subscribe them and
//! still all run to completion.

use crate::prelude::*;
use similar_asserts::assert_eq;
use std::time::Duration;

const CONTENDED: &str = r#"
[connection.db]

[connection.cache]

[target.contended]
pipelines = ["Hold", "Export"]

[[pipeline.Hold.association]]
from = "HoldSource"
to = "HoldSink"

[[pipeline.Export.association]]
from = "ExportSource"
to = "ExportSink"
"#;

struct Contended {
    store: TableStore,
    gate: GatedSource,
    package: ExecutionPackage,
}

/// `Hold` keeps `db` busy until its gate opens; `Export` needs `cache`
/// first and then `db`
fn contended() -> Contended {
    init_tracing();
    let store = seeded_store();
    store.create_table("held");
    store.create_table("exported");

    let builder = ConfigurationContext::builder(parse_package(CONTENDED).unwrap());
    let db = builder.connection("db").unwrap();
    let cache = builder.connection("cache").unwrap();
    let gate = GatedSource::new("HoldSource", vec![Row::new().with("id", 100)])
        .with_connection(db.clone());
    let package = builder
        .source(Arc::new(gate.clone()))
        .stage(Arc::new(TableSink::new("HoldSink", store.clone(), "held")))
        .source(Arc::new(
            TableSource::new("ExportSource", store.clone(), "users").with_connection(cache),
        ))
        .stage(Arc::new(
            TableSink::new("ExportSink", store.clone(), "exported").with_connection(db),
        ))
        .build()
        .unwrap()
        .build_package();

    Contended {
        store,
        gate,
        package,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocked_pipeline_holds_no_connections_while_waiting() {
    let Contended {
        store,
        gate,
        package,
    } = contended();
    let package = Arc::new(package);

    let running = {
        let package = Arc::clone(&package);
        tokio::spawn(async move { package.execute("contended").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(package.connection("db").unwrap().in_use(), 1);
    assert_eq!(package.connection("cache").unwrap().in_use(), 0);
    assert!(!package.pipeline("Export").unwrap().is_completed());
    assert_eq!(store.count("exported").unwrap(), 0);

    gate.open();
    let result = running.await.unwrap();
    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(store.count("held").unwrap(), 1);
    assert_eq!(store.count("exported").unwrap(), 9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn waiting_pipeline_starts_once_the_holder_completes() {
    let Contended {
        store,
        gate,
        package,
    } = contended();
    gate.open();

    let result = tokio::time::timeout(Duration::from_secs(5), package.execute("contended"))
        .await
        .expect("contended target should finish");

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(store.count("exported").unwrap(), 9);
    assert_eq!(package.connection("db").unwrap().in_use(), 0);
    assert_eq!(package.connection("cache").unwrap().in_use(), 0);
}

#[test]
fn pipeline_needing_more_than_a_connection_allows_fails_to_build() {
    let definition = parse_package(
        r#"
[connection.db]
concurrent_connections = 1

[[pipeline.CopyUsers.association]]
from = "UsersSource"
to = "UsersDestination"
"#,
    )
    .unwrap();
    let store = seeded_store();
    let builder = ConfigurationContext::builder(definition);
    let db = builder.connection("db").unwrap();

    let err = builder
        .source(Arc::new(
            TableSource::new("UsersSource", store.clone(), "users").with_connection(db.clone()),
        ))
        .stage(Arc::new(
            TableSink::new("UsersDestination", store, "users_copy").with_connection(db),
        ))
        .build()
        .err()
        .unwrap();

    assert_eq!(
        err.to_string(),
        "Pipeline 'CopyUsers' requires 2 concurrent connections from 'db', but limit is 1"
    );
}
