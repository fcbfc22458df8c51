//! Shared fixtures for the package specs

#![allow(dead_code)]

pub use serde_json::Value;
pub use sluice_adapters::{
    FailingStage, FilterStage, GatedSource, JoinStage, TableSink, TableSource, WriteMode,
};
pub use sluice_config::{load_package, parse_package, PackageDef, ParseError};
pub use sluice_core::{IsolationLevel, Row, Stage};
pub use sluice_engine::{
    ConfigurationContext, EngineError, ExecutionPackage, ExecutionStatus,
};
pub use sluice_storage::TableStore;
pub use std::sync::Arc;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once per process
///
/// Filter with `SLUICE_LOG`, e.g. `SLUICE_LOG=sluice_engine=debug`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env("SLUICE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Nine users; user 4 has an address without a domain
pub const USERS: &str = r#"[
    {"id": 1, "name": "ayende", "email": "ayende@example.org"},
    {"id": 2, "name": "foo", "email": "foo@example.org"},
    {"id": 3, "name": "bar", "email": "bar@example.org"},
    {"id": 4, "name": "broken", "email": "not-an-email"},
    {"id": 5, "name": "baz", "email": "baz@example.org"},
    {"id": 6, "name": "qux", "email": "qux@example.org"},
    {"id": 7, "name": "quux", "email": "quux@example.org"},
    {"id": 8, "name": "corge", "email": "corge@example.org"},
    {"id": 9, "name": "grault", "email": "grault@example.org"}
]"#;

/// Roles for the first four users
pub const ROLES: &str = r#"[
    {"user_id": 1, "role": "admin"},
    {"user_id": 2, "role": "editor"},
    {"user_id": 3, "role": "viewer"},
    {"user_id": 4, "role": "viewer"}
]"#;

pub const PACKAGE: &str = r#"
[connection.db]
concurrent_connections = 2

[target.default]
pipelines = ["CopyUsers"]

[target.withTransaction]
pipelines = ["CopyUsers"]
transaction = true

[target.join]
pipelines = ["CopyUsersWithJoin"]

[target.nothing]
pipelines = ["Empty"]

[[pipeline.CopyUsers.association]]
from = "UsersSource"
to = "ValidateEmail"

[[pipeline.CopyUsers.association]]
from = "ValidateEmail"
to = "UsersDestination"

[[pipeline.CopyUsersWithJoin.association]]
from = "UsersSource"
to = "JoinUserRoles"

[[pipeline.CopyUsersWithJoin.association]]
from = "RolesSource"
to = "JoinUserRoles"

[[pipeline.CopyUsersWithJoin.association]]
from = "JoinUserRoles"
to = "JoinedDestination"

[pipeline.Empty]
"#;

pub fn has_valid_email(row: &Row) -> bool {
    row.get_str("email").is_some_and(|email| email.contains('@'))
}

/// Store with `users` and `roles` seeded and empty destination tables
pub fn seeded_store() -> TableStore {
    let store = TableStore::new();
    store.seed_json("users", USERS).unwrap();
    store.seed_json("roles", ROLES).unwrap();
    store.create_table("users_copy");
    store.create_table("users_roles");
    store
}

/// A built package over a freshly seeded store
pub struct Etl {
    pub store: TableStore,
    pub package: ExecutionPackage,
}

impl Etl {
    pub fn new() -> Self {
        Self::with_validator(Arc::new(FilterStage::new("ValidateEmail", has_valid_email)))
    }

    /// Use `validator` in place of the e-mail filter
    pub fn with_validator(validator: Arc<dyn Stage>) -> Self {
        Self::from_definition(parse_package(PACKAGE).unwrap(), validator)
    }

    pub fn from_definition(definition: PackageDef, validator: Arc<dyn Stage>) -> Self {
        init_tracing();
        let store = seeded_store();
        let builder = ConfigurationContext::builder(definition);
        let db = builder.connection("db").unwrap();
        let package = builder
            .source(Arc::new(
                TableSource::new("UsersSource", store.clone(), "users").with_connection(db.clone()),
            ))
            .source(Arc::new(TableSource::new("RolesSource", store.clone(), "roles")))
            .stage(validator)
            .stage(Arc::new(
                TableSink::new("UsersDestination", store.clone(), "users_copy")
                    .with_connection(db.clone()),
            ))
            .stage(Arc::new(
                JoinStage::new("JoinUserRoles", "UsersSource", "RolesSource", "id")
                    .with_right_key("user_id"),
            ))
            .stage(Arc::new(
                TableSink::new("JoinedDestination", store.clone(), "users_roles")
                    .with_mode(WriteMode::Replace)
                    .with_connection(db),
            ))
            .build()
            .unwrap()
            .build_package();
        Self { store, package }
    }

    pub fn count(&self, table: &str) -> usize {
        self.store.count(table).unwrap()
    }

    /// The `id` column of every row in `table`, in table order
    pub fn ids(&self, table: &str) -> Vec<i64> {
        self.store
            .rows(table)
            .unwrap()
            .iter()
            .filter_map(|row| row.get("id").and_then(Value::as_i64))
            .collect()
    }
}
