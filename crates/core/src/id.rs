// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifiers for pipeline runs and transactions

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies one run of one pipeline
///
/// Stages that buffer rows key their per-run state on this.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(pub String);

impl RunId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates identifiers for runs and transactions
pub trait IdGen: Send + Sync {
    fn run_id(&self, pipeline: &str) -> RunId;
    fn transaction_id(&self) -> String;
}

/// UUID-backed generator for production use
#[derive(Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn run_id(&self, pipeline: &str) -> RunId {
        RunId(format!("{}:{}", pipeline, uuid::Uuid::new_v4()))
    }

    fn transaction_id(&self) -> String {
        format!("tx-{}", uuid::Uuid::new_v4())
    }
}

/// Counter-backed generator with predictable output for tests
#[derive(Clone, Default)]
pub struct SequentialIdGen {
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl IdGen for SequentialIdGen {
    fn run_id(&self, pipeline: &str) -> RunId {
        RunId(format!("{}:{}", pipeline, self.bump()))
    }

    fn transaction_id(&self) -> String {
        format!("tx-{}", self.bump())
    }
}
