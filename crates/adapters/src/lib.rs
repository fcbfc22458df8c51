// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Concrete pipeline participants

pub mod table;
pub mod traced;
pub mod transform;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use table::{TableSink, TableSource, WriteMode};
pub use traced::{TracedSource, TracedStage};
pub use transform::{FilterStage, JoinStage};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FailingStage, FakeSource, GatedSource, RecordingStage};

use thiserror::Error;

/// Errors raised by the built-in participants
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("stage {stage} has no input named {input}")]
    UnknownInput { stage: String, input: String },
    #[error(transparent)]
    Storage(#[from] sluice_storage::StorageError),
}
