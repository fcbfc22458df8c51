// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sluice execution engine
//!
//! Builds pipelines from a package definition, runs targets, coordinates
//! connection acquisition between concurrently running pipelines, and
//! commits or rolls back the target's transaction.

mod association;
mod configuration;
mod context;
mod drive;
mod error;
mod package;
mod pipeline;
mod topology;

pub use association::PipelineAssociation;
pub use configuration::{ConfigurationBuilder, ConfigurationContext};
pub use context::{ExecutionContext, PipelineCompleted};
pub use error::EngineError;
pub use package::{ExecutionPackage, ExecutionResult, ExecutionStatus};
pub use pipeline::{Pipeline, StartOutcome};
