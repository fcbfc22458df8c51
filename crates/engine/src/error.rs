// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the execution engine

use sluice_core::{LatchError, StageError, TransactionError};
use thiserror::Error;

/// Errors from configuring or running pipelines
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(
        "Pipeline '{pipeline}' requires {required} concurrent connections from '{connection}', but limit is {limit}"
    )]
    TooManyConcurrentConnections {
        pipeline: String,
        connection: String,
        required: usize,
        limit: u32,
    },
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("pipeline '{pipeline}' references unknown participant '{name}'")]
    UnknownEndpoint { pipeline: String, name: String },
    #[error("pipeline not found: {0}")]
    UnknownPipeline(String),
    #[error("target not found: {0}")]
    UnknownTarget(String),
    #[error("connection not found: {0}")]
    UnknownConnection(String),
    #[error("pipeline '{0}' has not been compiled")]
    NotCompiled(String),
    #[error("pipeline '{0}' was started without being prepared")]
    NotPrepared(String),
    #[error("pipeline '{0}' is already running")]
    AlreadyRunning(String),
    #[error("no tokio runtime is available to run pipelines on")]
    NoRuntime,
    #[error("pipeline '{pipeline}': {participant} failed: {source}")]
    Stage {
        pipeline: String,
        participant: String,
        #[source]
        source: StageError,
    },
    #[error("pipeline '{pipeline}': {participant} panicked")]
    StagePanicked {
        pipeline: String,
        participant: String,
    },
    #[error("pipeline '{pipeline}': {source}")]
    Latch {
        pipeline: String,
        #[source]
        source: LatchError,
    },
    #[error("pipeline '{0}': run ended without completing")]
    RunLost(String),
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

impl EngineError {
    /// Whether this error was raised while building the configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EngineError::TooManyConcurrentConnections { .. }
                | EngineError::Invalid(_)
                | EngineError::UnknownEndpoint { .. }
                | EngineError::UnknownPipeline(_)
                | EngineError::UnknownTarget(_)
                | EngineError::UnknownConnection(_)
                | EngineError::NotCompiled(_)
        )
    }
}
