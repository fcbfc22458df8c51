// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors raised by pipeline participants

use thiserror::Error;

/// Failure raised while a source or stage handles rows
#[derive(Debug, Error)]
pub enum StageError {
    #[error("stage {stage} failed: {message}")]
    Failed { stage: String, message: String },
    #[error("row is missing column '{0}'")]
    MissingColumn(String),
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl StageError {
    pub fn failed(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Wrap any foreign error
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(err))
    }
}
