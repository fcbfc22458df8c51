// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Contracts for pipeline participants
//!
//! A [`DataSource`] produces rows on its own once started. A [`Stage`]
//! receives rows from one or more inputs and may emit rows downstream.
//! Either may optionally draw from a [`Connection`](crate::Connection) by
//! answering `connection_user()`.

use crate::connection::ConnectionUser;
use crate::error::StageError;
use crate::flow::Outlet;
use crate::id::RunId;
use crate::row::Row;
use crate::transaction::Transaction;
use async_trait::async_trait;
use std::sync::Arc;

/// Per-run context handed to every participant call
#[derive(Clone, Debug)]
pub struct StageContext {
    pipeline: Arc<str>,
    target: Arc<str>,
    run_id: RunId,
    transaction: Option<Transaction>,
}

impl StageContext {
    pub fn new(
        pipeline: impl Into<Arc<str>>,
        target: impl Into<Arc<str>>,
        run_id: RunId,
        transaction: Option<Transaction>,
    ) -> Self {
        Self {
            pipeline: pipeline.into(),
            target: target.into(),
            run_id,
            transaction,
        }
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// The ambient transaction, if the target runs inside one
    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }
}

/// Push-based row producer
#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;

    /// Connection capability, if this source needs one
    fn connection_user(&self) -> Option<&dyn ConnectionUser> {
        None
    }

    /// Produce every row into `out`
    ///
    /// Returning (with or without error) closes the source's associations.
    async fn start(&self, ctx: &StageContext, out: &Outlet) -> Result<(), StageError>;
}

/// Row consumer, optionally emitting rows of its own
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    /// Connection capability, if this stage needs one
    fn connection_user(&self) -> Option<&dyn ConnectionUser> {
        None
    }

    /// Handle one row arriving from the participant named `input`
    async fn process(
        &self,
        ctx: &StageContext,
        input: &str,
        row: Row,
        out: &Outlet,
    ) -> Result<(), StageError>;

    /// Called once after every input has closed
    async fn finish(&self, ctx: &StageContext, out: &Outlet) -> Result<(), StageError> {
        let _ = (ctx, out);
        Ok(())
    }

    /// Called in place of `finish` when the run failed or died in this stage
    ///
    /// No more rows arrive for the run afterwards; drop any state kept for it.
    fn discard_run(&self, ctx: &StageContext) {
        let _ = ctx;
    }
}

/// Either end of an association
#[derive(Clone)]
pub enum Endpoint {
    Source(Arc<dyn DataSource>),
    Stage(Arc<dyn Stage>),
}

impl Endpoint {
    pub fn name(&self) -> &str {
        match self {
            Endpoint::Source(s) => s.name(),
            Endpoint::Stage(s) => s.name(),
        }
    }

    pub fn connection_user(&self) -> Option<&dyn ConnectionUser> {
        match self {
            Endpoint::Source(s) => s.connection_user(),
            Endpoint::Stage(s) => s.connection_user(),
        }
    }

    pub fn as_stage(&self) -> Option<&Arc<dyn Stage>> {
        match self {
            Endpoint::Stage(s) => Some(s),
            Endpoint::Source(_) => None,
        }
    }

    pub fn as_source(&self) -> Option<&Arc<dyn DataSource>> {
        match self {
            Endpoint::Source(s) => Some(s),
            Endpoint::Stage(_) => None,
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self, Endpoint::Source(_))
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Source(s) => write!(f, "Source({})", s.name()),
            Endpoint::Stage(s) => write!(f, "Stage({})", s.name()),
        }
    }
}
