// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution of named targets

use crate::context::{ExecutionContext, PipelineCompleted, COMPLETION_CAPACITY};
use crate::error::EngineError;
use crate::pipeline::{Pipeline, StartOutcome};
use sluice_config::TargetDef;
use sluice_core::{Connection, IdGen, IsolationLevel, Transaction};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tracing::Instrument;

/// Outcome of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failure,
}

/// Result record of one [`ExecutionPackage::execute`] call
#[derive(Debug)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub errors: Vec<EngineError>,
    pub elapsed: Duration,
}

impl ExecutionResult {
    fn finished(errors: Vec<EngineError>, elapsed: Duration) -> Self {
        let status = if errors.is_empty() {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failure
        };
        Self {
            status,
            errors,
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// The first captured error, if any
    pub fn error(&self) -> Option<&EngineError> {
        self.errors.first()
    }
}

/// Runs the targets of a validated configuration
///
/// Every execution shares the package's completion broadcast, so a start
/// deferred in one `execute` call wakes when a pipeline of any other call
/// completes and releases its connections.
pub struct ExecutionPackage {
    connections: BTreeMap<String, Arc<Connection>>,
    pipelines: BTreeMap<String, Arc<Pipeline>>,
    targets: BTreeMap<String, TargetDef>,
    ids: Arc<dyn IdGen>,
    completed: broadcast::Sender<PipelineCompleted>,
}

impl ExecutionPackage {
    pub(crate) fn new(
        connections: BTreeMap<String, Arc<Connection>>,
        pipelines: BTreeMap<String, Arc<Pipeline>>,
        targets: BTreeMap<String, TargetDef>,
        ids: Arc<dyn IdGen>,
    ) -> Self {
        let (completed, _) = broadcast::channel(COMPLETION_CAPACITY);
        Self {
            connections,
            pipelines,
            targets,
            ids,
            completed,
        }
    }

    pub fn pipeline(&self, name: &str) -> Option<&Arc<Pipeline>> {
        self.pipelines.get(name)
    }

    pub fn connection(&self, name: &str) -> Option<&Arc<Connection>> {
        self.connections.get(name)
    }

    pub fn target_names(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    /// Run every pipeline of `target`, inside a transaction if it asks for one
    pub async fn execute(&self, target: &str) -> ExecutionResult {
        let isolation = self
            .targets
            .get(target)
            .and_then(|def| def.transaction.isolation());
        self.run(target, isolation).await
    }

    /// Run every pipeline of `target` inside a transaction at `isolation`
    pub async fn execute_with_isolation(
        &self,
        target: &str,
        isolation: IsolationLevel,
    ) -> ExecutionResult {
        self.run(target, Some(isolation)).await
    }

    async fn run(&self, target: &str, isolation: Option<IsolationLevel>) -> ExecutionResult {
        let span = tracing::info_span!("execute", target_name = target);
        let started = Instant::now();

        let errors = self.run_target(target, isolation).instrument(span.clone()).await;
        let result = ExecutionResult::finished(errors, started.elapsed());

        let _guard = span.enter();
        match result.status {
            ExecutionStatus::Success => tracing::info!(
                elapsed_ms = result.elapsed.as_millis() as u64,
                "execution succeeded"
            ),
            ExecutionStatus::Failure => tracing::error!(
                elapsed_ms = result.elapsed.as_millis() as u64,
                errors = result.errors.len(),
                "execution failed"
            ),
        }
        result
    }

    async fn run_target(&self, name: &str, isolation: Option<IsolationLevel>) -> Vec<EngineError> {
        let Some(target) = self.targets.get(name) else {
            return vec![EngineError::UnknownTarget(name.to_string())];
        };

        let mut pipelines = Vec::with_capacity(target.pipelines.len());
        for pipeline in &target.pipelines {
            match self.pipelines.get(pipeline) {
                Some(p) => pipelines.push(Arc::clone(p)),
                None => return vec![EngineError::UnknownPipeline(pipeline.clone())],
            }
        }

        let transaction =
            isolation.map(|level| Transaction::begin(self.ids.transaction_id(), level));
        let ctx = match ExecutionContext::new(name, transaction.clone(), Arc::clone(&self.ids)) {
            Ok(ctx) => Arc::new(ctx.with_completions(self.completed.clone())),
            Err(e) => return Self::abort(transaction, vec![e]),
        };

        // Subscribe right after claiming, while nothing else can replace the run
        let mut waits = Vec::with_capacity(pipelines.len());
        for pipeline in &pipelines {
            let claimed = pipeline.prepare(&ctx).and_then(|_| pipeline.completion());
            match claimed {
                Ok(done) => waits.push((pipeline, done)),
                Err(e) => {
                    for pipeline in &pipelines {
                        pipeline.release(&ctx);
                    }
                    return Self::abort(transaction, vec![e]);
                }
            }
        }

        let mut started = Vec::with_capacity(waits.len());
        for (pipeline, done) in waits {
            match pipeline.start(&ctx) {
                Ok(StartOutcome::Deferred) => {
                    tracing::debug!(pipeline = pipeline.name(), "start deferred");
                    started.push((pipeline, done));
                }
                Ok(_) => started.push((pipeline, done)),
                Err(e) => {
                    ctx.record_failure(e);
                    pipeline.release(&ctx);
                }
            }
        }

        for (pipeline, done) in started {
            await_run(&ctx, pipeline.name(), done).await;
        }

        let errors = ctx.take_failures();
        match transaction {
            Some(tx) if errors.is_empty() => match tx.commit() {
                Ok(()) => Vec::new(),
                Err(e) => vec![EngineError::Transaction(e)],
            },
            tx => Self::abort(tx, errors),
        }
    }

    fn abort(transaction: Option<Transaction>, mut errors: Vec<EngineError>) -> Vec<EngineError> {
        if let Some(tx) = transaction {
            if let Err(e) = tx.rollback() {
                errors.push(EngineError::Transaction(e));
            }
        }
        errors
    }
}

/// Wait for a run to complete, recording a failure if it never can
async fn await_run(ctx: &ExecutionContext, pipeline: &str, mut done: watch::Receiver<bool>) {
    if done.wait_for(|finished| *finished).await.is_err() {
        ctx.record_failure(EngineError::RunLost(pipeline.to_string()));
    }
}

impl std::fmt::Debug for ExecutionPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPackage")
            .field("connections", &self.connections.keys().collect::<Vec<_>>())
            .field("pipelines", &self.pipelines.keys().collect::<Vec<_>>())
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
#[path = "package_tests.rs"]
mod tests;
