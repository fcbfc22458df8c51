// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared state of one execution request

use crate::error::EngineError;
use sluice_core::{IdGen, RunId, Transaction};
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::sync::broadcast;

pub(crate) const COMPLETION_CAPACITY: usize = 64;

static NEXT_EXECUTION: AtomicU64 = AtomicU64::new(1);

/// Broadcast whenever any pipeline of the execution completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineCompleted {
    pub pipeline: String,
    pub run_id: RunId,
}

/// Context threaded through every `start` of one execution
///
/// Holds the completion broadcast that deferred starts wait on, the failures
/// recorded by participants, and the ambient transaction. The broadcast is
/// private to the context unless it is attached to a shared one with
/// [`with_completions`](Self::with_completions).
pub struct ExecutionContext {
    id: u64,
    target: String,
    transaction: Option<Transaction>,
    completed: broadcast::Sender<PipelineCompleted>,
    failures: Mutex<Vec<EngineError>>,
    pending_retries: Arc<AtomicUsize>,
    runtime: Handle,
    ids: Arc<dyn IdGen>,
}

impl ExecutionContext {
    /// Create a context bound to the current tokio runtime
    pub fn new(
        target: impl Into<String>,
        transaction: Option<Transaction>,
        ids: Arc<dyn IdGen>,
    ) -> Result<Self, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let (completed, _) = broadcast::channel(COMPLETION_CAPACITY);
        Ok(Self {
            id: NEXT_EXECUTION.fetch_add(1, Ordering::Relaxed),
            target: target.into(),
            transaction,
            completed,
            failures: Mutex::new(Vec::new()),
            pending_retries: Arc::new(AtomicUsize::new(0)),
            runtime,
            ids,
        })
    }

    /// Publish and receive completions on `completed`
    ///
    /// Contexts sharing one sender wake each other's deferred starts.
    pub fn with_completions(mut self, completed: broadcast::Sender<PipelineCompleted>) -> Self {
        self.completed = completed;
        self
    }

    /// Identifies this execution among all contexts of the process
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    pub fn ids(&self) -> &dyn IdGen {
        self.ids.as_ref()
    }

    /// Listen for pipeline completions from now on
    pub fn subscribe_completions(&self) -> broadcast::Receiver<PipelineCompleted> {
        self.completed.subscribe()
    }

    /// Announce a completed pipeline to every waiter
    pub fn notify_pipeline_completed(&self, event: PipelineCompleted) {
        // No receivers just means nobody is waiting
        let waiters = self.completed.send(event.clone()).unwrap_or(0);
        tracing::debug!(pipeline = %event.pipeline, run = %event.run_id, waiters, "completion broadcast");
    }

    /// Run `action` once the next pipeline completion reaches `completions`
    ///
    /// Pass a receiver taken before the attempt that is being deferred, so a
    /// completion that happens in between is not missed.
    pub fn execute_on_pipeline_completed<F>(
        &self,
        mut completions: broadcast::Receiver<PipelineCompleted>,
        action: F,
    ) where
        F: FnOnce() + Send + 'static,
    {
        let pending = Arc::clone(&self.pending_retries);
        pending.fetch_add(1, Ordering::SeqCst);
        self.runtime.spawn(async move {
            let woken = match completions.recv().await {
                Ok(event) => {
                    tracing::trace!(after = %event.pipeline, "retrying deferred start");
                    true
                }
                // Missed some completions, which still means something finished
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::trace!(skipped, "retrying deferred start after lag");
                    true
                }
                Err(broadcast::error::RecvError::Closed) => false,
            };
            pending.fetch_sub(1, Ordering::SeqCst);
            if woken {
                action();
            }
        });
    }

    /// Run a source start on the execution's runtime
    pub fn register_for_execution<F>(&self, source: &str, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::trace!(target_name = %self.target, source, "source scheduled");
        self.runtime.spawn(action);
    }

    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.runtime.spawn(task);
    }

    /// Deferred starts still waiting for a completion
    pub fn pending_retries(&self) -> usize {
        self.pending_retries.load(Ordering::SeqCst)
    }

    pub fn record_failure(&self, error: EngineError) {
        tracing::error!(target_name = %self.target, error = %error, "execution failure recorded");
        self.failures().push(error);
    }

    pub fn has_failed(&self) -> bool {
        !self.failures().is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().len()
    }

    /// Remove and return every recorded failure
    pub fn take_failures(&self) -> Vec<EngineError> {
        std::mem::take(&mut *self.failures())
    }

    fn failures(&self) -> MutexGuard<'_, Vec<EngineError>> {
        self.failures.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("transaction", &self.transaction)
            .field("pending_retries", &self.pending_retries())
            .finish()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
