// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipelines: validation, connection acquisition, start and completion
//!
//! A pipeline run goes through `prepare` (fresh latch and run id), then
//! `start`. Start either acquires every connection the pipeline's
//! participants need and launches the run, or releases what it got and
//! defers itself until some other pipeline of the execution completes.
//! The run completes when every association has reported completion once.

use crate::association::PipelineAssociation;
use crate::context::{ExecutionContext, PipelineCompleted};
use crate::drive;
use crate::error::EngineError;
use crate::topology::Topology;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use sluice_core::{CountdownLatch, RunId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// What a call to [`Pipeline::start`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The run finished immediately (no associations) or had already finished
    Completed,
    /// Connections were busy; the start will be retried after a completion
    Deferred,
    /// Connections were acquired and sources launched
    Started,
}

/// State of one prepared run
pub(crate) struct RunState {
    pub run_id: RunId,
    /// Id of the execution context that prepared the run
    owner: u64,
    latch: CountdownLatch,
    reported: Vec<AtomicBool>,
    /// Participants holding a connection slot for this run
    acquired: Mutex<Vec<usize>>,
    /// Held while a start attempt decides, so attempts never overlap
    attempt: Mutex<()>,
    started: AtomicBool,
    deferred: AtomicBool,
    finished: AtomicBool,
    done: watch::Sender<bool>,
}

impl RunState {
    fn new(run_id: RunId, owner: u64, associations: usize) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            run_id,
            owner,
            latch: CountdownLatch::new(associations),
            reported: (0..associations).map(|_| AtomicBool::new(false)).collect(),
            acquired: Mutex::new(Vec::new()),
            attempt: Mutex::new(()),
            started: AtomicBool::new(false),
            deferred: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            done,
        }
    }

    fn is_done(&self) -> bool {
        *self.done.borrow()
    }

    fn is_launched(&self) -> bool {
        self.started.load(Ordering::Acquire) || self.deferred.load(Ordering::Acquire)
    }

    fn acquired(&self) -> MutexGuard<'_, Vec<usize>> {
        self.acquired.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A named graph of associations run as one unit
pub struct Pipeline {
    name: String,
    associations: Vec<PipelineAssociation>,
    topology: Option<Topology>,
    run: Mutex<Option<Arc<RunState>>>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, associations: Vec<PipelineAssociation>) -> Self {
        Self {
            name: name.into(),
            associations,
            topology: None,
            run: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn associations(&self) -> &[PipelineAssociation] {
        &self.associations
    }

    pub fn is_compiled(&self) -> bool {
        self.topology.is_some()
    }

    /// Append a message for every structural problem in the graph
    pub fn validate(&self, messages: &mut Vec<String>) {
        let mut seen = HashSet::new();
        for assoc in &self.associations {
            assoc.validate(&self.name, messages);
            if !seen.insert((assoc.from().name(), assoc.to().name())) {
                messages.push(format!(
                    "Pipeline '{}': duplicate association {}",
                    self.name,
                    assoc.describe()
                ));
            }
        }

        let receivers: HashSet<&str> = self.associations.iter().map(|a| a.to().name()).collect();
        let mut reported = HashSet::new();
        for assoc in &self.associations {
            let from = assoc.from().name();
            if !assoc.from().is_source() && !receivers.contains(from) && reported.insert(from) {
                messages.push(format!(
                    "Pipeline '{}': stage '{}' sends rows but never receives any",
                    self.name, from
                ));
            }
        }

        if self.has_cycle() {
            messages.push(format!("Pipeline '{}': associations form a cycle", self.name));
        }
    }

    // Self-loops are reported by the association itself
    fn has_cycle(&self) -> bool {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
        for assoc in &self.associations {
            let (from, to) = (assoc.from().name(), assoc.to().name());
            if from == to {
                continue;
            }
            let from = *nodes.entry(from).or_insert_with(|| graph.add_node(from));
            let to = *nodes.entry(to).or_insert_with(|| graph.add_node(to));
            graph.add_edge(from, to, ());
        }
        is_cyclic_directed(&graph)
    }

    /// Compile the participant graph and check connection capacities
    pub fn perform_second_stage_pass(&mut self) -> Result<(), EngineError> {
        let topology = Topology::compile(&self.name, &self.associations)?;
        self.ensure_can_get_all_connections(&topology)?;
        tracing::debug!(
            pipeline = %self.name,
            participants = topology.participants.len(),
            associations = self.associations.len(),
            "pipeline compiled"
        );
        self.topology = Some(topology);
        Ok(())
    }

    /// Fail if one run would need more slots of a connection than it has
    ///
    /// Every distinct participant holds its own slot for the whole run.
    fn ensure_can_get_all_connections(&self, topology: &Topology) -> Result<(), EngineError> {
        let mut required: BTreeMap<&str, (usize, u32)> = BTreeMap::new();
        for i in topology.connection_users() {
            let Some(connection) = topology.participants[i]
                .connection_user()
                .and_then(|user| user.connection_instance())
            else {
                continue;
            };
            required
                .entry(connection.name())
                .or_insert((0, connection.concurrent_connections()))
                .0 += 1;
        }

        for (connection, (count, limit)) in required {
            if count > limit as usize {
                return Err(EngineError::TooManyConcurrentConnections {
                    pipeline: self.name.clone(),
                    connection: connection.to_string(),
                    required: count,
                    limit,
                });
            }
        }
        Ok(())
    }

    /// Claim a fresh run for `ctx` ahead of a `start`
    ///
    /// Fails with `AlreadyRunning` while any earlier run, started or merely
    /// prepared, has not completed.
    pub fn prepare(&self, ctx: &ExecutionContext) -> Result<RunId, EngineError> {
        if self.topology.is_none() {
            return Err(EngineError::NotCompiled(self.name.clone()));
        }
        let mut slot = self.run.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|run| !run.is_done()) {
            return Err(EngineError::AlreadyRunning(self.name.clone()));
        }
        let run_id = ctx.ids().run_id(&self.name);
        tracing::debug!(pipeline = %self.name, run = %run_id, execution = ctx.id(), "pipeline prepared");
        *slot = Some(Arc::new(RunState::new(
            run_id.clone(),
            ctx.id(),
            self.associations.len(),
        )));
        Ok(run_id)
    }

    /// Give up a run `ctx` prepared but never started
    ///
    /// Returns whether a claim was dropped. Runs that were started or
    /// deferred are left to complete.
    pub fn release(&self, ctx: &ExecutionContext) -> bool {
        let mut slot = self.run.lock().unwrap_or_else(|e| e.into_inner());
        let unstarted = slot
            .as_ref()
            .is_some_and(|run| run.owner == ctx.id() && !run.is_launched() && !run.is_done());
        if unstarted {
            tracing::debug!(pipeline = %self.name, execution = ctx.id(), "prepared run released");
            *slot = None;
        }
        unstarted
    }

    /// Acquire connections and launch the prepared run, or defer it
    ///
    /// Only the execution that prepared the run may start it.
    pub fn start(self: &Arc<Self>, ctx: &Arc<ExecutionContext>) -> Result<StartOutcome, EngineError> {
        let run = self.current_run()?;
        if run.is_done() {
            return Ok(StartOutcome::Completed);
        }
        if run.owner != ctx.id() {
            return Err(EngineError::AlreadyRunning(self.name.clone()));
        }
        self.start_run(ctx, run)
    }

    fn start_run(
        self: &Arc<Self>,
        ctx: &Arc<ExecutionContext>,
        run: Arc<RunState>,
    ) -> Result<StartOutcome, EngineError> {
        let _attempt = run.attempt.lock().unwrap_or_else(|e| e.into_inner());
        if run.is_done() {
            return Ok(StartOutcome::Completed);
        }
        if run.started.load(Ordering::Acquire) {
            return Ok(StartOutcome::Started);
        }

        if self.associations.is_empty() {
            run.started.store(true, Ordering::Release);
            tracing::info!(pipeline = %self.name, run = %run.run_id, "pipeline has no associations");
            self.complete(ctx, &run);
            return Ok(StartOutcome::Completed);
        }

        let topology = self
            .topology
            .as_ref()
            .ok_or_else(|| EngineError::NotCompiled(self.name.clone()))?;

        // Subscribe before trying, so a release in between still wakes the retry
        let completions = ctx.subscribe_completions();

        if let Err(blocked) = self.try_acquire_all(topology, &run) {
            run.deferred.store(true, Ordering::Release);
            tracing::warn!(
                pipeline = %self.name,
                run = %run.run_id,
                connection = %blocked,
                "could not acquire all connections, will retry when the next pipeline completes"
            );
            let pipeline = Arc::clone(self);
            let retry_ctx = Arc::clone(ctx);
            let retry_run = Arc::clone(&run);
            ctx.execute_on_pipeline_completed(completions, move || {
                if let Err(e) = pipeline.start_run(&retry_ctx, Arc::clone(&retry_run)) {
                    pipeline.abandon(&retry_ctx, &retry_run, e);
                }
            });
            return Ok(StartOutcome::Deferred);
        }

        run.started.store(true, Ordering::Release);
        tracing::info!(
            pipeline = %self.name,
            run = %run.run_id,
            connections = run.acquired().len(),
            "pipeline started"
        );
        drive::connect_ends(self, ctx, &run, topology);
        Ok(StartOutcome::Started)
    }

    /// Watch that turns `true` once the current run has completed
    pub fn completion(&self) -> Result<watch::Receiver<bool>, EngineError> {
        Ok(self.current_run()?.done.subscribe())
    }

    pub fn is_completed(&self) -> bool {
        self.current_run().is_ok_and(|run| run.is_done())
    }

    /// Report that association `index` of the current run has finished
    ///
    /// Returns whether this call was the one that reported it.
    pub fn association_completed(
        &self,
        ctx: &ExecutionContext,
        index: usize,
    ) -> Result<bool, EngineError> {
        let run = self.current_run()?;
        Ok(self.complete_association(ctx, &run, index))
    }

    pub(crate) fn complete_association(
        &self,
        ctx: &ExecutionContext,
        run: &RunState,
        index: usize,
    ) -> bool {
        let Some(flag) = run.reported.get(index) else {
            tracing::warn!(pipeline = %self.name, index, "completion for unknown association");
            return false;
        };
        if flag.swap(true, Ordering::AcqRel) {
            return false;
        }

        match run.latch.count_down() {
            Ok(0) => self.complete(ctx, run),
            Ok(remaining) => {
                tracing::trace!(pipeline = %self.name, index, remaining, "association completed")
            }
            Err(source) => ctx.record_failure(EngineError::Latch {
                pipeline: self.name.clone(),
                source,
            }),
        }
        true
    }

    /// Release the run's connections, then signal and broadcast completion
    fn complete(&self, ctx: &ExecutionContext, run: &RunState) {
        if run.finished.swap(true, Ordering::AcqRel) {
            return;
        }

        let acquired = std::mem::take(&mut *run.acquired());
        if let Some(topology) = &self.topology {
            for &i in &acquired {
                if let Some(user) = topology.participants[i].connection_user() {
                    user.release_connection(&self.name);
                }
            }
        }

        tracing::info!(
            pipeline = %self.name,
            run = %run.run_id,
            released = acquired.len(),
            "pipeline completed"
        );
        run.done.send_replace(true);
        ctx.notify_pipeline_completed(PipelineCompleted {
            pipeline: self.name.clone(),
            run_id: run.run_id.clone(),
        });
    }

    /// Give up on a run that cannot be started, so nobody waits on it forever
    fn abandon(&self, ctx: &ExecutionContext, run: &RunState, error: EngineError) {
        ctx.record_failure(error);
        self.complete(ctx, run);
    }

    /// All-or-nothing acquisition in participant order
    ///
    /// On failure every slot taken by this attempt is released again and the
    /// name of the busy connection is returned.
    fn try_acquire_all(&self, topology: &Topology, run: &RunState) -> Result<(), String> {
        let mut acquired = Vec::new();
        for i in topology.connection_users() {
            let Some(user) = topology.participants[i].connection_user() else {
                continue;
            };
            if user.try_acquire_connection(&self.name) {
                acquired.push(i);
                continue;
            }

            for &held in &acquired {
                if let Some(user) = topology.participants[held].connection_user() {
                    user.release_connection(&self.name);
                }
            }
            let blocked = user
                .connection_instance()
                .map(|c| c.name().to_string())
                .unwrap_or_default();
            return Err(blocked);
        }
        *run.acquired() = acquired;
        Ok(())
    }

    fn current_run(&self) -> Result<Arc<RunState>, EngineError> {
        self.run
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| EngineError::NotPrepared(self.name.clone()))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("associations", &self.associations)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
