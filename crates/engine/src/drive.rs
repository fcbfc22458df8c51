// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wiring and driving one started run
//!
//! Every stage gets an inbox and a task draining it; every source gets a task
//! running its `start`. All channels are created before any task is spawned.

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::pipeline::{Pipeline, RunState};
use crate::topology::Topology;
use sluice_core::{
    inbox, AssociationSender, DataSource, Envelope, Inbox, InboxSender, Outlet, Stage,
    StageContext, StageError,
};
use std::sync::Arc;

/// Create the channels of a run and launch its stages and sources
pub(crate) fn connect_ends(
    pipeline: &Arc<Pipeline>,
    ctx: &Arc<ExecutionContext>,
    run: &Arc<RunState>,
    topology: &Topology,
) {
    let stage_ctx = StageContext::new(
        pipeline.name(),
        ctx.target(),
        run.run_id.clone(),
        ctx.transaction().cloned(),
    );
    let count = topology.participants.len();

    let mut senders: Vec<Option<InboxSender>> = vec![None; count];
    let mut inboxes: Vec<Option<Inbox>> = (0..count).map(|_| None).collect();
    for i in topology.stages() {
        let (tx, rx) = inbox();
        senders[i] = Some(tx);
        inboxes[i] = Some(rx);
    }

    let mut links: Vec<Vec<AssociationSender>> = (0..count).map(|_| Vec::new()).collect();
    for (assoc, &(from, to)) in topology.ends.iter().enumerate() {
        let Some(tx) = senders[to].clone() else {
            continue;
        };
        links[from].push(AssociationSender::new(
            topology.slots[assoc],
            topology.participants[to].name(),
            tx,
        ));
    }
    // Only association senders may keep an inbox open
    drop(senders);
    let mut outlets: Vec<Option<Outlet>> = links.into_iter().map(|l| Some(Outlet::new(l))).collect();

    for i in topology.stages() {
        let Some(stage) = topology.participants[i].as_stage().cloned() else {
            continue;
        };
        let (Some(inbox), Some(outlet)) = (inboxes[i].take(), outlets[i].take()) else {
            continue;
        };
        let inputs = topology.incoming[i]
            .iter()
            .map(|&assoc| topology.participants[topology.ends[assoc].0].name().to_string())
            .collect();
        let guard = CompletionGuard {
            pipeline: Arc::clone(pipeline),
            ctx: Arc::clone(ctx),
            run: Arc::clone(run),
            stage: Arc::clone(&stage),
            stage_ctx: stage_ctx.clone(),
            associations: topology.incoming[i].clone(),
            clean: false,
        };
        ctx.spawn(drive_stage(stage, stage_ctx.clone(), inbox, outlet, inputs, guard));
    }

    for i in topology.sources() {
        let Some(source) = topology.participants[i].as_source().cloned() else {
            continue;
        };
        let Some(outlet) = outlets[i].take() else {
            continue;
        };
        let guard = SourceGuard {
            ctx: Arc::clone(ctx),
            pipeline: pipeline.name().to_string(),
            participant: source.name().to_string(),
            outlet: Some(outlet),
            clean: false,
        };
        let name = source.name().to_string();
        ctx.register_for_execution(&name, run_source(source, stage_ctx.clone(), guard));
    }
}

async fn run_source(source: Arc<dyn DataSource>, ctx: StageContext, guard: SourceGuard) {
    if let Some(outlet) = &guard.outlet {
        if let Err(e) = source.start(&ctx, outlet).await {
            guard.fail(e);
        }
    }
    guard.disarm();
}

/// Feed every row to the stage until all inputs close, then finish it
///
/// After the first failure the remaining rows are discarded, but inputs are
/// still drained so producers are never blocked on this stage.
async fn drive_stage(
    stage: Arc<dyn Stage>,
    ctx: StageContext,
    mut inbox: Inbox,
    outlet: Outlet,
    inputs: Vec<String>,
    guard: CompletionGuard,
) {
    let mut open = inputs.len();
    let mut failed = false;
    let mut discarded = 0u64;

    while open > 0 {
        let Some(envelope) = inbox.recv().await else {
            break;
        };
        match envelope {
            Envelope::Row { input, row } => {
                if failed {
                    discarded += 1;
                    continue;
                }
                let name = inputs.get(input).map(String::as_str).unwrap_or_default();
                if let Err(e) = stage.process(&ctx, name, row, &outlet).await {
                    guard.fail(e);
                    failed = true;
                }
            }
            Envelope::Closed { input } => {
                open -= 1;
                tracing::trace!(stage = stage.name(), input, open, "input closed");
            }
        }
    }

    if failed {
        stage.discard_run(&ctx);
    } else if let Err(e) = stage.finish(&ctx, &outlet).await {
        guard.fail(e);
    }
    if discarded > 0 {
        tracing::debug!(stage = stage.name(), discarded, "rows discarded after failure");
    }

    drop(outlet);
    guard.disarm();
}

/// Reports a stage's incoming associations as completed when dropped
///
/// Dropped without [`disarm`](Self::disarm), the stage task died (panicked
/// or was cancelled): that is recorded as a failure first and the stage's
/// state for the run is discarded.
struct CompletionGuard {
    pipeline: Arc<Pipeline>,
    ctx: Arc<ExecutionContext>,
    run: Arc<RunState>,
    stage: Arc<dyn Stage>,
    stage_ctx: StageContext,
    associations: Vec<usize>,
    clean: bool,
}

impl CompletionGuard {
    fn fail(&self, source: StageError) {
        self.ctx.record_failure(EngineError::Stage {
            pipeline: self.pipeline.name().to_string(),
            participant: self.stage.name().to_string(),
            source,
        });
    }

    fn disarm(mut self) {
        self.clean = true;
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.clean {
            self.ctx.record_failure(EngineError::StagePanicked {
                pipeline: self.pipeline.name().to_string(),
                participant: self.stage.name().to_string(),
            });
            self.stage.discard_run(&self.stage_ctx);
        }
        for &assoc in &self.associations {
            self.pipeline
                .complete_association(&self.ctx, &self.run, assoc);
        }
    }
}

/// Closes a source's outlet when dropped
///
/// Dropped without [`disarm`](Self::disarm), the source task died and that
/// is recorded before any downstream stage can see its inputs close.
struct SourceGuard {
    ctx: Arc<ExecutionContext>,
    pipeline: String,
    participant: String,
    outlet: Option<Outlet>,
    clean: bool,
}

impl SourceGuard {
    fn fail(&self, source: StageError) {
        self.ctx.record_failure(EngineError::Stage {
            pipeline: self.pipeline.clone(),
            participant: self.participant.clone(),
            source,
        });
    }

    fn disarm(mut self) {
        self.clean = true;
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        if !self.clean {
            self.ctx.record_failure(EngineError::StagePanicked {
                pipeline: self.pipeline.clone(),
                participant: self.participant.clone(),
            });
        }
        drop(self.outlet.take());
    }
}
