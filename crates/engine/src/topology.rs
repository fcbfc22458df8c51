// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compiled participant graph of one pipeline

use crate::association::PipelineAssociation;
use crate::error::EngineError;
use sluice_core::Endpoint;
use std::collections::HashMap;

/// Indexed view of a pipeline's associations
///
/// Participants are numbered in first-seen association order. Association
/// `i` runs from `ends[i].0` to `ends[i].1` and arrives on input slot
/// `slots[i]` of its receiver.
#[derive(Debug)]
pub(crate) struct Topology {
    pub participants: Vec<Endpoint>,
    pub ends: Vec<(usize, usize)>,
    pub slots: Vec<usize>,
    pub incoming: Vec<Vec<usize>>,
    pub outgoing: Vec<Vec<usize>>,
}

impl Topology {
    pub fn compile(
        pipeline: &str,
        associations: &[PipelineAssociation],
    ) -> Result<Self, EngineError> {
        let mut topology = Topology {
            participants: Vec::new(),
            ends: Vec::with_capacity(associations.len()),
            slots: Vec::with_capacity(associations.len()),
            incoming: Vec::new(),
            outgoing: Vec::new(),
        };
        let mut index: HashMap<String, usize> = HashMap::new();

        for (i, assoc) in associations.iter().enumerate() {
            if assoc.to().as_stage().is_none() {
                return Err(EngineError::Invalid(vec![format!(
                    "Pipeline '{}': '{}' cannot receive rows",
                    pipeline,
                    assoc.to().name()
                )]));
            }
            let from = topology.intern(&mut index, assoc.from());
            let to = topology.intern(&mut index, assoc.to());
            topology.ends.push((from, to));
            topology.slots.push(topology.incoming[to].len());
            topology.incoming[to].push(i);
            topology.outgoing[from].push(i);
        }

        Ok(topology)
    }

    fn intern(&mut self, index: &mut HashMap<String, usize>, end: &Endpoint) -> usize {
        if let Some(&i) = index.get(end.name()) {
            return i;
        }
        let i = self.participants.len();
        index.insert(end.name().to_string(), i);
        self.participants.push(end.clone());
        self.incoming.push(Vec::new());
        self.outgoing.push(Vec::new());
        i
    }

    /// Participants that draw from a connection, in acquisition order
    pub fn connection_users(&self) -> impl Iterator<Item = usize> + '_ {
        self.participants.iter().enumerate().filter_map(|(i, p)| {
            p.connection_user()
                .and_then(|u| u.connection_instance())
                .map(|_| i)
        })
    }

    pub fn sources(&self) -> impl Iterator<Item = usize> + '_ {
        self.participants
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_source())
            .map(|(i, _)| i)
    }

    pub fn stages(&self) -> impl Iterator<Item = usize> + '_ {
        self.participants
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_source())
            .map(|(i, _)| i)
    }
}
