// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directed edges between pipeline participants

use sluice_core::Endpoint;

/// A directed edge from one participant to a stage
///
/// An association reports completion once its receiving stage has drained
/// every row sent over it and finished.
#[derive(Clone, Debug)]
pub struct PipelineAssociation {
    from: Endpoint,
    to: Endpoint,
}

impl PipelineAssociation {
    pub fn new(from: Endpoint, to: Endpoint) -> Self {
        Self { from, to }
    }

    pub fn from(&self) -> &Endpoint {
        &self.from
    }

    pub fn to(&self) -> &Endpoint {
        &self.to
    }

    /// Append a message for every structural problem with this edge
    pub fn validate(&self, pipeline: &str, messages: &mut Vec<String>) {
        if self.from.name() == self.to.name() {
            messages.push(format!(
                "Pipeline '{}': association from '{}' to itself",
                pipeline,
                self.from.name()
            ));
        }
        if self.to.is_source() {
            messages.push(format!(
                "Pipeline '{}': '{}' is a source and cannot receive rows from '{}'",
                pipeline,
                self.to.name(),
                self.from.name()
            ));
        }
    }

    pub(crate) fn describe(&self) -> String {
        format!("{} -> {}", self.from.name(), self.to.name())
    }
}
