// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Package definition types

use serde::{Deserialize, Serialize};
use sluice_core::IsolationLevel;
use std::collections::BTreeMap;

/// Default number of concurrent holders for a connection
pub const DEFAULT_CONCURRENT_CONNECTIONS: u32 = 1;

/// A named connection and its capacity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDef {
    pub name: String,
    pub concurrent_connections: u32,
}

impl ConnectionDef {
    pub fn new(name: impl Into<String>, concurrent_connections: u32) -> Self {
        Self {
            name: name.into(),
            concurrent_connections,
        }
    }
}

/// Whether a target runs inside a transaction scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionMode {
    /// Writes are applied as they happen and survive failures
    #[default]
    None,
    /// Writes are committed on success and rolled back on failure
    Required { isolation: IsolationLevel },
}

impl TransactionMode {
    pub fn is_transactional(&self) -> bool {
        matches!(self, TransactionMode::Required { .. })
    }

    pub fn isolation(&self) -> Option<IsolationLevel> {
        match self {
            TransactionMode::Required { isolation } => Some(*isolation),
            TransactionMode::None => None,
        }
    }
}

/// A named entry point that runs one or more pipelines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDef {
    pub name: String,
    pub pipelines: Vec<String>,
    #[serde(default)]
    pub transaction: TransactionMode,
}

impl TargetDef {
    pub fn new<I, S>(name: impl Into<String>, pipelines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            pipelines: pipelines.into_iter().map(Into::into).collect(),
            transaction: TransactionMode::None,
        }
    }

    pub fn with_transaction(mut self, isolation: IsolationLevel) -> Self {
        self.transaction = TransactionMode::Required { isolation };
        self
    }
}

/// A directed edge between two named participants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationDef {
    pub from: String,
    pub to: String,
}

/// A named, ordered set of associations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDef {
    pub name: String,
    #[serde(default)]
    pub associations: Vec<AssociationDef>,
}

impl PipelineDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            associations: Vec::new(),
        }
    }

    /// Append an association, keeping declaration order
    pub fn associate(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.associations.push(AssociationDef {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Every participant name in first-seen order
    pub fn endpoints(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for assoc in &self.associations {
            for name in [assoc.from.as_str(), assoc.to.as_str()] {
                if !seen.contains(&name) {
                    seen.push(name);
                }
            }
        }
        seen
    }
}

/// A complete package definition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDef {
    pub connections: BTreeMap<String, ConnectionDef>,
    pub targets: BTreeMap<String, TargetDef>,
    pub pipelines: BTreeMap<String, PipelineDef>,
}

impl PackageDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(mut self, def: ConnectionDef) -> Self {
        self.connections.insert(def.name.clone(), def);
        self
    }

    pub fn target(mut self, def: TargetDef) -> Self {
        self.targets.insert(def.name.clone(), def);
        self
    }

    pub fn pipeline(mut self, def: PipelineDef) -> Self {
        self.pipelines.insert(def.name.clone(), def);
        self
    }

    pub fn get_target(&self, name: &str) -> Option<&TargetDef> {
        self.targets.get(name)
    }

    pub fn get_pipeline(&self, name: &str) -> Option<&PipelineDef> {
        self.pipelines.get(name)
    }
}
