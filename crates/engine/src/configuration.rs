// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binding package definitions to live participants

use crate::association::PipelineAssociation;
use crate::error::EngineError;
use crate::package::ExecutionPackage;
use crate::pipeline::Pipeline;
use sluice_config::PackageDef;
use sluice_core::{Connection, DataSource, Endpoint, IdGen, Stage, UuidIdGen};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Validated, compiled pipelines with their connections and targets
pub struct ConfigurationContext {
    definition: PackageDef,
    connections: BTreeMap<String, Arc<Connection>>,
    pipelines: BTreeMap<String, Arc<Pipeline>>,
    ids: Arc<dyn IdGen>,
}

impl ConfigurationContext {
    /// Start binding participants to the names used in `definition`
    pub fn builder(definition: PackageDef) -> ConfigurationBuilder {
        let connections = definition
            .connections
            .values()
            .map(|def| {
                (
                    def.name.clone(),
                    Arc::new(Connection::new(&def.name, def.concurrent_connections)),
                )
            })
            .collect();
        ConfigurationBuilder {
            definition,
            connections,
            endpoints: BTreeMap::new(),
            duplicates: Vec::new(),
            ids: Arc::new(UuidIdGen),
        }
    }

    pub fn definition(&self) -> &PackageDef {
        &self.definition
    }

    pub fn connection(&self, name: &str) -> Option<&Arc<Connection>> {
        self.connections.get(name)
    }

    pub fn pipeline(&self, name: &str) -> Option<&Arc<Pipeline>> {
        self.pipelines.get(name)
    }

    /// Package that can execute this configuration's targets
    pub fn build_package(&self) -> ExecutionPackage {
        ExecutionPackage::new(
            self.connections.clone(),
            self.pipelines.clone(),
            self.definition.targets.clone(),
            Arc::clone(&self.ids),
        )
    }
}

/// Collects the participants named by a package definition
pub struct ConfigurationBuilder {
    definition: PackageDef,
    connections: BTreeMap<String, Arc<Connection>>,
    endpoints: BTreeMap<String, Endpoint>,
    duplicates: Vec<String>,
    ids: Arc<dyn IdGen>,
}

impl ConfigurationBuilder {
    /// The shared connection declared under `name`
    ///
    /// Hand it to participants that draw from it.
    pub fn connection(&self, name: &str) -> Result<Arc<Connection>, EngineError> {
        self.connections
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownConnection(name.to_string()))
    }

    /// Register a source under its own name
    pub fn source(self, source: Arc<dyn DataSource>) -> Self {
        self.endpoint(Endpoint::Source(source))
    }

    /// Register a stage under its own name
    pub fn stage(self, stage: Arc<dyn Stage>) -> Self {
        self.endpoint(Endpoint::Stage(stage))
    }

    pub fn id_gen(mut self, ids: impl IdGen + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    fn endpoint(mut self, endpoint: Endpoint) -> Self {
        let name = endpoint.name().to_string();
        if self.endpoints.contains_key(&name) {
            self.duplicates.push(name);
        } else {
            self.endpoints.insert(name, endpoint);
        }
        self
    }

    /// Resolve, validate and compile every pipeline
    ///
    /// Structural problems are collected across all pipelines and reported
    /// together; capacity problems fail on the first offending pipeline.
    pub fn build(self) -> Result<ConfigurationContext, EngineError> {
        let mut messages: Vec<String> = self
            .duplicates
            .iter()
            .map(|name| format!("participant '{}' registered more than once", name))
            .collect();

        let mut pipelines = Vec::with_capacity(self.definition.pipelines.len());
        for def in self.definition.pipelines.values() {
            let mut associations = Vec::with_capacity(def.associations.len());
            for assoc in &def.associations {
                let from = self.resolve(&def.name, &assoc.from, &mut messages);
                let to = self.resolve(&def.name, &assoc.to, &mut messages);
                if let (Some(from), Some(to)) = (from, to) {
                    associations.push(PipelineAssociation::new(from, to));
                }
            }
            pipelines.push(Pipeline::new(&def.name, associations));
        }

        for target in self.definition.targets.values() {
            let mut seen = HashSet::new();
            for pipeline in &target.pipelines {
                if !self.definition.pipelines.contains_key(pipeline) {
                    messages.push(format!(
                        "target '{}' references unknown pipeline '{}'",
                        target.name, pipeline
                    ));
                } else if !seen.insert(pipeline.as_str()) {
                    messages.push(format!(
                        "target '{}' lists pipeline '{}' more than once",
                        target.name, pipeline
                    ));
                }
            }
        }

        for pipeline in &pipelines {
            pipeline.validate(&mut messages);
        }
        if !messages.is_empty() {
            return Err(EngineError::Invalid(messages));
        }

        let mut compiled = BTreeMap::new();
        for mut pipeline in pipelines {
            pipeline.perform_second_stage_pass()?;
            compiled.insert(pipeline.name().to_string(), Arc::new(pipeline));
        }

        tracing::info!(
            pipelines = compiled.len(),
            targets = self.definition.targets.len(),
            connections = self.connections.len(),
            "configuration built"
        );

        Ok(ConfigurationContext {
            definition: self.definition,
            connections: self.connections,
            pipelines: compiled,
            ids: self.ids,
        })
    }

    fn resolve(&self, pipeline: &str, name: &str, messages: &mut Vec<String>) -> Option<Endpoint> {
        let endpoint = self.endpoints.get(name).cloned();
        if endpoint.is_none() {
            messages.push(
                EngineError::UnknownEndpoint {
                    pipeline: pipeline.to_string(),
                    name: name.to_string(),
                }
                .to_string(),
            );
        }
        endpoint
    }
}

#[cfg(test)]
#[path = "configuration_tests.rs"]
mod tests;
