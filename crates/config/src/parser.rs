// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Package TOML parsing

use crate::package::DEFAULT_CONCURRENT_CONNECTIONS;
use crate::{AssociationDef, ConnectionDef, PackageDef, PipelineDef, TargetDef, TransactionMode};
use regex::Regex;
use sluice_core::IsolationLevel;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").expect("constant regex pattern is valid")
});

/// Errors that can occur during package parsing
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("invalid name '{0}'")]
    InvalidName(String),
    #[error("target {target} references unknown pipeline {pipeline}")]
    UnknownPipeline { target: String, pipeline: String },
}

/// Check a connection/target/pipeline/participant name
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

/// Read and parse a package file
pub fn load_package(path: &Path) -> Result<PackageDef, ParseError> {
    let content = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_package(&content)
}

/// Parse a package from TOML content
pub fn parse_package(content: &str) -> Result<PackageDef, ParseError> {
    let raw: toml::Value = toml::from_str(content)?;
    let table = raw
        .as_table()
        .ok_or_else(|| ParseError::InvalidFormat("root must be a table".to_string()))?;

    let mut package = PackageDef::default();

    if let Some(connections) = table.get("connection") {
        let connections = connections
            .as_table()
            .ok_or_else(|| ParseError::InvalidFormat("connection must be a table".to_string()))?;
        for (name, value) in connections {
            let conn = parse_connection(name, value)?;
            package.connections.insert(name.clone(), conn);
        }
    }

    if let Some(pipelines) = table.get("pipeline") {
        let pipelines = pipelines
            .as_table()
            .ok_or_else(|| ParseError::InvalidFormat("pipeline must be a table".to_string()))?;
        for (name, value) in pipelines {
            let pipeline = parse_pipeline(name, value)?;
            package.pipelines.insert(name.clone(), pipeline);
        }
    }

    if let Some(targets) = table.get("target") {
        let targets = targets
            .as_table()
            .ok_or_else(|| ParseError::InvalidFormat("target must be a table".to_string()))?;
        for (name, value) in targets {
            let target = parse_target(name, value)?;
            for pipeline in &target.pipelines {
                if !package.pipelines.contains_key(pipeline) {
                    return Err(ParseError::UnknownPipeline {
                        target: name.clone(),
                        pipeline: pipeline.clone(),
                    });
                }
            }
            package.targets.insert(name.clone(), target);
        }
    }

    Ok(package)
}

fn check_name(name: &str) -> Result<(), ParseError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(ParseError::InvalidName(name.to_string()))
    }
}

fn parse_connection(name: &str, value: &toml::Value) -> Result<ConnectionDef, ParseError> {
    check_name(name)?;
    let table = value.as_table().ok_or_else(|| {
        ParseError::InvalidFormat(format!("connection.{} must be a table", name))
    })?;

    let concurrent_connections = match table.get("concurrent_connections") {
        None => DEFAULT_CONCURRENT_CONNECTIONS,
        Some(v) => v
            .as_integer()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                ParseError::InvalidFormat(format!(
                    "connection.{}.concurrent_connections must be a non-negative integer",
                    name
                ))
            })?,
    };

    Ok(ConnectionDef::new(name, concurrent_connections))
}

fn parse_target(name: &str, value: &toml::Value) -> Result<TargetDef, ParseError> {
    check_name(name)?;
    let table = value
        .as_table()
        .ok_or_else(|| ParseError::InvalidFormat(format!("target.{} must be a table", name)))?;

    let pipelines = table
        .get("pipelines")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ParseError::MissingField(format!("target.{}.pipelines", name)))?
        .iter()
        .map(|v| {
            v.as_str().map(String::from).ok_or_else(|| {
                ParseError::InvalidFormat(format!("target.{}.pipelines must be strings", name))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let isolation = match table.get("isolation") {
        None => None,
        Some(v) => {
            let text = v.as_str().ok_or_else(|| {
                ParseError::InvalidFormat(format!("target.{}.isolation must be a string", name))
            })?;
            let level: IsolationLevel = text
                .parse()
                .map_err(|e| ParseError::InvalidFormat(format!("target.{}: {}", name, e)))?;
            Some(level)
        }
    };

    let transactional = match table.get("transaction") {
        None => isolation.is_some(),
        Some(v) => v.as_bool().ok_or_else(|| {
            ParseError::InvalidFormat(format!("target.{}.transaction must be a boolean", name))
        })?,
    };

    // An explicit isolation level only makes sense inside a transaction
    if !transactional && isolation.is_some() {
        return Err(ParseError::InvalidFormat(format!(
            "target.{} sets isolation but disables transaction",
            name
        )));
    }

    let transaction = if transactional {
        TransactionMode::Required {
            isolation: isolation.unwrap_or_default(),
        }
    } else {
        TransactionMode::None
    };

    Ok(TargetDef {
        name: name.to_string(),
        pipelines,
        transaction,
    })
}

fn parse_pipeline(name: &str, value: &toml::Value) -> Result<PipelineDef, ParseError> {
    check_name(name)?;
    let table = value
        .as_table()
        .ok_or_else(|| ParseError::InvalidFormat(format!("pipeline.{} must be a table", name)))?;

    // Support both "association" (from [[pipeline.X.association]]) and "associations"
    let assoc_arr = table
        .get("association")
        .and_then(|v| v.as_array())
        .or_else(|| table.get("associations").and_then(|v| v.as_array()));

    let associations = match assoc_arr {
        Some(arr) => arr
            .iter()
            .map(|v| parse_association(name, v))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(PipelineDef {
        name: name.to_string(),
        associations,
    })
}

fn parse_association(pipeline: &str, value: &toml::Value) -> Result<AssociationDef, ParseError> {
    let assoc: AssociationDef = value.clone().try_into().map_err(|e: toml::de::Error| {
        ParseError::InvalidFormat(format!("pipeline.{}.association: {}", pipeline, e))
    })?;
    check_name(&assoc.from)?;
    check_name(&assoc.to)?;
    Ok(assoc)
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
