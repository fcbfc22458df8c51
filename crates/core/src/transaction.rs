// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transaction scopes
//!
//! A [`Transaction`] is a unit-of-work boundary shared by every participant of
//! one execution. Transactional resources enlist once per transaction and are
//! committed together on success or rolled back on failure. Work done outside
//! a transaction is applied immediately and is never undone.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors from transaction handling
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("transaction {id} is already {status}")]
    NotActive {
        id: String,
        status: TransactionStatus,
    },
    #[error("resource {resource} failed to commit: {message}")]
    CommitFailed { resource: String, message: String },
    #[error("unknown isolation level: {0}")]
    UnknownIsolationLevel(String),
}

/// Isolation level requested for a transaction scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    #[default]
    Serializable,
    Snapshot,
}

impl IsolationLevel {
    pub fn name(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "read_uncommitted",
            IsolationLevel::ReadCommitted => "read_committed",
            IsolationLevel::RepeatableRead => "repeatable_read",
            IsolationLevel::Serializable => "serializable",
            IsolationLevel::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IsolationLevel {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "read_uncommitted" | "readuncommitted" => Ok(IsolationLevel::ReadUncommitted),
            "read_committed" | "readcommitted" => Ok(IsolationLevel::ReadCommitted),
            "repeatable_read" | "repeatableread" => Ok(IsolationLevel::RepeatableRead),
            "serializable" => Ok(IsolationLevel::Serializable),
            "snapshot" => Ok(IsolationLevel::Snapshot),
            _ => Err(TransactionError::UnknownIsolationLevel(s.to_string())),
        }
    }
}

/// Lifecycle of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Active,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Active => f.write_str("active"),
            TransactionStatus::Committed => f.write_str("committed"),
            TransactionStatus::RolledBack => f.write_str("rolled back"),
        }
    }
}

/// A resource that takes part in a transaction
pub trait Enlistment: Send + Sync {
    /// Make the resource's pending work durable
    fn commit(&self) -> Result<(), TransactionError>;

    /// Discard the resource's pending work
    fn rollback(&self);
}

struct Enlisted {
    key: String,
    resource: Arc<dyn Enlistment>,
}

struct TransactionState {
    status: TransactionStatus,
    enlisted: Vec<Enlisted>,
}

struct Inner {
    id: String,
    isolation: IsolationLevel,
    state: Mutex<TransactionState>,
}

/// Shared handle to one transaction scope
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<Inner>,
}

impl Transaction {
    pub fn begin(id: impl Into<String>, isolation: IsolationLevel) -> Self {
        let id = id.into();
        tracing::debug!(transaction = %id, %isolation, "transaction started");
        Self {
            inner: Arc::new(Inner {
                id,
                isolation,
                state: Mutex::new(TransactionState {
                    status: TransactionStatus::Active,
                    enlisted: Vec::new(),
                }),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn isolation(&self) -> IsolationLevel {
        self.inner.isolation
    }

    pub fn status(&self) -> TransactionStatus {
        self.lock().status
    }

    pub fn is_active(&self) -> bool {
        self.status() == TransactionStatus::Active
    }

    /// Number of enlisted resources
    pub fn enlisted(&self) -> usize {
        self.lock().enlisted.len()
    }

    /// Enlist a resource under `key` unless one is already enlisted there
    ///
    /// Returns `true` if `make` was called and its resource enlisted.
    pub fn enlist_once<F>(&self, key: &str, make: F) -> Result<bool, TransactionError>
    where
        F: FnOnce() -> Arc<dyn Enlistment>,
    {
        let mut state = self.lock();
        if state.status != TransactionStatus::Active {
            return Err(TransactionError::NotActive {
                id: self.inner.id.clone(),
                status: state.status,
            });
        }
        if state.enlisted.iter().any(|e| e.key == key) {
            return Ok(false);
        }
        state.enlisted.push(Enlisted {
            key: key.to_string(),
            resource: make(),
        });
        tracing::trace!(transaction = %self.inner.id, key, "resource enlisted");
        Ok(true)
    }

    /// Commit every enlisted resource in enlistment order
    ///
    /// If one resource fails, the ones not yet committed are rolled back and
    /// the failure is returned.
    pub fn commit(&self) -> Result<(), TransactionError> {
        let enlisted = self.finish(TransactionStatus::Committed)?;

        for (index, entry) in enlisted.iter().enumerate() {
            if let Err(e) = entry.resource.commit() {
                tracing::error!(transaction = %self.inner.id, key = %entry.key, error = %e, "commit failed");
                for rest in &enlisted[index..] {
                    rest.resource.rollback();
                }
                self.lock().status = TransactionStatus::RolledBack;
                return Err(e);
            }
        }

        tracing::info!(transaction = %self.inner.id, "transaction committed");
        Ok(())
    }

    /// Roll back every enlisted resource
    pub fn rollback(&self) -> Result<(), TransactionError> {
        let enlisted = self.finish(TransactionStatus::RolledBack)?;
        for entry in &enlisted {
            entry.resource.rollback();
        }
        tracing::info!(
            transaction = %self.inner.id,
            resources = enlisted.len(),
            "transaction rolled back"
        );
        Ok(())
    }

    fn finish(&self, status: TransactionStatus) -> Result<Vec<Enlisted>, TransactionError> {
        let mut state = self.lock();
        if state.status != TransactionStatus::Active {
            return Err(TransactionError::NotActive {
                id: self.inner.id.clone(),
                status: state.status,
            });
        }
        state.status = status;
        Ok(std::mem::take(&mut state.enlisted))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TransactionState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("isolation", &self.inner.isolation)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
#[path = "transaction_tests.rs"]
mod tests;
