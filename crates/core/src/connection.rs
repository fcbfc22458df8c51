// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capacity-limited connections
//!
//! A [`Connection`] is a named shared resource (database, service endpoint)
//! with a declared maximum number of simultaneous holders. Holders only ever
//! touch its usage counter; the identity lives for the whole process.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors from connection bookkeeping
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection '{0}' released more times than it was acquired")]
    NotHeld(String),
}

/// A named resource with a bounded number of concurrent holders
#[derive(Debug)]
pub struct Connection {
    name: String,
    concurrent_connections: u32,
    in_use: AtomicU32,
}

impl Connection {
    pub fn new(name: impl Into<String>, concurrent_connections: u32) -> Self {
        Self {
            name: name.into(),
            concurrent_connections,
            in_use: AtomicU32::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum simultaneous holders
    pub fn concurrent_connections(&self) -> u32 {
        self.concurrent_connections
    }

    /// Current number of holders
    pub fn in_use(&self) -> u32 {
        self.in_use.load(Ordering::Acquire)
    }

    pub fn available(&self) -> u32 {
        self.concurrent_connections.saturating_sub(self.in_use())
    }

    /// Take one slot if that would not exceed capacity
    pub fn try_acquire(&self) -> bool {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.concurrent_connections).then_some(n + 1)
            })
            .is_ok()
    }

    /// Give back one slot
    pub fn release(&self) -> Result<(), ConnectionError> {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| ConnectionError::NotHeld(self.name.clone()))
    }
}

/// Capability of a pipeline participant that needs a [`Connection`]
///
/// Participants expose it through `connection_user()`; anything that returns
/// `None` there takes part in a pipeline without acquiring anything.
pub trait ConnectionUser: Send + Sync {
    /// The connection this participant draws from, if configured
    fn connection_instance(&self) -> Option<&Arc<Connection>>;

    /// Acquire a slot on behalf of `pipeline`
    ///
    /// A participant without a configured connection always succeeds.
    fn try_acquire_connection(&self, pipeline: &str) -> bool {
        let Some(connection) = self.connection_instance() else {
            return true;
        };
        let acquired = connection.try_acquire();
        tracing::trace!(
            pipeline,
            connection = connection.name(),
            acquired,
            in_use = connection.in_use(),
            "try acquire"
        );
        acquired
    }

    /// Release the slot taken by a successful [`try_acquire_connection`](Self::try_acquire_connection)
    fn release_connection(&self, pipeline: &str) {
        let Some(connection) = self.connection_instance() else {
            return;
        };
        match connection.release() {
            Ok(()) => tracing::trace!(
                pipeline,
                connection = connection.name(),
                in_use = connection.in_use(),
                "released"
            ),
            Err(e) => tracing::error!(pipeline, error = %e, "connection release without acquire"),
        }
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
