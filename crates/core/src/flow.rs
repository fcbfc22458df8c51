// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row transport between participants
//!
//! Every stage in a running pipeline owns one [`Inbox`]. Each association
//! feeding that stage holds an [`AssociationSender`] into it, tagged with the
//! association's input slot. A sender reports [`Envelope::Closed`] exactly once,
//! either explicitly or when dropped, so a stage always learns that an input
//! has finished even if its producer failed.

use crate::row::Row;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Message delivered to a stage inbox
#[derive(Debug)]
pub enum Envelope {
    /// A row arriving on input slot `input`
    Row { input: usize, row: Row },
    /// Input slot `input` will deliver no more rows
    Closed { input: usize },
}

/// Sending half of a stage inbox
pub type InboxSender = mpsc::UnboundedSender<Envelope>;
/// Receiving half of a stage inbox
pub type Inbox = mpsc::UnboundedReceiver<Envelope>;

/// Create a new stage inbox
pub fn inbox() -> (InboxSender, Inbox) {
    mpsc::unbounded_channel()
}

/// Producer end of one association
pub struct AssociationSender {
    input: usize,
    to: Arc<str>,
    tx: Option<InboxSender>,
}

impl AssociationSender {
    pub fn new(input: usize, to: impl Into<Arc<str>>, tx: InboxSender) -> Self {
        Self {
            input,
            to: to.into(),
            tx: Some(tx),
        }
    }

    /// Name of the receiving stage
    pub fn to(&self) -> &str {
        &self.to
    }

    /// Deliver a row; returns `false` if the receiver is gone
    pub fn send(&self, row: Row) -> bool {
        match &self.tx {
            Some(tx) => tx.send(Envelope::Row { input: self.input, row }).is_ok(),
            None => false,
        }
    }

    /// Signal that no more rows follow
    pub fn close(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Envelope::Closed { input: self.input });
        }
    }
}

impl Drop for AssociationSender {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Fan-out handle a participant writes its output rows to
///
/// Every row is delivered to all outgoing associations of the participant.
/// Dropping the outlet closes all of them.
pub struct Outlet {
    links: Vec<AssociationSender>,
    sent: AtomicU64,
}

impl Outlet {
    pub fn new(links: Vec<AssociationSender>) -> Self {
        Self {
            links,
            sent: AtomicU64::new(0),
        }
    }

    /// An outlet with nowhere to send; rows are discarded
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Number of downstream associations
    pub fn fan_out(&self) -> usize {
        self.links.len()
    }

    /// Rows emitted through this outlet so far
    pub fn rows_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Emit a row to every downstream association
    pub fn send(&self, row: Row) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        let Some((last, rest)) = self.links.split_last() else {
            return;
        };
        for link in rest {
            if !link.send(row.clone()) {
                tracing::trace!(to = link.to(), "receiver gone, row dropped");
            }
        }
        if !last.send(row) {
            tracing::trace!(to = last.to(), "receiver gone, row dropped");
        }
    }

    /// Close every downstream association now
    pub fn close(self) {
        drop(self);
    }
}

#[cfg(test)]
#[path = "flow_tests.rs"]
mod tests;
