// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Countdown latch for "all parties done" detection
//!
//! The count only moves down and reaches zero exactly once. The caller whose
//! decrement returns `0` is the only one allowed to run the completion action.

use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Errors from latch misuse
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LatchError {
    #[error("countdown latch (initial count {initial}) decremented past zero")]
    Underflow { initial: usize },
}

/// Thread-safe counter that signals once when it reaches zero
#[derive(Debug)]
pub struct CountdownLatch {
    initial: usize,
    remaining: AtomicUsize,
}

impl CountdownLatch {
    pub fn new(count: usize) -> Self {
        Self {
            initial: count,
            remaining: AtomicUsize::new(count),
        }
    }

    /// Decrement, returning the remaining count
    ///
    /// Decrementing an already-released latch is an invariant violation and
    /// leaves the count at zero.
    pub fn count_down(&self) -> Result<usize, LatchError> {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map(|previous| previous - 1)
            .map_err(|_| LatchError::Underflow {
                initial: self.initial,
            })
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn initial(&self) -> usize {
        self.initial
    }

    pub fn is_released(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
#[path = "latch_tests.rs"]
mod tests;
