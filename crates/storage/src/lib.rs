// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sluice-storage: in-memory transactional tables
//!
//! Writes made inside a [`Transaction`](sluice_core::Transaction) are staged in
//! a per-transaction journal and only reach the committed tables when the
//! transaction commits. Writes made outside a transaction apply immediately.

mod journal;
mod store;

pub use journal::{TableOp, Tables};
pub use store::{StorageError, TableStore};
