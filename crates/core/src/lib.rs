// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sluice-core: shared contracts for the sluice ETL engine
//!
//! This crate provides:
//! - The [`Row`] model that flows between participants
//! - Capacity-limited [`Connection`]s and the [`ConnectionUser`] capability
//! - The [`CountdownLatch`] used for completion detection
//! - Source/stage contracts and the channel plumbing rows travel over
//! - Transaction scopes that transactional resources enlist in

pub mod connection;
pub mod error;
pub mod flow;
pub mod id;
pub mod latch;
pub mod row;
pub mod stage;
pub mod transaction;

pub use connection::{Connection, ConnectionError, ConnectionUser};
pub use error::StageError;
pub use flow::{inbox, AssociationSender, Envelope, Inbox, InboxSender, Outlet};
pub use id::{IdGen, RunId, SequentialIdGen, UuidIdGen};
pub use latch::{CountdownLatch, LatchError};
pub use row::Row;
pub use stage::{DataSource, Endpoint, Stage, StageContext};
pub use transaction::{
    Enlistment, IsolationLevel, Transaction, TransactionError, TransactionStatus,
};
