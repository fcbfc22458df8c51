// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Participants backed by a [`TableStore`](sluice_storage::TableStore)

mod sink;
mod source;

pub use sink::{TableSink, WriteMode};
pub use source::TableSource;
