// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row transformations

mod filter;
mod join;

pub use filter::FilterStage;
pub use join::JoinStage;
