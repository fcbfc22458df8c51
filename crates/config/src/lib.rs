// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Package definitions: connections, targets and pipelines in TOML

mod package;
mod parser;

pub use package::{
    AssociationDef, ConnectionDef, PackageDef, PipelineDef, TargetDef, TransactionMode,
};
pub use parser::{is_valid_name, load_package, parse_package, ParseError};
