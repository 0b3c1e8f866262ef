// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Scalar value representation, watermark ordering and error diagnostics
//! shared by every crate in the replication core.

pub use error::{Diagnostic, Error};
pub use value::{Value, ValueType};
pub use watermark::Watermark;

mod error;
mod value;
mod watermark;

pub type Result<T> = std::result::Result<T, Error>;
