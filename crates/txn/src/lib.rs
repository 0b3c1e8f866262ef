// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! The transaction processor: applies one upstream transaction's DML and
//! DDL atomically against the replica, scoped to exactly one
//! `begin..commit` cycle.

pub use processor::{ChangeLogMode, TransactionProcessor, table_key};

mod processor;

#[cfg(test)]
mod tests;
