// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! The replica store: a transactional SQLite-backed embedded database.
//!
//! The core is logically single-writer against the replica, so a
//! [`ReplicaStore`] tracks "currently in a transaction" as a plain flag on
//! an owned [`rusqlite::Connection`] rather than threading a lifetime-bound
//! `rusqlite::Transaction` through the call stack. Every method that needs
//! the transaction takes `&mut ReplicaStore` as an explicit parameter,
//! matching the "pass the transaction in, don't store it" convention this
//! workspace follows throughout.

pub use catalog_reflect::{
	ColumnInfo, IndexInfo, IndexedColumn, list_columns, list_indexes, list_tables, primary_key_columns,
};
pub use ident::{quote_ident, quote_table};
pub use store::{ReplicaStore, TxMode};

mod catalog_reflect;
mod error;
mod ident;
mod store;

#[cfg(test)]
mod tests;
