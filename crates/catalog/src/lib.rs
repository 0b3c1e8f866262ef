// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Relation and column-spec types, row-key derivation, and the Table Spec
//! Cache: an in-memory snapshot of the replica's own catalog used to
//! interpret row payloads and to derive row keys for tables whose relation
//! identity requires the primary key rather than declared key columns.

pub use relation::{ColumnSpec, ReplicaIdentity, Relation};
pub use row_key::{RowKey, derive_row_key};
pub use table_spec::{TableSpec, TableSpecCache, impute_primary_key};

mod relation;
mod row_key;
mod table_spec;
