// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::collections::HashMap;

use repl_store::{ColumnInfo, IndexInfo, ReplicaStore};
use repl_type::Result;
use tracing::instrument;

use crate::relation::ColumnSpec;

/// A single table's shape as reflected out of the replica's catalog: its
/// primary key (declared or imputed) and its columns, in declaration order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TableSpec {
	pub primary_key: Vec<String>,
	pub columns: Vec<ColumnSpec>,
}

/// In-memory snapshot of every replica table's shape, used to interpret row
/// payloads and to derive row keys for relations with `replicaIdentity =
/// full`. Rebuilt by scanning the replica catalog on transaction start (if
/// empty) and after any DDL within the transaction — the cache never
/// persists state that would outlive a single reflection pass.
#[derive(Clone, Debug, Default)]
pub struct TableSpecCache {
	tables: HashMap<String, TableSpec>,
}

impl TableSpecCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.tables.is_empty()
	}

	pub fn get(&self, table: &str) -> Option<&TableSpec> {
		self.tables.get(table)
	}

	pub fn clear(&mut self) {
		self.tables.clear();
	}

	/// Rebuilds the cache by reflecting every user table currently visible
	/// in `store`'s open transaction.
	#[instrument(name = "catalog::table_spec_cache::rebuild", skip(self, store))]
	pub fn rebuild(&mut self, store: &ReplicaStore) -> Result<()> {
		self.tables.clear();
		for table in repl_store::list_tables(store)? {
			let columns = repl_store::list_columns(store, &table)?;
			let declared_pk = repl_store::primary_key_columns(store, &table)?;
			let indexes = repl_store::list_indexes(store, &table)?;
			let primary_key = if declared_pk.is_empty() {
				impute_primary_key(&columns, &indexes).unwrap_or_default()
			} else {
				declared_pk
			};
			self.tables.insert(table, TableSpec { primary_key, columns: column_specs(&columns) });
		}
		Ok(())
	}
}

fn column_specs(columns: &[ColumnInfo]) -> Vec<ColumnSpec> {
	columns
		.iter()
		.enumerate()
		.map(|(position, col)| ColumnSpec {
			position: position as u32,
			data_type: col.declared_type.clone(),
			nullable: !col.not_null && col.pk_position.is_none(),
			default: None,
			is_enum: false,
			is_array: false,
		})
		.collect()
}

/// Imputes a primary key for a table without a declared one: the shortest
/// unique index whose columns are all "visible" (either `NOT NULL` or
/// already part of the declared primary key — vacuously true here since
/// there is none, so effectively `NOT NULL`). Ties are broken by
/// lexicographic column order. A pure function over reflected catalog data,
/// independent of SQLite, so it is unit-tested directly.
pub fn impute_primary_key(columns: &[ColumnInfo], indexes: &[IndexInfo]) -> Option<Vec<String>> {
	let not_null: std::collections::HashSet<&str> =
		columns.iter().filter(|c| c.not_null).map(|c| c.name.as_str()).collect();

	let mut candidates: Vec<Vec<String>> = indexes
		.iter()
		.filter(|idx| idx.unique)
		.filter_map(|idx| {
			let mut names: Vec<String> = idx.columns.iter().map(|c| c.name.clone()).collect();
			names.sort();
			if names.iter().all(|n| not_null.contains(n.as_str())) { Some(names) } else { None }
		})
		.collect();

	candidates.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
	candidates.into_iter().next()
}
