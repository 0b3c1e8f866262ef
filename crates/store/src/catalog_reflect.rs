// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use repl_type::Result;

use crate::error::classify;
use crate::store::ReplicaStore;

/// One row of `PRAGMA table_info`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnInfo {
	pub name: String,
	pub declared_type: String,
	pub not_null: bool,
	pub pk_position: Option<u32>,
}

/// One row of `PRAGMA index_list`, joined with its column names from
/// `PRAGMA index_info`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexInfo {
	pub name: String,
	pub unique: bool,
	pub columns: Vec<IndexedColumn>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexedColumn {
	pub seq: u32,
	pub name: String,
}

/// Lists every user table in the replica, excluding SQLite's own
/// `sqlite_*` bookkeeping tables.
pub fn list_tables(store: &ReplicaStore) -> Result<Vec<String>> {
	store.query_rows(
		"SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
		&[],
		|row| row.get(0),
	)
}

/// Reflects the columns of `table` via `PRAGMA table_info`, in declaration
/// order.
pub fn list_columns(store: &ReplicaStore, table: &str) -> Result<Vec<ColumnInfo>> {
	let sql = format!("PRAGMA table_info({})", crate::ident::quote_ident(table));
	let mut stmt = store.connection().prepare(&sql).map_err(classify)?;
	let rows = stmt
		.query_map([], |row| {
			let pk: u32 = row.get(5)?;
			Ok(ColumnInfo {
				name: row.get(1)?,
				declared_type: row.get(2)?,
				not_null: row.get::<_, i64>(3)? != 0,
				pk_position: if pk == 0 { None } else { Some(pk) },
			})
		})
		.map_err(classify)?;
	rows.collect::<rusqlite::Result<Vec<_>>>().map_err(classify)
}

/// Reflects every index on `table`, in the order SQLite reports them, along
/// with each index's participating columns in key order.
pub fn list_indexes(store: &ReplicaStore, table: &str) -> Result<Vec<IndexInfo>> {
	let list_sql = format!("PRAGMA index_list({})", crate::ident::quote_ident(table));
	let mut list_stmt = store.connection().prepare(&list_sql).map_err(classify)?;
	let names: Vec<(String, bool)> = list_stmt
		.query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(2)? != 0)))
		.map_err(classify)?
		.collect::<rusqlite::Result<Vec<_>>>()
		.map_err(classify)?;

	let mut indexes = Vec::with_capacity(names.len());
	for (name, unique) in names {
		let info_sql = format!("PRAGMA index_info({})", crate::ident::quote_ident(&name));
		let mut info_stmt = store.connection().prepare(&info_sql).map_err(classify)?;
		let columns = info_stmt
			.query_map([], |row| {
				Ok(IndexedColumn { seq: row.get::<_, i64>(0)? as u32, name: row.get(2)? })
			})
			.map_err(classify)?
			.collect::<rusqlite::Result<Vec<_>>>()
			.map_err(classify)?;
		indexes.push(IndexInfo { name, unique, columns });
	}
	Ok(indexes)
}

/// Returns the table's declared primary-key columns, in key order, reading
/// straight off `PRAGMA table_info`'s `pk` column. Empty when the table has
/// no declared primary key (callers impute one from the shortest unique
/// index instead).
pub fn primary_key_columns(store: &ReplicaStore, table: &str) -> Result<Vec<String>> {
	let mut columns = list_columns(store, table)?;
	columns.retain(|c| c.pk_position.is_some());
	columns.sort_by_key(|c| c.pk_position.unwrap());
	Ok(columns.into_iter().map(|c| c.name).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn fixture() -> ReplicaStore {
		let store = ReplicaStore::open_in_memory().unwrap();
		store
			.execute_batch(
				"CREATE TABLE issues (id INTEGER PRIMARY KEY, title TEXT NOT NULL, owner TEXT);
				 CREATE UNIQUE INDEX issues_owner_idx ON issues (owner);",
			)
			.unwrap();
		store
	}

	#[test]
	fn lists_user_tables_only() {
		let store = fixture();
		assert_eq!(list_tables(&store).unwrap(), vec!["issues".to_string()]);
	}

	#[test]
	fn reflects_columns_in_declaration_order() {
		let store = fixture();
		let columns = list_columns(&store, "issues").unwrap();
		let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
		assert_eq!(names, vec!["id", "title", "owner"]);
		assert_eq!(columns[1].not_null, true);
		assert_eq!(columns[0].pk_position, Some(1));
	}

	#[test]
	fn reflects_declared_primary_key() {
		let store = fixture();
		assert_eq!(primary_key_columns(&store, "issues").unwrap(), vec!["id".to_string()]);
	}

	#[test]
	fn reflects_unique_indexes() {
		let store = fixture();
		let indexes = list_indexes(&store, "issues").unwrap();
		assert_eq!(indexes.len(), 1);
		assert_eq!(indexes[0].name, "issues_owner_idx");
		assert!(indexes[0].unique);
		assert_eq!(indexes[0].columns[0].name, "owner");
	}
}
