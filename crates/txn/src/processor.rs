// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::collections::BTreeMap;

use repl_catalog::{ColumnSpec, Relation, RowKey, TableSpec, TableSpecCache, derive_row_key};
use repl_store::{ReplicaStore, TxMode, quote_ident};
use repl_type::{Error, Result, Value, Watermark};
use tracing::instrument;

/// Whether change-log writes are suppressed for the transaction being
/// applied. Set by the Initial Sync Driver, which writes the meta tables
/// and bootstrap rows in the same replica transaction as ordinary DML but
/// never wants them reflected in the change log (§4.10).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChangeLogMode {
	Log,
	Suppressed,
}

/// Applies exactly one upstream transaction's DML and DDL to the replica,
/// atomically. Lives for exactly one `begin..commit` cycle — the Change
/// Processor constructs a new instance per transaction and discards it on
/// commit, rollback, or fatal failure.
///
/// Holds no borrow of the replica store or the table spec cache: every
/// method takes `&mut ReplicaStore` and `&mut TableSpecCache` as explicit
/// parameters, matching the "pass the transaction in, don't store it"
/// convention used throughout this workspace — a `TransactionProcessor`
/// that stored a `rusqlite::Transaction` would have to borrow from the
/// store it also needs to hand to the catalog cache, which Rust's borrow
/// checker cannot express without a self-reference.
pub struct TransactionProcessor {
	watermark: Watermark,
	mode: ChangeLogMode,
	schema_changed: bool,
}

impl TransactionProcessor {
	/// Opens a replica transaction in `tx_mode` and constructs a processor
	/// scoped to exactly this one watermark.
	#[instrument(name = "txn::begin", skip(store), fields(watermark = %watermark))]
	pub fn begin(store: &mut ReplicaStore, watermark: Watermark, tx_mode: TxMode, mode: ChangeLogMode) -> Result<Self> {
		store.begin(tx_mode)?;
		Ok(Self { watermark, mode, schema_changed: false })
	}

	pub fn watermark(&self) -> &Watermark {
		&self.watermark
	}

	fn log_enabled(&self) -> bool {
		self.mode == ChangeLogMode::Log
	}

	fn row_key(&self, cache: &TableSpecCache, relation: &Relation, row: &BTreeMap<String, Value>) -> Option<RowKey> {
		let table = table_key(&relation.schema, &relation.name);
		let spec = cache.get(&table).cloned().unwrap_or_default();
		derive_row_key(relation, &spec, row)
	}

	/// Upserts `new` into the relation's table. Modeled as `INSERT OR
	/// REPLACE` rather than a plain `INSERT` because an insert may
	/// legitimately arrive for a row that already exists — the stream
	/// re-delivering a newly-added table's catch-up rows, or a non-full
	/// replica identity re-publishing. A relation without a derivable row
	/// key is written but logged nowhere.
	#[instrument(name = "txn::insert", skip(self, store, cache, relation, new))]
	pub fn insert(
		&mut self,
		store: &mut ReplicaStore,
		cache: &TableSpecCache,
		relation: &Relation,
		new: &BTreeMap<String, Value>,
	) -> Result<()> {
		let table = table_key(&relation.schema, &relation.name);
		upsert_row(store, &table, new, &self.watermark)?;

		if self.log_enabled() {
			if let Some(key) = self.row_key(cache, relation, new) {
				repl_changelog::log_set(store, &self.watermark, &table, &key.normalize())?;
			}
		}
		Ok(())
	}

	/// Applies an update. The effective key is `old_key` when the message
	/// carries one (the key itself changed), else the key derived from
	/// `new`. A key-changing update emits a `delete` for the old key and a
	/// `set` for the new one; otherwise only a `set`. Referencing a
	/// nonexistent key is a no-op: no rows affected, no change-log entry.
	#[instrument(name = "txn::update", skip(self, store, cache, relation, new, old_key))]
	pub fn update(
		&mut self,
		store: &mut ReplicaStore,
		cache: &TableSpecCache,
		relation: &Relation,
		new: &BTreeMap<String, Value>,
		old_key: Option<&RowKey>,
	) -> Result<()> {
		let table = table_key(&relation.schema, &relation.name);
		let new_key = self.row_key(cache, relation, new);

		let effective_key = old_key.or(new_key.as_ref());
		let Some(effective_key) = effective_key else {
			return Ok(());
		};

		let affected = update_row(store, &table, effective_key, new, &self.watermark)?;
		if affected == 0 {
			return Ok(());
		}

		if self.log_enabled() {
			if let Some(old_key) = old_key {
				if Some(old_key) != new_key.as_ref() {
					repl_changelog::log_delete(store, &self.watermark, &table, &old_key.normalize())?;
				}
			}
			if let Some(new_key) = &new_key {
				repl_changelog::log_set(store, &self.watermark, &table, &new_key.normalize())?;
			}
		}
		Ok(())
	}

	/// Deletes the row addressed by `key`.
	#[instrument(name = "txn::delete", skip(self, store, relation, key))]
	pub fn delete(&mut self, store: &mut ReplicaStore, relation: &Relation, key: &RowKey) -> Result<()> {
		let table = table_key(&relation.schema, &relation.name);
		delete_row(store, &table, key)?;
		if self.log_enabled() {
			repl_changelog::log_delete(store, &self.watermark, &table, &key.normalize())?;
		}
		Ok(())
	}

	/// Truncates every named relation and logs one truncate entry per
	/// relation.
	#[instrument(name = "txn::truncate", skip(self, store, relations))]
	pub fn truncate(&mut self, store: &mut ReplicaStore, relations: &[Relation]) -> Result<()> {
		for relation in relations {
			let table = table_key(&relation.schema, &relation.name);
			store.execute(&format!("DELETE FROM {}", quote_ident(&table)), &[])?;
			if self.log_enabled() {
				repl_changelog::log_truncate(store, &self.watermark, &table)?;
			}
		}
		Ok(())
	}

	/// Creates `table`, mapping upstream column specs and appending the
	/// trailing `_0_version` bookkeeping column.
	#[instrument(name = "txn::create_table", skip(self, store, columns))]
	pub fn create_table(&mut self, store: &mut ReplicaStore, table: &str, columns: &[(String, ColumnSpec)]) -> Result<()> {
		let mut defs: Vec<String> = columns
			.iter()
			.map(|(name, spec)| {
				let sql_type = sqlite_type(spec);
				let not_null = if spec.nullable { "" } else { " NOT NULL" };
				format!("{} {}{}", quote_ident(name), sql_type, not_null)
			})
			.collect();
		defs.push("_0_version TEXT".to_string());

		store.execute_batch(&format!("CREATE TABLE {} ({})", quote_ident(table), defs.join(", ")))?;
		self.schema_changed = true;
		self.reset(store, table)
	}

	/// Renames a table, resetting both the new and the old name so
	/// consumers invalidate either cached view.
	#[instrument(name = "txn::rename_table", skip(self, store))]
	pub fn rename_table(&mut self, store: &mut ReplicaStore, old: &str, new: &str) -> Result<()> {
		store.execute_batch(&format!(
			"ALTER TABLE {} RENAME TO {}",
			quote_ident(old),
			quote_ident(new)
		))?;
		self.schema_changed = true;
		self.reset(store, new)?;
		self.reset(store, old)
	}

	/// Adds a column honouring the supplied default, then bumps
	/// `_0_version` on every row since a new column may change which rows
	/// are visible to consumers.
	#[instrument(name = "txn::add_column", skip(self, store, column))]
	pub fn add_column(&mut self, store: &mut ReplicaStore, table: &str, name: &str, column: &ColumnSpec) -> Result<()> {
		let sql_type = sqlite_type(column);
		let default_clause = match &column.default {
			Some(default) => format!(" DEFAULT {default}"),
			None => String::new(),
		};
		store.execute_batch(&format!(
			"ALTER TABLE {} ADD COLUMN {} {}{}",
			quote_ident(table),
			quote_ident(name),
			sql_type,
			default_clause
		))?;
		self.schema_changed = true;
		self.bump_version(store, table)?;
		self.reset(store, table)
	}

	/// Updates an existing column. A name-only change is a plain
	/// `ALTER...RENAME COLUMN`. A type change runs the rename-retype dance:
	/// drop every index touching the column, add a new column under a
	/// scratch name with the new type, copy values across, drop the old
	/// column, recreate the dropped indexes against the new column, then
	/// rename to the final name if it also changed. A default-only change
	/// with no name or type change is a no-op (SQLite's column default does
	/// not retroactively affect existing rows, so there is nothing to
	/// apply). In every branch that touches data, `_0_version` is bumped
	/// on all rows.
	#[instrument(name = "txn::update_column", skip(self, store, old, new))]
	pub fn update_column(
		&mut self,
		store: &mut ReplicaStore,
		table: &str,
		old_name: &str,
		new_name: &str,
		old: &ColumnSpec,
		new: &ColumnSpec,
	) -> Result<()> {
		let name_changed = old_name != new_name;
		let type_changed = old.base_type() != new.base_type();

		if !name_changed && !type_changed {
			return Ok(());
		}

		if type_changed {
			self.retype_column(store, table, old_name, new_name, new)?;
		} else {
			store.execute_batch(&format!(
				"ALTER TABLE {} RENAME COLUMN {} TO {}",
				quote_ident(table),
				quote_ident(old_name),
				quote_ident(new_name)
			))?;
		}

		self.schema_changed = true;
		self.bump_version(store, table)?;
		self.reset(store, table)
	}

	fn retype_column(
		&mut self,
		store: &mut ReplicaStore,
		table: &str,
		old_name: &str,
		new_name: &str,
		new: &ColumnSpec,
	) -> Result<()> {
		let indexes = repl_store::list_indexes(store, table)?;
		let affected: Vec<_> =
			indexes.iter().filter(|idx| idx.columns.iter().any(|c| c.name == old_name)).cloned().collect();

		for idx in &affected {
			store.execute_batch(&format!("DROP INDEX {}", quote_ident(&idx.name)))?;
		}

		let scratch = format!("{old_name}__retype");
		let sql_type = sqlite_type(new);
		store.execute_batch(&format!(
			"ALTER TABLE {} ADD COLUMN {} {}",
			quote_ident(table),
			quote_ident(&scratch),
			sql_type
		))?;
		store.execute_batch(&format!(
			"UPDATE {} SET {} = {}",
			quote_ident(table),
			quote_ident(&scratch),
			quote_ident(old_name)
		))?;
		store.execute_batch(&format!("ALTER TABLE {} DROP COLUMN {}", quote_ident(table), quote_ident(old_name)))?;
		store.execute_batch(&format!(
			"ALTER TABLE {} RENAME COLUMN {} TO {}",
			quote_ident(table),
			quote_ident(&scratch),
			quote_ident(new_name)
		))?;

		for idx in &affected {
			let columns: Vec<String> = idx
				.columns
				.iter()
				.map(|c| quote_ident(if c.name == old_name { new_name } else { &c.name }))
				.collect();
			let unique = if idx.unique { "UNIQUE " } else { "" };
			store.execute_batch(&format!(
				"CREATE {unique}INDEX {} ON {} ({})",
				quote_ident(&idx.name),
				quote_ident(table),
				columns.join(", ")
			))?;
		}
		Ok(())
	}

	/// Drops a column, bumping `_0_version`.
	#[instrument(name = "txn::drop_column", skip(self, store))]
	pub fn drop_column(&mut self, store: &mut ReplicaStore, table: &str, column: &str) -> Result<()> {
		store.execute_batch(&format!("ALTER TABLE {} DROP COLUMN {}", quote_ident(table), quote_ident(column)))?;
		self.schema_changed = true;
		self.bump_version(store, table)?;
		self.reset(store, table)
	}

	/// Drops a table if present and resets it.
	#[instrument(name = "txn::drop_table", skip(self, store))]
	pub fn drop_table(&mut self, store: &mut ReplicaStore, table: &str) -> Result<()> {
		store.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))?;
		self.schema_changed = true;
		self.reset(store, table)
	}

	/// Creates an index and resets the affected table, since index
	/// presence affects which tables a client can sync against.
	#[instrument(name = "txn::create_index", skip(self, store, columns))]
	pub fn create_index(&mut self, store: &mut ReplicaStore, table: &str, index_name: &str, columns: &[String], unique: bool) -> Result<()> {
		let unique_kw = if unique { "UNIQUE " } else { "" };
		let column_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
		store.execute_batch(&format!(
			"CREATE {unique_kw}INDEX {} ON {} ({})",
			quote_ident(index_name),
			quote_ident(table),
			column_list.join(", ")
		))?;
		self.schema_changed = true;
		self.reset(store, table)
	}

	/// Drops an index and resets the affected table.
	#[instrument(name = "txn::drop_index", skip(self, store))]
	pub fn drop_index(&mut self, store: &mut ReplicaStore, table: &str, index_name: &str) -> Result<()> {
		store.execute_batch(&format!("DROP INDEX {}", quote_ident(index_name)))?;
		self.schema_changed = true;
		self.reset(store, table)
	}

	fn reset(&self, store: &mut ReplicaStore, table: &str) -> Result<()> {
		if self.log_enabled() {
			repl_changelog::log_reset(store, &self.watermark, table)?;
		}
		Ok(())
	}

	fn bump_version(&self, store: &mut ReplicaStore, table: &str) -> Result<()> {
		store.execute(
			&format!("UPDATE {} SET _0_version = ?1", quote_ident(table)),
			&[&self.watermark.as_str()],
		)?;
		Ok(())
	}

	/// Verifies the commit watermark matches the one supplied at
	/// construction, advances `replicationState.stateVersion`, requests an
	/// optimize hint if any schema change occurred, and commits the
	/// replica transaction. A watermark mismatch aborts the transaction
	/// and surfaces a protocol error rather than silently committing under
	/// the wrong version.
	#[instrument(name = "txn::commit", skip(self, store), fields(watermark = %self.watermark))]
	pub fn commit(mut self, store: &mut ReplicaStore, watermark: &Watermark) -> Result<()> {
		if watermark != &self.watermark {
			store.rollback()?;
			return Err(Error::protocol(
				"COMMIT_WATERMARK_MISMATCH",
				format!("commit watermark {watermark} does not match begin watermark {}", self.watermark),
			));
		}

		if self.log_enabled() {
			repl_changelog::update_watermark(store, &self.watermark)?;
		}
		if self.schema_changed {
			store.optimize()?;
		}
		store.commit()?;
		self.watermark = watermark.clone();
		Ok(())
	}

	/// Discards all work done under this processor.
	#[instrument(name = "txn::rollback", skip(self, store))]
	pub fn rollback(self, store: &mut ReplicaStore) -> Result<()> {
		store.rollback()
	}
}

/// The identifier a relation's schema/name pair is stored and looked up
/// under: `name` unqualified for the default/`public` schema, `schema.name`
/// otherwise, matching spec.md §6's identifier convention.
pub fn table_key(schema: &str, name: &str) -> String {
	if schema.is_empty() || schema == "public" { name.to_string() } else { format!("{schema}.{name}") }
}

fn sqlite_type(spec: &ColumnSpec) -> &'static str {
	match spec.value_type() {
		repl_type::ValueType::Int64 => "INTEGER",
		repl_type::ValueType::Float64 => "REAL",
		repl_type::ValueType::Bytes => "BLOB",
		repl_type::ValueType::Text | repl_type::ValueType::Null => "TEXT",
	}
}

/// Converts our scalar `Value` to rusqlite's own owned value type. `Value`
/// is defined in `repl-type` and `ToSql` in `rusqlite`, so implementing
/// `ToSql` directly on `Value` would be an orphan impl from this crate;
/// converting to `rusqlite::types::Value` (which already implements
/// `ToSql`) sidesteps that.
fn sql_value(value: &Value) -> rusqlite::types::Value {
	use rusqlite::types::Value as SqlValue;
	match value {
		Value::Null => SqlValue::Null,
		Value::Int64(v) => SqlValue::Integer(*v),
		Value::Float64(v) => SqlValue::Real(*v),
		Value::Bytes(v) => SqlValue::Blob(v.clone()),
		Value::Text(v) => SqlValue::Text(v.clone()),
	}
}

fn upsert_row(store: &mut ReplicaStore, table: &str, row: &BTreeMap<String, Value>, watermark: &Watermark) -> Result<()> {
	let mut columns: Vec<String> = row.keys().map(|c| quote_ident(c)).collect();
	columns.push(quote_ident("_0_version"));

	let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
	let sql = format!(
		"INSERT OR REPLACE INTO {} ({}) VALUES ({})",
		quote_ident(table),
		columns.join(", "),
		placeholders.join(", ")
	);

	let mut owned: Vec<rusqlite::types::Value> = row.values().map(sql_value).collect();
	owned.push(rusqlite::types::Value::Text(watermark.as_str().to_string()));
	let params: Vec<&dyn rusqlite::ToSql> = owned.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
	store.execute(&sql, &params)?;
	Ok(())
}

fn update_row(store: &mut ReplicaStore, table: &str, key: &RowKey, new: &BTreeMap<String, Value>, watermark: &Watermark) -> Result<usize> {
	let mut set_columns: Vec<String> = new.keys().map(|c| format!("{} = ?", quote_ident(c))).collect();
	set_columns.push(format!("{} = ?", quote_ident("_0_version")));

	let where_columns: Vec<String> = key.column_names().map(|c| format!("{} = ?", quote_ident(c))).collect();

	let sql = format!(
		"UPDATE {} SET {} WHERE {}",
		quote_ident(table),
		set_columns.join(", "),
		where_columns.join(" AND ")
	);

	let mut owned: Vec<rusqlite::types::Value> = new.values().map(sql_value).collect();
	owned.push(rusqlite::types::Value::Text(watermark.as_str().to_string()));
	for name in key.column_names() {
		owned.push(sql_value(key.get(name).expect("column_names yields present keys")));
	}
	let params: Vec<&dyn rusqlite::ToSql> = owned.iter().map(|v| v as &dyn rusqlite::ToSql).collect();

	store.execute(&sql, &params)
}

fn delete_row(store: &mut ReplicaStore, table: &str, key: &RowKey) -> Result<()> {
	let where_columns: Vec<String> = key.column_names().map(|c| format!("{} = ?", quote_ident(c))).collect();
	let sql = format!("DELETE FROM {} WHERE {}", quote_ident(table), where_columns.join(" AND "));
	let owned: Vec<rusqlite::types::Value> = key.column_names().map(|c| sql_value(key.get(c).unwrap())).collect();
	let params: Vec<&dyn rusqlite::ToSql> = owned.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
	store.execute(&sql, &params)?;
	Ok(())
}
