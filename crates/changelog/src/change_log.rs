// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use repl_store::{ReplicaStore, quote_ident};
use repl_type::{Result, Watermark};
use tracing::instrument;

/// SQLite table name for the change log. Quoted as a single identifier
/// containing a literal `.` rather than schema-qualified via `ATTACH`, since
/// the replica is a single SQLite file.
const TABLE: &str = "_zero.changeLog";

/// Ensures the change log table exists. Idempotent; called once when the
/// replica store is opened.
pub fn ensure_schema(store: &ReplicaStore) -> Result<()> {
	store.execute_batch(&format!(
		"CREATE TABLE IF NOT EXISTS {table} (
			state_version TEXT NOT NULL,
			table_name TEXT NOT NULL,
			row_key TEXT NOT NULL,
			op TEXT NOT NULL,
			PRIMARY KEY (state_version, table_name, row_key)
		)",
		table = quote_ident(TABLE),
	))
}

/// Records a row set (`op = 's'`) at `version` for `(table, row_key)`.
/// `row_key` must already be normalized (lexicographic column-name sort,
/// canonical JSON stringification) by the caller.
#[instrument(skip(store))]
pub fn log_set(store: &ReplicaStore, version: &Watermark, table: &str, row_key: &str) -> Result<()> {
	upsert_entry(store, version, table, row_key, "s")
}

/// Records a row delete (`op = 'd'`).
#[instrument(skip(store))]
pub fn log_delete(store: &ReplicaStore, version: &Watermark, table: &str, row_key: &str) -> Result<()> {
	upsert_entry(store, version, table, row_key, "d")
}

/// Collapses all prior entries for `table` at `version` and records a
/// table-wide truncate (`op = 't'`, `row_key = ""`), which sorts before any
/// row-level entry at the same version because the empty string is
/// lexicographically smallest.
#[instrument(skip(store))]
pub fn log_truncate(store: &ReplicaStore, version: &Watermark, table: &str) -> Result<()> {
	replace_table_wide_entry(store, version, table, "t")
}

/// Collapses all prior entries for `table` at `version` and records a
/// schema-change reset (`op = 'r'`). Per invariant I4, a later `reset` at
/// the same `(state_version, table)` supersedes an earlier `truncate`
/// unconditionally — both are implemented through the same collapse-then-
/// insert helper, so the most recent call always wins.
#[instrument(skip(store))]
pub fn log_reset(store: &ReplicaStore, version: &Watermark, table: &str) -> Result<()> {
	replace_table_wide_entry(store, version, table, "r")
}

fn upsert_entry(store: &ReplicaStore, version: &Watermark, table: &str, row_key: &str, op: &str) -> Result<()> {
	store.execute(
		&format!(
			"INSERT OR REPLACE INTO {table_ident} (state_version, table_name, row_key, op) VALUES (?1, ?2, ?3, ?4)",
			table_ident = quote_ident(TABLE),
		),
		&[&version.as_str(), &table, &row_key, &op],
	)?;
	Ok(())
}

fn replace_table_wide_entry(store: &ReplicaStore, version: &Watermark, table: &str, op: &str) -> Result<()> {
	let table_ident = quote_ident(TABLE);
	store.execute(
		&format!("DELETE FROM {table_ident} WHERE state_version = ?1 AND table_name = ?2"),
		&[&version.as_str(), &table],
	)?;
	store.execute(
		&format!(
			"INSERT INTO {table_ident} (state_version, table_name, row_key, op) VALUES (?1, ?2, '', ?3)"
		),
		&[&version.as_str(), &table, &op],
	)?;
	Ok(())
}
