// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::path::Path;

use repl_type::{Error, Result};
use rusqlite::{Connection, OpenFlags, Row};
use tracing::instrument;

use crate::error::{classify, classify_unrecoverable};

/// Locking mode requested for a transaction.
///
/// `Concurrent` maps to a plain `BEGIN` and lets SQLite upgrade to a write
/// lock lazily on the first write statement; `Exclusive` maps to
/// `BEGIN IMMEDIATE` and takes the write lock up front. The transaction
/// processor always opens with `Exclusive` since every applied transaction
/// from upstream eventually writes; the initial sync driver uses
/// `Concurrent` for the read-only validation pass.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TxMode {
	Concurrent,
	Exclusive,
}

impl TxMode {
	fn begin_sql(self) -> &'static str {
		match self {
			TxMode::Concurrent => "BEGIN",
			TxMode::Exclusive => "BEGIN IMMEDIATE",
		}
	}
}

/// A transactional handle onto the embedded SQLite replica.
///
/// Holds an owned [`Connection`] and a flag recording whether a transaction
/// is currently open. Callers thread `&mut ReplicaStore` through the
/// transaction processor, the catalog cache and the change log writer
/// rather than this type holding a `rusqlite::Transaction` itself, since the
/// latter borrows from the connection and cannot be stored alongside it in
/// a struct field without a self-reference.
pub struct ReplicaStore {
	conn: Connection,
	in_transaction: bool,
}

impl ReplicaStore {
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let conn = Connection::open_with_flags(
			path,
			OpenFlags::SQLITE_OPEN_READ_WRITE
				| OpenFlags::SQLITE_OPEN_CREATE
				| OpenFlags::SQLITE_OPEN_NO_MUTEX,
		)
		.map_err(classify_unrecoverable)?;
		conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
			.map_err(classify_unrecoverable)?;
		Ok(Self { conn, in_transaction: false })
	}

	pub fn open_in_memory() -> Result<Self> {
		let conn = Connection::open_in_memory().map_err(classify_unrecoverable)?;
		conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(classify_unrecoverable)?;
		Ok(Self { conn, in_transaction: false })
	}

	pub fn in_transaction(&self) -> bool {
		self.in_transaction
	}

	#[instrument(skip(self), fields(mode = ?mode))]
	pub fn begin(&mut self, mode: TxMode) -> Result<()> {
		if self.in_transaction {
			return Err(Error::unrecoverable(
				"STORE_NESTED_TX",
				"begin called while a transaction is already open",
			));
		}
		self.conn.execute_batch(mode.begin_sql()).map_err(classify)?;
		self.in_transaction = true;
		Ok(())
	}

	#[instrument(skip(self))]
	pub fn commit(&mut self) -> Result<()> {
		if !self.in_transaction {
			return Err(Error::unrecoverable("STORE_NO_TX", "commit called without an open transaction"));
		}
		self.conn.execute_batch("COMMIT").map_err(classify)?;
		self.in_transaction = false;
		Ok(())
	}

	#[instrument(skip(self))]
	pub fn rollback(&mut self) -> Result<()> {
		if !self.in_transaction {
			return Ok(());
		}
		self.conn.execute_batch("ROLLBACK").map_err(classify)?;
		self.in_transaction = false;
		Ok(())
	}

	pub fn execute(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<usize> {
		self.conn.execute(sql, params).map_err(classify)
	}

	pub fn execute_batch(&self, sql: &str) -> Result<()> {
		self.conn.execute_batch(sql).map_err(classify)
	}

	pub fn query_row<T>(
		&self,
		sql: &str,
		params: &[&dyn rusqlite::ToSql],
		f: impl FnOnce(&Row<'_>) -> rusqlite::Result<T>,
	) -> Result<Option<T>> {
		match self.conn.query_row(sql, params, f) {
			Ok(value) => Ok(Some(value)),
			Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
			Err(err) => Err(classify(err)),
		}
	}

	pub fn query_rows<T>(
		&self,
		sql: &str,
		params: &[&dyn rusqlite::ToSql],
		mut f: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
	) -> Result<Vec<T>> {
		let mut stmt = self.conn.prepare(sql).map_err(classify)?;
		let rows = stmt.query_map(params, |row| f(row)).map_err(classify)?;
		rows.collect::<rusqlite::Result<Vec<T>>>().map_err(classify)
	}

	/// Runs a passive WAL checkpoint. Called by the incremental syncer on an
	/// idle timer, never from inside an open transaction.
	pub fn checkpoint(&self) -> Result<()> {
		self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);").map_err(classify)
	}

	pub fn optimize(&self) -> Result<()> {
		self.conn.execute_batch("PRAGMA optimize;").map_err(classify)
	}

	pub(crate) fn connection(&self) -> &Connection {
		&self.conn
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn begin_commit_round_trip() {
		let mut store = ReplicaStore::open_in_memory().unwrap();
		store.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)").unwrap();

		store.begin(TxMode::Exclusive).unwrap();
		store.execute("INSERT INTO t (id, v) VALUES (?1, ?2)", &[&1, &"hello"]).unwrap();
		store.commit().unwrap();

		let row: Option<String> =
			store.query_row("SELECT v FROM t WHERE id = ?1", &[&1], |row| row.get(0)).unwrap();
		assert_eq!(row, Some("hello".to_string()));
	}

	#[test]
	fn rollback_discards_writes() {
		let mut store = ReplicaStore::open_in_memory().unwrap();
		store.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();

		store.begin(TxMode::Exclusive).unwrap();
		store.execute("INSERT INTO t (id) VALUES (?1)", &[&1]).unwrap();
		store.rollback().unwrap();

		let row: Option<i64> =
			store.query_row("SELECT id FROM t WHERE id = ?1", &[&1], |row| row.get(0)).unwrap();
		assert_eq!(row, None);
	}

	#[test]
	fn nested_begin_is_rejected() {
		let mut store = ReplicaStore::open_in_memory().unwrap();
		store.begin(TxMode::Exclusive).unwrap();
		assert!(store.begin(TxMode::Exclusive).is_err());
	}

	#[test]
	fn rollback_without_transaction_is_a_no_op() {
		let mut store = ReplicaStore::open_in_memory().unwrap();
		assert!(store.rollback().is_ok());
	}
}
