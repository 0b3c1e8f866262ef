// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use crate::store::{ReplicaStore, TxMode};

#[test]
fn on_disk_store_survives_reopen() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("replica.db");

	{
		let mut store = ReplicaStore::open(&path).unwrap();
		store.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)").unwrap();
		store.begin(TxMode::Exclusive).unwrap();
		store.execute("INSERT INTO t (id, v) VALUES (?1, ?2)", &[&1, &"persisted"]).unwrap();
		store.commit().unwrap();
	}

	let reopened = ReplicaStore::open(&path).unwrap();
	let value: Option<String> =
		reopened.query_row("SELECT v FROM t WHERE id = ?1", &[&1], |row| row.get(0)).unwrap();
	assert_eq!(value, Some("persisted".to_string()));
}

#[test]
fn checkpoint_and_optimize_do_not_require_a_transaction() {
	let store = ReplicaStore::open_in_memory().unwrap();
	assert!(store.checkpoint().is_ok());
	assert!(store.optimize().is_ok());
}
