// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::collections::BTreeMap;

use repl_catalog::{ColumnSpec, ReplicaIdentity, Relation, RowKey, TableSpecCache};
use repl_store::{ReplicaStore, TxMode};
use repl_type::{Value, Watermark};

use crate::{ChangeLogMode, TransactionProcessor};

fn fixture() -> ReplicaStore {
	let store = ReplicaStore::open_in_memory().unwrap();
	repl_changelog::ensure_schema(&store).unwrap();
	repl_changelog::init(
		&store,
		&repl_changelog::ReplicationConfig { replica_version: "test".to_string(), publications: vec![] },
		&Watermark::from_raw("00"),
	)
	.unwrap();
	store
}

fn issues_relation() -> Relation {
	Relation::new("public", "issues", vec!["id".to_string(), "bool".to_string()], ReplicaIdentity::Default)
}

fn row(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
	pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn changelog_rows(store: &ReplicaStore, table: &str) -> Vec<(String, String, String)> {
	store
		.query_rows(
			"SELECT state_version, row_key, op FROM \"_zero.changeLog\" WHERE table_name = ?1 ORDER BY row_key",
			&[&table],
			|r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
		)
		.unwrap()
}

#[test]
fn scenario_1_two_commit_insert_batch() {
	let mut store = fixture();
	store
		.execute_batch("CREATE TABLE issues (id INTEGER, bool INTEGER, _0_version TEXT)")
		.unwrap();
	let cache = TableSpecCache::new();
	let relation = issues_relation();

	let mut proc = TransactionProcessor::begin(&mut store, Watermark::from_raw("06"), TxMode::Exclusive, ChangeLogMode::Log).unwrap();
	proc.insert(&mut store, &cache, &relation, &row(&[("id", Value::Int64(123)), ("bool", Value::Int64(1))])).unwrap();
	proc.insert(&mut store, &cache, &relation, &row(&[("id", Value::Int64(456)), ("bool", Value::Int64(0))])).unwrap();
	proc.commit(&mut store, &Watermark::from_raw("06")).unwrap();

	let versions: Vec<String> =
		store.query_rows("SELECT _0_version FROM issues ORDER BY id", &[], |r| r.get(0)).unwrap();
	assert_eq!(versions, vec!["06".to_string(), "06".to_string()]);

	let entries = changelog_rows(&store, "issues");
	assert_eq!(entries.len(), 2);
	assert!(entries.iter().any(|(v, k, op)| v == "06" && k == "{\"bool\":1,\"id\":123}" && op == "s"));
	assert!(entries.iter().any(|(v, k, op)| v == "06" && k == "{\"bool\":0,\"id\":456}" && op == "s"));
}

#[test]
fn scenario_2_key_changing_update() {
	let mut store = fixture();
	store
		.execute_batch("CREATE TABLE issues (id INTEGER, bool INTEGER, _0_version TEXT)")
		.unwrap();
	let cache = TableSpecCache::new();
	let relation = issues_relation();

	let mut proc = TransactionProcessor::begin(&mut store, Watermark::from_raw("06"), TxMode::Exclusive, ChangeLogMode::Log).unwrap();
	proc.insert(&mut store, &cache, &relation, &row(&[("id", Value::Int64(123)), ("bool", Value::Int64(1))])).unwrap();
	proc.commit(&mut store, &Watermark::from_raw("06")).unwrap();

	let mut proc = TransactionProcessor::begin(&mut store, Watermark::from_raw("0a"), TxMode::Exclusive, ChangeLogMode::Log).unwrap();
	let old_key = RowKey::from_columns([("id".to_string(), Value::Int64(123)), ("bool".to_string(), Value::Int64(1))]);
	proc.update(
		&mut store,
		&cache,
		&relation,
		&row(&[("id", Value::Int64(789)), ("bool", Value::Int64(1))]),
		Some(&old_key),
	)
	.unwrap();
	proc.commit(&mut store, &Watermark::from_raw("0a")).unwrap();

	let remaining: Vec<i64> = store.query_rows("SELECT id FROM issues", &[], |r| r.get(0)).unwrap();
	assert_eq!(remaining, vec![789]);

	let entries = changelog_rows(&store, "issues");
	assert!(entries.iter().any(|(v, k, op)| v == "0a" && k == "{\"bool\":1,\"id\":123}" && op == "d"));
	assert!(entries.iter().any(|(v, k, op)| v == "0a" && k == "{\"bool\":1,\"id\":789}" && op == "s"));
}

#[test]
fn scenario_3_truncate_collapses_prior_ops() {
	let mut store = fixture();
	store.execute_batch("CREATE TABLE foo (id INTEGER, _0_version TEXT)").unwrap();
	let cache = TableSpecCache::new();
	let relation = Relation::new("public", "foo", vec!["id".to_string()], ReplicaIdentity::Default);

	let mut proc = TransactionProcessor::begin(&mut store, Watermark::from_raw("0e"), TxMode::Exclusive, ChangeLogMode::Log).unwrap();
	for id in [1, 2, 3] {
		proc.insert(&mut store, &cache, &relation, &row(&[("id", Value::Int64(id))])).unwrap();
	}
	proc.truncate(&mut store, std::slice::from_ref(&relation)).unwrap();
	proc.insert(&mut store, &cache, &relation, &row(&[("id", Value::Int64(101))])).unwrap();
	proc.commit(&mut store, &Watermark::from_raw("0e")).unwrap();

	let entries = changelog_rows(&store, "foo");
	assert_eq!(entries.len(), 2);
	assert_eq!(entries[0], ("0e".to_string(), "".to_string(), "t".to_string()));
	assert_eq!(entries[1], ("0e".to_string(), "{\"id\":101}".to_string(), "s".to_string()));
}

#[test]
fn scenario_4_column_retype_preserves_data() {
	let mut store = fixture();
	store
		.execute_batch(
			"CREATE TABLE foo (id INTEGER, num TEXT, _0_version TEXT);
			 CREATE INDEX foo_num_idx ON foo (num);
			 INSERT INTO foo (id, num, _0_version) VALUES (3, '1', '00');",
		)
		.unwrap();

	let mut proc = TransactionProcessor::begin(&mut store, Watermark::from_raw("0e"), TxMode::Exclusive, ChangeLogMode::Log).unwrap();
	let old = ColumnSpec { position: 1, data_type: "text".to_string(), nullable: true, default: None, is_enum: false, is_array: false };
	let new = ColumnSpec { position: 1, data_type: "int8".to_string(), nullable: true, default: None, is_enum: false, is_array: false };
	proc.update_column(&mut store, "foo", "num", "num", &old, &new).unwrap();
	proc.commit(&mut store, &Watermark::from_raw("0e")).unwrap();

	let value: i64 = store.query_row("SELECT num FROM foo WHERE id = 3", &[], |r| r.get(0)).unwrap().unwrap();
	assert_eq!(value, 1);

	let indexes = repl_store::list_indexes(&store, "foo").unwrap();
	assert!(indexes.iter().any(|idx| idx.name == "foo_num_idx"));

	let entries = changelog_rows(&store, "foo");
	assert!(entries.iter().any(|(v, k, op)| v == "0e" && k.is_empty() && op == "r"));
}

#[test]
fn scenario_6_resumptive_upsert() {
	let mut store = fixture();
	store
		.execute_batch(
			"CREATE TABLE foo (id INTEGER, desc_ TEXT, _0_version TEXT);
			 INSERT INTO foo (id, desc_, _0_version) VALUES (1, 'one', '00');",
		)
		.unwrap();
	let cache = TableSpecCache::new();
	let relation = Relation::new("public", "foo", vec!["id".to_string()], ReplicaIdentity::Default);

	let mut proc = TransactionProcessor::begin(&mut store, Watermark::from_raw("06"), TxMode::Exclusive, ChangeLogMode::Log).unwrap();
	proc.insert(&mut store, &cache, &relation, &row(&[("id", Value::Int64(1)), ("desc_", Value::Text("replaced one".to_string()))])).unwrap();

	let nonexistent_key = RowKey::from_columns([("id".to_string(), Value::Int64(999))]);
	proc.update(
		&mut store,
		&cache,
		&relation,
		&row(&[("id", Value::Int64(234)), ("desc_", Value::Text("woo".to_string()))]),
		Some(&nonexistent_key),
	)
	.unwrap();
	proc.commit(&mut store, &Watermark::from_raw("06")).unwrap();

	let desc: String = store.query_row("SELECT desc_ FROM foo WHERE id = 1", &[], |r| r.get(0)).unwrap().unwrap();
	assert_eq!(desc, "replaced one");

	let ghost: Option<i64> = store.query_row("SELECT id FROM foo WHERE id = 234", &[], |r| r.get(0)).unwrap();
	assert_eq!(ghost, None);

	let entries = changelog_rows(&store, "foo");
	assert_eq!(entries.len(), 1);
	assert_eq!(entries[0].2, "s");
}

#[test]
fn commit_watermark_mismatch_rolls_back_and_is_fatal() {
	let mut store = fixture();
	store.execute_batch("CREATE TABLE foo (id INTEGER, _0_version TEXT)").unwrap();
	let cache = TableSpecCache::new();
	let relation = Relation::new("public", "foo", vec!["id".to_string()], ReplicaIdentity::Default);

	let mut proc = TransactionProcessor::begin(&mut store, Watermark::from_raw("07"), TxMode::Exclusive, ChangeLogMode::Log).unwrap();
	proc.insert(&mut store, &cache, &relation, &row(&[("id", Value::Int64(1))])).unwrap();

	let result = proc.commit(&mut store, &Watermark::from_raw("08"));
	assert!(result.is_err());
	assert!(!store.in_transaction());
}
