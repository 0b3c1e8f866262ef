// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use repl_store::{ReplicaStore, quote_ident};
use repl_type::{Error, Result, Watermark};
use tracing::instrument;

const CONFIG_TABLE: &str = "_zero.replicationConfig";
const STATE_TABLE: &str = "_zero.replicationState";

/// The immutable configuration recorded once, at initial sync.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReplicationConfig {
	pub replica_version: String,
	pub publications: Vec<String>,
}

pub fn ensure_schema(store: &ReplicaStore) -> Result<()> {
	store.execute_batch(&format!(
		"CREATE TABLE IF NOT EXISTS {config} (
			lock INTEGER PRIMARY KEY CHECK (lock = 1),
			replica_version TEXT NOT NULL,
			publications TEXT NOT NULL
		);
		CREATE TABLE IF NOT EXISTS {state} (
			lock INTEGER PRIMARY KEY CHECK (lock = 1),
			state_version TEXT NOT NULL
		);",
		config = quote_ident(CONFIG_TABLE),
		state = quote_ident(STATE_TABLE),
	))
}

/// Runs exactly once, at initial-sync boot. Fails if a row is already
/// present — re-running initial sync against an already-initialized
/// replica is a configuration error, not something to silently tolerate.
#[instrument(skip(store))]
pub fn init(store: &ReplicaStore, config: &ReplicationConfig, initial_watermark: &Watermark) -> Result<()> {
	let existing = get(store)?;
	if existing.is_some() {
		return Err(Error::configuration(
			"REPLICATION_ALREADY_INITIALIZED",
			"replicationConfig already has a row; init must run exactly once",
		));
	}

	store.execute(
		&format!(
			"INSERT INTO {table} (lock, replica_version, publications) VALUES (1, ?1, ?2)",
			table = quote_ident(CONFIG_TABLE)
		),
		&[&config.replica_version, &config.publications.join(",")],
	)?;
	store.execute(
		&format!(
			"INSERT INTO {table} (lock, state_version) VALUES (1, ?1)",
			table = quote_ident(STATE_TABLE)
		),
		&[&initial_watermark.as_str()],
	)?;
	Ok(())
}

/// Reads the immutable replication config, if initialized.
#[instrument(skip(store))]
pub fn get_config(store: &ReplicaStore) -> Result<Option<ReplicationConfig>> {
	store.query_row(
		&format!("SELECT replica_version, publications FROM {} WHERE lock = 1", quote_ident(CONFIG_TABLE)),
		&[],
		|row| {
			let replica_version: String = row.get(0)?;
			let publications: String = row.get(1)?;
			Ok(ReplicationConfig {
				replica_version,
				publications: publications.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect(),
			})
		},
	)
}

/// Reads the last committed watermark, if initialized.
#[instrument(skip(store))]
pub fn get(store: &ReplicaStore) -> Result<Option<Watermark>> {
	store.query_row(&format!("SELECT state_version FROM {} WHERE lock = 1", quote_ident(STATE_TABLE)), &[], |row| {
		row.get::<_, String>(0)
	})
	.map(|opt| opt.map(Watermark::from))
}

/// Advances `replicationState.stateVersion` to `version`. Only monotonic
/// forward moves are allowed (invariant I1); a backward or equal move is a
/// configuration error, signalling a replay bug upstream of this call.
#[instrument(skip(store))]
pub fn update_watermark(store: &ReplicaStore, version: &Watermark) -> Result<()> {
	let current = get(store)?.ok_or_else(|| {
		Error::configuration("REPLICATION_NOT_INITIALIZED", "replicationState has no row; call init first")
	})?;

	if *version <= current {
		return Err(Error::configuration(
			"REPLICATION_WATERMARK_NOT_MONOTONIC",
			format!("watermark {} is not strictly greater than current {}", version, current),
		));
	}

	store.execute(
		&format!("UPDATE {} SET state_version = ?1 WHERE lock = 1", quote_ident(STATE_TABLE)),
		&[&version.as_str()],
	)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn store() -> ReplicaStore {
		let store = ReplicaStore::open_in_memory().unwrap();
		ensure_schema(&store).unwrap();
		store
	}

	#[test]
	fn init_then_get_round_trips() {
		let store = store();
		let config = ReplicationConfig {
			replica_version: "v1".to_string(),
			publications: vec!["pub_a".to_string(), "pub_b".to_string()],
		};
		let initial = Watermark::from_raw("0000");
		init(&store, &config, &initial).unwrap();

		assert_eq!(get(&store).unwrap(), Some(initial));
		assert_eq!(get_config(&store).unwrap(), Some(config));
	}

	#[test]
	fn init_twice_is_rejected() {
		let store = store();
		let config = ReplicationConfig { replica_version: "v1".to_string(), publications: vec![] };
		let initial = Watermark::from_raw("0000");
		init(&store, &config, &initial).unwrap();
		assert!(init(&store, &config, &initial).is_err());
	}

	#[test]
	fn update_watermark_requires_strictly_greater() {
		let store = store();
		let config = ReplicationConfig { replica_version: "v1".to_string(), publications: vec![] };
		init(&store, &config, &Watermark::from_raw("0000")).unwrap();

		update_watermark(&store, &Watermark::from_raw("0001")).unwrap();
		assert_eq!(get(&store).unwrap(), Some(Watermark::from_raw("0001")));

		assert!(update_watermark(&store, &Watermark::from_raw("0001")).is_err());
		assert!(update_watermark(&store, &Watermark::from_raw("0000")).is_err());
	}
}
