// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use repl_catalog::TableSpecCache;
use repl_changelog::ReplicationConfig;
use repl_store::{ReplicaStore, TxMode, quote_ident};
use repl_stream::{ChangeMessage, ChangeSource, SubscribeRequest, SubscriptionMode};
use repl_txn::{ChangeLogMode, TransactionProcessor};
use repl_type::{Error, Result, Watermark};
use tracing::{info, instrument};

const META_TABLES: &[&str] = &["_zero.clients", "_zero.permissions", "_zero.schemaVersions"];

/// Bootstraps a fresh replica file from a distinguished initial stream
/// (spec.md §4.10). Invoked exactly once, before any [`crate::syncer::IncrementalSyncer`]
/// run against the same replica.
pub struct InitialSyncDriver {
	subscriber_id: String,
	publications: Vec<String>,
	tx_mode: TxMode,
}

impl InitialSyncDriver {
	pub fn new(subscriber_id: impl Into<String>, publications: Vec<String>, tx_mode: TxMode) -> Self {
		Self { subscriber_id: subscriber_id.into(), publications, tx_mode }
	}

	/// Creates the meta tables, subscribes with an empty `replicaVersion`,
	/// applies the initial stream with change-log writes suppressed, and
	/// commits the meta-table init and the initial data in one replica
	/// transaction. Fails fast if the replica is already initialized.
	#[instrument(name = "initial_sync_driver::run", skip(self, store, source))]
	pub async fn run(&self, store: &mut ReplicaStore, source: &dyn ChangeSource) -> Result<Watermark> {
		if repl_changelog::get(store)?.is_some() {
			return Err(Error::configuration(
				"ALREADY_INITIALIZED",
				"initial sync driver invoked against an already-initialized replica",
			));
		}

		repl_changelog::ensure_schema(store)?;
		create_meta_tables(store)?;

		let request = SubscribeRequest {
			subscriber_id: self.subscriber_id.clone(),
			mode: match self.tx_mode {
				TxMode::Exclusive => SubscriptionMode::Backup,
				TxMode::Concurrent => SubscriptionMode::Serving,
			},
			last_watermark: Watermark::from_raw(""),
			replica_version: String::new(),
			publications: self.publications.clone(),
			initial: true,
		};
		let (mut stream, _ack) = source.subscribe(request)?;

		let mut cache = TableSpecCache::new();
		let mut txn: Option<TransactionProcessor> = None;
		let mut final_watermark: Option<Watermark> = None;

		use futures_util::StreamExt;
		while let Some(msg) = stream.next().await {
			let msg = msg?;
			match msg {
				ChangeMessage::Begin { commit_watermark } => {
					cache.rebuild(store)?;
					txn = Some(TransactionProcessor::begin(
						store,
						commit_watermark,
						self.tx_mode,
						ChangeLogMode::Suppressed,
					)?);
				}
				ChangeMessage::Commit { watermark } => {
					let txn = txn.take().ok_or_else(|| {
						Error::protocol("COMMIT_WITHOUT_BEGIN", "initial sync commit with no open transaction")
					})?;
					txn.commit(store, &watermark)?;
					final_watermark = Some(watermark);
					break;
				}
				ChangeMessage::Error { cause } => {
					if let Some(txn) = txn.take() {
						txn.rollback(store).ok();
					}
					return Err(Error::protocol("UPSTREAM_ERROR", cause));
				}
				ChangeMessage::Control(_) | ChangeMessage::Status(_) => continue,
				data => {
					let active = txn.as_mut().ok_or_else(|| {
						Error::protocol("DATA_WITHOUT_BEGIN", "initial sync data message with no open transaction")
					})?;
					apply(active, store, &cache, data)?;
				}
			}
		}

		let watermark = final_watermark.ok_or_else(|| {
			Error::protocol("STREAM_CLOSED_BEFORE_COMMIT", "initial sync stream ended before a commit was observed")
		})?;

		let config = ReplicationConfig { replica_version: watermark.to_string(), publications: self.publications.clone() };
		repl_changelog::init(store, &config, &watermark)?;

		validate(store)?;
		info!(watermark = %watermark, "initial sync complete");
		Ok(watermark)
	}
}

fn apply(
	txn: &mut TransactionProcessor,
	store: &mut ReplicaStore,
	cache: &TableSpecCache,
	msg: ChangeMessage,
) -> Result<()> {
	use repl_stream::ChangeMessage::*;

	match msg {
		Insert { relation, new } => txn.insert(store, cache, &relation, &new),
		CreateTable { spec } => {
			let columns: Vec<_> = spec.columns.into_iter().map(|c| (c.name, c.spec)).collect();
			txn.create_table(store, &spec.table, &columns)
		}
		CreateIndex { spec } => txn.create_index(store, &spec.table, &spec.name, &spec.columns, spec.unique),
		Update { relation, new, key } => txn.update(store, cache, &relation, &new, key.as_ref()),
		Delete { relation, key } => txn.delete(store, &relation, &key),
		Truncate { relations } => txn.truncate(store, &relations),
		other => Err(Error::protocol(
			"UNEXPECTED_INITIAL_SYNC_MESSAGE",
			format!("{other:?} is not expected during initial sync"),
		)),
	}
}

fn create_meta_tables(store: &ReplicaStore) -> Result<()> {
	store.execute_batch(&format!(
		"CREATE TABLE IF NOT EXISTS {clients} (client_id TEXT PRIMARY KEY, client_group_id TEXT NOT NULL);
		CREATE TABLE IF NOT EXISTS {permissions} (hash TEXT PRIMARY KEY, permissions TEXT NOT NULL);
		CREATE TABLE IF NOT EXISTS {versions} (
			lock INTEGER PRIMARY KEY CHECK (lock = 1),
			min_supported_version INTEGER NOT NULL,
			max_supported_version INTEGER NOT NULL
		);
		INSERT OR IGNORE INTO {versions} (lock, min_supported_version, max_supported_version) VALUES (1, 1, 1);",
		clients = quote_ident(META_TABLES[0]),
		permissions = quote_ident(META_TABLES[1]),
		versions = quote_ident(META_TABLES[2]),
	))
}

/// Enumerates the meta tables and fails fast if one is missing. The core
/// never interprets `clients`/`permissions` rows; `schemaVersions` is
/// additionally checked for its single sentinel row.
#[instrument(skip(store))]
fn validate(store: &ReplicaStore) -> Result<()> {
	let tables = repl_store::list_tables(store)?;
	for required in META_TABLES {
		if !tables.iter().any(|t| t == required) {
			return Err(Error::unrecoverable(
				"META_TABLE_MISSING",
				format!("required table {required} is missing after initial sync"),
			));
		}
	}

	let versions = store.query_row(
		&format!("SELECT min_supported_version, max_supported_version FROM {} WHERE lock = 1", quote_ident(META_TABLES[2])),
		&[],
		|row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
	)?;
	if versions.is_none() {
		return Err(Error::unrecoverable(
			"META_TABLE_MALFORMED",
			"_zero.schemaVersions has no sentinel row after initial sync",
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use repl_catalog::{ColumnSpec, Relation, ReplicaIdentity};
	use repl_stream::{ColumnDdl, ScriptedSource, TableDdl};
	use repl_type::Value;
	use std::collections::BTreeMap;

	use super::*;

	fn column(name: &str) -> ColumnDdl {
		ColumnDdl {
			name: name.to_string(),
			spec: ColumnSpec { position: 0, data_type: "TEXT".to_string(), nullable: true, default: None, is_enum: false, is_array: false },
		}
	}

	#[tokio::test]
	async fn bootstraps_meta_tables_and_initial_data() {
		let mut store = ReplicaStore::open_in_memory().unwrap();

		let mut row = BTreeMap::new();
		row.insert("id".to_string(), Value::Text("1".to_string()));

		let messages = vec![
			ChangeMessage::Begin { commit_watermark: Watermark::from_raw("00") },
			ChangeMessage::CreateTable {
				spec: TableDdl { table: "widgets".to_string(), columns: vec![column("id")] },
			},
			ChangeMessage::Insert {
				relation: Relation::new("", "widgets", vec!["id".to_string()], ReplicaIdentity::Default),
				new: row,
			},
			ChangeMessage::Commit { watermark: Watermark::from_raw("00") },
		];
		let source = ScriptedSource::new(messages);

		let driver = InitialSyncDriver::new("sub-1", vec![], TxMode::Exclusive);
		let watermark = driver.run(&mut store, &source).await.unwrap();
		assert_eq!(watermark, Watermark::from_raw("00"));

		assert_eq!(repl_changelog::get(&store).unwrap(), Some(Watermark::from_raw("00")));
		let count: Option<i64> =
			store.query_row("SELECT COUNT(*) FROM widgets", &[], |row| row.get(0)).unwrap();
		assert_eq!(count, Some(1));
	}

	#[tokio::test]
	async fn rejects_already_initialized_replica() {
		let mut store = ReplicaStore::open_in_memory().unwrap();
		repl_changelog::ensure_schema(&store).unwrap();
		repl_changelog::init(
			&store,
			&ReplicationConfig { replica_version: "v1".to_string(), publications: vec![] },
			&Watermark::from_raw("00"),
		)
		.unwrap();

		let driver = InitialSyncDriver::new("sub-1", vec![], TxMode::Exclusive);
		let source = ScriptedSource::new(vec![]);
		assert!(driver.run(&mut store, &source).await.is_err());
	}
}
