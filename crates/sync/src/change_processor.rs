// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::thread;
use std::time::Duration;

use repl_catalog::TableSpecCache;
use repl_store::{ReplicaStore, TxMode};
use repl_stream::ChangeMessage;
use repl_txn::{ChangeLogMode, TransactionProcessor};
use repl_type::{Error, Result, Watermark};
use tracing::{error, instrument, warn};

/// The Change Processor's state, matching spec.md §4.7 exactly: `idle` and
/// `inTx` cycle for as long as the subscription is healthy; `failed` is
/// terminal and every subsequent message is dropped until the processor is
/// reconstructed.
#[derive(Debug, Eq, PartialEq)]
enum State {
	Idle,
	InTx,
	Failed,
}

/// The result of processing one message: whether a commit was observed on
/// this call, and with which watermark.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct ProcessOutcome {
	pub committed: Option<Watermark>,
}

/// Drives one subscription's worth of upstream messages through the
/// Transaction Processor. Owns the Table Spec Cache for the lifetime of
/// the subscription; a fresh `TransactionProcessor` is constructed per
/// transaction and discarded on commit, rollback, or fatal failure —
/// matching Design Note "Cyclic references" (the Change Processor owns the
/// Transaction Processor, never the reverse).
///
/// `process` is plain synchronous enum-matching, with no locking of its
/// own: the Incremental Syncer drives it one message at a time from its
/// async loop, matching the single-cooperative-task model of spec.md §5.
pub struct ChangeProcessor {
	state: State,
	cache: TableSpecCache,
	txn: Option<TransactionProcessor>,
	tx_mode: TxMode,
	change_log_mode: ChangeLogMode,
}

impl ChangeProcessor {
	pub fn new(tx_mode: TxMode, change_log_mode: ChangeLogMode) -> Self {
		Self { state: State::Idle, cache: TableSpecCache::new(), txn: None, tx_mode, change_log_mode }
	}

	pub fn is_failed(&self) -> bool {
		self.state == State::Failed
	}

	#[instrument(name = "change_processor::process", skip(self, store, msg))]
	pub fn process(&mut self, store: &mut ReplicaStore, msg: ChangeMessage) -> Result<ProcessOutcome> {
		if msg.is_out_of_band() {
			return Ok(ProcessOutcome::default());
		}

		match self.state {
			State::Failed => {
				warn!("dropping message: change processor is in the failed state");
				Ok(ProcessOutcome::default())
			}
			State::Idle => self.process_idle(store, msg),
			State::InTx => self.process_in_tx(store, msg),
		}
	}

	fn process_idle(&mut self, store: &mut ReplicaStore, msg: ChangeMessage) -> Result<ProcessOutcome> {
		match msg {
			ChangeMessage::Begin { commit_watermark } => {
				if self.cache.is_empty() {
					self.cache.rebuild(store)?;
				}
				let txn = TransactionProcessor::begin(store, commit_watermark, self.tx_mode, self.change_log_mode)?;
				self.txn = Some(txn);
				self.state = State::InTx;
				Ok(ProcessOutcome::default())
			}
			ChangeMessage::Error { cause } => self.fail(Error::protocol("UPSTREAM_ERROR", cause)),
			other => self.fail(Error::protocol(
				"MESSAGE_OUTSIDE_TRANSACTION",
				format!("received {other:?} while idle; expected begin"),
			)),
		}
	}

	fn process_in_tx(&mut self, store: &mut ReplicaStore, msg: ChangeMessage) -> Result<ProcessOutcome> {
		match msg {
			ChangeMessage::Begin { .. } => {
				self.abort_in_flight(store);
				self.fail(Error::protocol("NESTED_BEGIN", "begin received without a prior commit"))
			}
			ChangeMessage::Commit { watermark } => self.handle_commit(store, watermark),
			ChangeMessage::Rollback => {
				self.abort_in_flight(store);
				self.state = State::Idle;
				Ok(ProcessOutcome::default())
			}
			ChangeMessage::Error { cause } => {
				self.abort_in_flight(store);
				self.fail(Error::protocol("UPSTREAM_ERROR", cause))
			}
			data => self.dispatch_data(store, data),
		}
	}

	fn handle_commit(&mut self, store: &mut ReplicaStore, watermark: Watermark) -> Result<ProcessOutcome> {
		let txn = self.txn.take().expect("inTx state always carries a TransactionProcessor");
		match txn.commit(store, &watermark) {
			Ok(()) => {
				self.state = State::Idle;
				Ok(ProcessOutcome { committed: Some(watermark) })
			}
			Err(err) => {
				self.state = State::Failed;
				error!(error = %err, "commit failed; change processor is now failed");
				Err(err)
			}
		}
	}

	fn dispatch_data(&mut self, store: &mut ReplicaStore, msg: ChangeMessage) -> Result<ProcessOutcome> {
		let mut txn = self.txn.take().expect("inTx state always carries a TransactionProcessor");
		let result = self.apply_with_lock_retry(store, &mut txn, msg);
		match result {
			Ok(()) => {
				self.txn = Some(txn);
				Ok(ProcessOutcome::default())
			}
			Err(err) => {
				txn.rollback(store).ok();
				self.state = State::Failed;
				error!(error = %err, "applying change failed; change processor is now failed");
				Err(err)
			}
		}
	}

	/// SQLite lock contention (`Error::Transient`) is retried exactly
	/// once after a short sleep, per spec.md §7's "local recovery" rule.
	/// Any other error, or a second consecutive lock error, propagates.
	fn apply_with_lock_retry(&mut self, store: &mut ReplicaStore, txn: &mut TransactionProcessor, msg: ChangeMessage) -> Result<()> {
		match self.apply(store, txn, msg.clone()) {
			Ok(()) => Ok(()),
			Err(err) if err.is_retryable() => {
				thread::sleep(Duration::from_millis(5));
				self.apply(store, txn, msg)
			}
			Err(err) => Err(err),
		}
	}

	fn apply(&mut self, store: &mut ReplicaStore, txn: &mut TransactionProcessor, msg: ChangeMessage) -> Result<()> {
		use repl_stream::ChangeMessage::*;

		match msg {
			Insert { relation, new } => txn.insert(store, &self.cache, &relation, &new),
			Update { relation, new, key } => txn.update(store, &self.cache, &relation, &new, key.as_ref()),
			Delete { relation, key } => txn.delete(store, &relation, &key),
			Truncate { relations } => txn.truncate(store, &relations),
			CreateTable { spec } => {
				let columns: Vec<_> = spec.columns.into_iter().map(|c| (c.name, c.spec)).collect();
				txn.create_table(store, &spec.table, &columns)?;
				self.cache.rebuild(store)
			}
			RenameTable { old, new } => {
				txn.rename_table(store, &old, &new)?;
				self.cache.rebuild(store)
			}
			AddColumn { table, column } => {
				txn.add_column(store, &table, &column.name, &column.spec)?;
				self.cache.rebuild(store)
			}
			UpdateColumn { table, old, new } => {
				txn.update_column(store, &table, &old.name, &new.name, &old.spec, &new.spec)?;
				self.cache.rebuild(store)
			}
			DropColumn { table, column } => {
				txn.drop_column(store, &table, &column)?;
				self.cache.rebuild(store)
			}
			DropTable { id } => {
				txn.drop_table(store, &id)?;
				self.cache.rebuild(store)
			}
			CreateIndex { spec } => {
				txn.create_index(store, &spec.table, &spec.name, &spec.columns, spec.unique)?;
				self.cache.rebuild(store)
			}
			DropIndex { table, id } => {
				txn.drop_index(store, &table, &id)?;
				self.cache.rebuild(store)
			}
			Begin { .. } | Commit { .. } | Rollback | Error { .. } | Control(_) | Status(_) => {
				unreachable!("handled by the caller before dispatch_data")
			}
		}
	}

	fn abort_in_flight(&mut self, store: &mut ReplicaStore) {
		if let Some(txn) = self.txn.take() {
			if let Err(err) = txn.rollback(store) {
				error!(error = %err, "rollback of in-flight transaction failed");
			}
		}
	}

	fn fail(&mut self, err: Error) -> Result<ProcessOutcome> {
		self.state = State::Failed;
		Err(err)
	}
}
