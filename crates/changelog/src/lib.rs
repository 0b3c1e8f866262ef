// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! The change log and replication state tables: `_zero.changeLog`,
//! `_zero.replicationConfig` and `_zero.replicationState`. Row keys are
//! treated as opaque, already-normalized strings here — normalization
//! (lexicographic column-name sort, canonical JSON stringify) lives in
//! `repl-catalog::RowKey` and happens before a caller reaches this crate.

use repl_type::Result;

pub use change_log::{log_delete, log_reset, log_set, log_truncate};
pub use replication_state::{ReplicationConfig, get as get_watermark, get_config, init, update_watermark};

mod change_log;
mod replication_state;

/// Creates every `_zero.*` table this crate owns. Idempotent; called once
/// when the replica store is opened, before any transaction begins.
pub fn ensure_schema(store: &repl_store::ReplicaStore) -> Result<()> {
	change_log::ensure_schema(store)?;
	replication_state::ensure_schema(store)?;
	Ok(())
}
