// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser)]
#[command(name = "repl-cli")]
#[command(about = "Runs the replication core against an embedded SQLite replica", long_about = None)]
#[command(version)]
pub struct Config {
	/// Path to the embedded SQLite replica file. Created if it does not
	/// already exist.
	#[arg(long, env = "REPL_REPLICA_PATH")]
	pub replica_path: PathBuf,

	/// Identifier this process presents to the upstream change source.
	#[arg(long, env = "REPL_SUBSCRIBER_ID", default_value = "repl-cli")]
	pub subscriber_id: String,

	/// Deployment discipline for replica transactions.
	#[arg(long, value_enum, env = "REPL_MODE", default_value = "serving")]
	pub mode: Mode,

	/// Run initial sync instead of incremental sync. Fails if the replica
	/// is already initialized.
	#[arg(long)]
	pub initial: bool,

	/// Publications this subscriber requests, comma-separated. Must match
	/// `replicationConfig.publications` on every incremental sync
	/// (invariant I5); only recorded, not checked, during initial sync.
	#[arg(long, env = "REPL_PUBLICATIONS", value_delimiter = ',')]
	pub publications: Vec<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Mode {
	Serving,
	Backup,
}

impl Mode {
	pub fn tx_mode(self) -> repl_store::TxMode {
		match self {
			Mode::Serving => repl_store::TxMode::Concurrent,
			Mode::Backup => repl_store::TxMode::Exclusive,
		}
	}
}
