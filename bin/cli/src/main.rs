// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

mod config;

use clap::Parser;
use config::Config;
use repl_store::ReplicaStore;
use repl_stream::{ChangeSource, ScriptedSource};
use repl_sync::{IncrementalSyncer, InitialSyncDriver};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
	tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

	tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.thread_name("repl-cli")
		.build()
		.expect("failed to start tokio runtime")
		.block_on(async {
			if let Err(err) = run(Config::parse()).await {
				error!(error = %err, "replication core exited with an error");
				std::process::exit(1);
			}
		});
}

/// Wires a [`ReplicaStore`] and a [`ChangeSource`] together and runs either
/// the Initial Sync Driver or the Incremental Syncer, per `config.initial`.
///
/// The concrete change-source transport (gRPC client, in-process replay,
/// …) is out of scope for the core and therefore for this binary too: a
/// real deployment links a transport crate that implements [`ChangeSource`]
/// and constructs its own `main`. This binary exists to exercise the core
/// end-to-end, so it wires an empty [`ScriptedSource`] — enough to prove
/// the wiring compiles and runs, not a usable production entry point.
async fn run(config: Config) -> repl_type::Result<()> {
	let mut store = ReplicaStore::open(&config.replica_path)?;
	repl_changelog::ensure_schema(&store)?;

	let source: Box<dyn ChangeSource> = Box::new(ScriptedSource::new(vec![]));

	if config.initial {
		info!(replica = %config.replica_path.display(), "running initial sync");
		let driver =
			InitialSyncDriver::new(config.subscriber_id.clone(), config.publications.clone(), config.mode.tx_mode());
		let watermark = driver.run(&mut store, source.as_ref()).await?;
		info!(watermark = %watermark, "initial sync complete");
		return Ok(());
	}

	let last_watermark = repl_changelog::get_watermark(&store)?
		.unwrap_or_else(|| repl_type::Watermark::from_raw(""));
	let replica_version = repl_changelog::get_config(&store)?
		.map(|cfg| cfg.replica_version)
		.unwrap_or_default();

	let (syncer, _version_ready) = IncrementalSyncer::new(
		config.subscriber_id.clone(),
		replica_version,
		config.publications.clone(),
		config.mode.tx_mode(),
		last_watermark,
	);
	let cancel = syncer.cancellation();

	tokio::spawn(async move {
		signal::ctrl_c().await.ok();
		info!("shutdown requested");
		cancel.cancel();
	});

	info!(replica = %config.replica_path.display(), "running incremental sync");
	syncer.run(&mut store, source.as_ref()).await
}
