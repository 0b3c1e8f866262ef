// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

use futures_util::StreamExt;
use repl_changelog::get_watermark;
use repl_store::{ReplicaStore, TxMode};
use repl_stream::{ChangeSource, SubscribeRequest, SubscriptionMode};
use repl_txn::ChangeLogMode;
use repl_type::{Result, Watermark};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::backoff::Backoff;
use crate::change_processor::ChangeProcessor;

const BACKOFF_BASE: Duration = Duration::from_millis(100);
const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Drives one subscriber's worth of ongoing replication: subscribes,
/// pumps every message through the [`ChangeProcessor`], persists the
/// watermark after each commit, and republishes a "version ready"
/// notification for waiting readers. Reconnects with exponential backoff
/// on subscribe failure or stream error (spec.md §4.9); never retries past
/// a [`ChangeProcessor`] going `failed`, since that indicates a protocol
/// violation rather than a transient transport issue.
pub struct IncrementalSyncer {
	subscriber_id: String,
	replica_version: String,
	publications: Vec<String>,
	tx_mode: TxMode,
	version_ready: watch::Sender<Watermark>,
	cancel: CancellationToken,
}

impl IncrementalSyncer {
	pub fn new(
		subscriber_id: impl Into<String>,
		replica_version: impl Into<String>,
		publications: Vec<String>,
		tx_mode: TxMode,
		initial_watermark: Watermark,
	) -> (Self, watch::Receiver<Watermark>) {
		let (tx, rx) = watch::channel(initial_watermark);
		let syncer = Self {
			subscriber_id: subscriber_id.into(),
			replica_version: replica_version.into(),
			publications,
			tx_mode,
			version_ready: tx,
			cancel: CancellationToken::new(),
		};
		(syncer, rx)
	}

	/// A clone of the cancellation token; call `.cancel()` on it to stop
	/// the run loop at the next safe opportunity. Cancellation never
	/// commits an in-flight transaction.
	pub fn cancellation(&self) -> CancellationToken {
		self.cancel.clone()
	}

	/// Runs until cancelled. Returns `Ok(())` on a clean cancellation,
	/// or the fatal error that made the [`ChangeProcessor`] unusable.
	#[instrument(name = "incremental_syncer::run", skip(self, store, source))]
	pub async fn run(&self, store: &mut ReplicaStore, source: &dyn ChangeSource) -> Result<()> {
		let mut backoff = Backoff::new(BACKOFF_BASE, BACKOFF_CAP);

		loop {
			if self.cancel.is_cancelled() {
				return Ok(());
			}

			match self.run_once(store, source, &mut backoff).await {
				Ok(()) => return Ok(()),
				Err(err) if err.is_retryable() => {
					let delay = backoff.next();
					warn!(error = %err, delay_ms = delay.as_millis() as u64, "subscription failed, retrying");
					tokio::select! {
						_ = tokio::time::sleep(delay) => {}
						_ = self.cancel.cancelled() => return Ok(()),
					}
				}
				Err(err) => return Err(err),
			}
		}
	}

	async fn run_once(&self, store: &mut ReplicaStore, source: &dyn ChangeSource, backoff: &mut Backoff) -> Result<()> {
		let last_watermark = get_watermark(store)?.unwrap_or_else(|| Watermark::from_raw(""));

		if let Some(config) = repl_changelog::get_config(store)? {
			if config.publications != self.publications {
				return Err(repl_type::Error::configuration(
					"PUBLICATION_MISMATCH",
					format!(
						"subscriber requested publications {:?}, replica was initialized with {:?}",
						self.publications, config.publications
					),
				));
			}
		}

		let request = SubscribeRequest {
			subscriber_id: self.subscriber_id.clone(),
			mode: match self.tx_mode {
				TxMode::Exclusive => SubscriptionMode::Backup,
				TxMode::Concurrent => SubscriptionMode::Serving,
			},
			last_watermark,
			replica_version: self.replica_version.clone(),
			publications: self.publications.clone(),
			initial: false,
		};

		let (mut stream, ack) = source.subscribe(request)?;
		self.version_ready.send_replace(get_watermark(store)?.unwrap_or_else(|| Watermark::from_raw("")));

		let mut processor = ChangeProcessor::new(self.tx_mode, ChangeLogMode::Log);

		loop {
			tokio::select! {
				_ = self.cancel.cancelled() => {
					info!("incremental syncer cancelled mid-stream");
					return Ok(());
				}
				next = stream.next() => {
					let Some(msg) = next else {
						return Err(repl_type::Error::transient(
							"STREAM_CLOSED",
							"change stream ended without an error",
						));
					};
					let msg = msg?;
					let outcome = processor.process(store, msg)?;
					backoff.reset();

					if let Some(watermark) = outcome.committed {
						self.version_ready.send_replace(watermark.clone());
						ack.send(watermark.to_string()).ok();
					}
				}
			}
		}
	}
}
