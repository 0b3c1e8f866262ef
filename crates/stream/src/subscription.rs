// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::pin::Pin;

use futures_util::Stream;
use repl_type::{Result, Watermark};
use tokio::sync::watch;

/// Deployment discipline requested for the subscription, matching the two
/// transaction modes in spec.md §5: `Serving` allows concurrent read
/// snapshots of prior committed state, `Backup` takes a plain exclusive
/// lock to avoid deadlocking external checkpointers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubscriptionMode {
	Serving,
	Backup,
}

/// Parameters of a subscribe call, as described in spec.md §4.8/§6.
/// Initial-sync subscriptions supply an empty `replica_version`; the first
/// `begin` message's commit watermark becomes the new replica version.
///
/// `publications` is the subscriber's requested publication set. Per
/// invariant I5, an incremental subscription must compare this against
/// `replicationConfig.publications` and fail fatally on mismatch before
/// ever calling `subscribe`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscribeRequest {
	pub subscriber_id: String,
	pub mode: SubscriptionMode,
	pub last_watermark: Watermark,
	pub replica_version: String,
	pub publications: Vec<String>,
	pub initial: bool,
}

/// An opaque acknowledgement token handed back to the producer.
pub type AckToken = String;

/// The inbound, totally-ordered stream of change messages.
pub type ChangeStream = Pin<Box<dyn Stream<Item = Result<crate::ChangeMessage>> + Send>>;

/// The outbound ack back-channel. Built on [`tokio::sync::watch`], whose
/// send-overwrites-receive-latest semantics are exactly the "coalesce to
/// the most recent ack" behaviour spec.md §4.8 asks for — a slow consumer
/// of acks never sees a backlog, only ever the newest token.
pub type AckSink = watch::Sender<AckToken>;

/// An abstract, versioned subscription onto the upstream change source.
/// Implementations own whatever transport (gRPC stream, in-process
/// channel, replay log) actually carries messages; the core only depends
/// on this trait.
pub trait ChangeSource: Send + Sync {
	fn subscribe(&self, request: SubscribeRequest) -> Result<(ChangeStream, AckSink)>;
}
