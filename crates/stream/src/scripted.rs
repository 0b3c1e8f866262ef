// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use repl_type::Result;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;

use crate::{AckSink, AckToken, ChangeMessage, ChangeSource, ChangeStream, SubscribeRequest};

/// An in-process [`ChangeSource`] that replays a fixed script of messages,
/// one per `subscribe` call. Grounded on the `TestConsumer`/`PollConsumer`
/// test-double pattern: a thin wrapper that feeds a canned sequence through
/// the same channel types the real transport uses, so the Change Processor
/// and Incremental Syncer can be exercised without a network dependency.
pub struct ScriptedSource {
	messages: Vec<ChangeMessage>,
}

impl ScriptedSource {
	pub fn new(messages: Vec<ChangeMessage>) -> Self {
		Self { messages }
	}
}

impl ChangeSource for ScriptedSource {
	fn subscribe(&self, _request: SubscribeRequest) -> Result<(ChangeStream, AckSink)> {
		let (tx, rx) = mpsc::channel(self.messages.len().max(1));
		for message in self.messages.clone() {
			tx.try_send(Ok(message)).expect("scripted channel sized to message count");
		}
		drop(tx);

		let stream: ChangeStream = Box::pin(ReceiverStream::new(rx));
		let (ack_tx, _ack_rx) = watch::channel(AckToken::new());
		Ok((stream, ack_tx))
	}
}

#[cfg(test)]
mod tests {
	use repl_type::Watermark;

	use super::*;
	use crate::subscription::SubscriptionMode;

	#[tokio::test]
	async fn replays_scripted_messages_in_order() {
		use tokio_stream::StreamExt;

		let source = ScriptedSource::new(vec![
			ChangeMessage::Begin { commit_watermark: Watermark::from_raw("06") },
			ChangeMessage::Commit { watermark: Watermark::from_raw("06") },
		]);
		let request = SubscribeRequest {
			subscriber_id: "test".to_string(),
			mode: SubscriptionMode::Serving,
			last_watermark: Watermark::from_raw("00"),
			replica_version: String::new(),
			publications: vec![],
			initial: true,
		};

		let (mut stream, _acks) = source.subscribe(request).unwrap();
		let first = stream.next().await.unwrap().unwrap();
		let second = stream.next().await.unwrap().unwrap();
		assert!(matches!(first, ChangeMessage::Begin { .. }));
		assert!(matches!(second, ChangeMessage::Commit { .. }));
		assert!(stream.next().await.is_none());
	}
}
