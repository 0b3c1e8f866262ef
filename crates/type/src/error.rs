// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::{Display, Formatter};

/// A structured description of what went wrong, carried by every `Error`
/// variant. `code` is a short machine-matchable identifier; `message` is
/// the human-readable explanation; `cause` chains to the error that
/// triggered this one, when there is one.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
	pub code: &'static str,
	pub message: String,
	pub cause: Option<Box<Error>>,
}

impl Diagnostic {
	pub fn new(code: &'static str, message: impl Into<String>) -> Self {
		Self { code, message: message.into(), cause: None }
	}

	pub fn caused_by(mut self, cause: Error) -> Self {
		self.cause = Some(Box::new(cause));
		self
	}
}

impl Display for Diagnostic {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "[{}] {}", self.code, self.message)?;
		if let Some(cause) = &self.cause {
			write!(f, ": {cause}")?;
		}
		Ok(())
	}
}

/// The error kinds the replication core can surface, matching the taxonomy
/// in the design (transient/protocol/schema/configuration/unrecoverable).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
	/// Retried once locally (lock contention) or forever with backoff
	/// at the syncer level (subscribe failures). Never fatal by itself.
	#[error("transient error: {0}")]
	Transient(Diagnostic),

	/// Out-of-order or missing begin/commit, watermark mismatch,
	/// subscription refused. Fatal: the subscription is torn down and
	/// any in-flight transaction is rolled back.
	#[error("protocol error: {0}")]
	Protocol(Diagnostic),

	/// Unknown table/column referenced by a DML message. Fatal until
	/// the table spec cache is reloaded on reconstruction.
	#[error("schema error: {0}")]
	Schema(Diagnostic),

	/// Publications requested by the subscriber differ from those
	/// recorded on the replica. Fatal at startup.
	#[error("configuration error: {0}")]
	Configuration(Diagnostic),

	/// Validator failure after initial sync; the replica file is
	/// considered corrupt.
	#[error("unrecoverable error: {0}")]
	Unrecoverable(Diagnostic),
}

impl Error {
	pub fn transient(code: &'static str, message: impl Into<String>) -> Self {
		Error::Transient(Diagnostic::new(code, message))
	}

	pub fn protocol(code: &'static str, message: impl Into<String>) -> Self {
		Error::Protocol(Diagnostic::new(code, message))
	}

	pub fn schema(code: &'static str, message: impl Into<String>) -> Self {
		Error::Schema(Diagnostic::new(code, message))
	}

	pub fn configuration(code: &'static str, message: impl Into<String>) -> Self {
		Error::Configuration(Diagnostic::new(code, message))
	}

	pub fn unrecoverable(code: &'static str, message: impl Into<String>) -> Self {
		Error::Unrecoverable(Diagnostic::new(code, message))
	}

	/// True for errors the syncer may retry (subscribe failures,
	/// lock contention) rather than treat as a fatal subscription
	/// teardown.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Error::Transient(_))
	}

	pub fn diagnostic(&self) -> &Diagnostic {
		match self {
			Error::Transient(d)
			| Error::Protocol(d)
			| Error::Schema(d)
			| Error::Configuration(d)
			| Error::Unrecoverable(d) => d,
		}
	}
}
