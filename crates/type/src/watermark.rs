// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::{Display, Formatter};

/// An opaque, lexicographically-ordered commit identifier.
///
/// Watermarks have no arithmetic; the only guarantee is that string
/// comparison equals logical commit ordering. The only producer of new
/// watermarks is the upstream change source — nothing in this workspace
/// constructs one out of thin air.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, serde::Serialize, serde::Deserialize)]
pub struct Watermark(String);

impl Watermark {
	/// Wraps a raw watermark string received from the change source.
	pub fn from_raw(raw: impl Into<String>) -> Self {
		Self(raw.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// True if `self` is the replica's initial watermark, i.e. the
	/// sentinel assigned at initial sync rather than a later commit.
	pub fn is_initial(&self, initial: &Watermark) -> bool {
		self == initial
	}
}

impl Display for Watermark {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for Watermark {
	fn from(value: &str) -> Self {
		Self::from_raw(value)
	}
}

impl From<String> for Watermark {
	fn from(value: String) -> Self {
		Self::from_raw(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn orders_lexicographically() {
		assert!(Watermark::from_raw("02") < Watermark::from_raw("06"));
		assert!(Watermark::from_raw("06") < Watermark::from_raw("0a"));
		assert!(Watermark::from_raw("0a") < Watermark::from_raw("0e"));
	}

	#[test]
	fn is_initial_compares_by_value() {
		let initial = Watermark::from_raw("02");
		assert!(Watermark::from_raw("02").is_initial(&initial));
		assert!(!Watermark::from_raw("06").is_initial(&initial));
	}

	#[test]
	fn display_round_trips_raw_string() {
		assert_eq!(Watermark::from_raw("0e").to_string(), "0e");
	}
}
