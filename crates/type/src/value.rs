// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::{Display, Formatter};

/// The scalar types a replicated column can hold once mapped into the
/// replica. Booleans are represented as `Int64` (0/1); JSON and array
/// values are represented as their canonical `Text` stringification.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ValueType {
	Null,
	Int64,
	Float64,
	Bytes,
	Text,
}

impl Display for ValueType {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			ValueType::Null => f.write_str("NULL"),
			ValueType::Int64 => f.write_str("INT64"),
			ValueType::Float64 => f.write_str("FLOAT64"),
			ValueType::Bytes => f.write_str("BYTES"),
			ValueType::Text => f.write_str("TEXT"),
		}
	}
}

/// A single column value as stored in (or read from) the replica.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
	Null,
	Int64(i64),
	Float64(f64),
	Bytes(Vec<u8>),
	Text(String),
}

impl Value {
	pub fn value_type(&self) -> ValueType {
		match self {
			Value::Null => ValueType::Null,
			Value::Int64(_) => ValueType::Int64,
			Value::Float64(_) => ValueType::Float64,
			Value::Bytes(_) => ValueType::Bytes,
			Value::Text(_) => ValueType::Text,
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// Canonical JSON representation used for change-log row keys and
	/// for stringifying JSON/array upstream values. Object keys are
	/// preserved in encounter order here; callers that need the
	/// normalized-by-column-name ordering (change-log row keys) build
	/// that ordering themselves before calling this.
	pub fn to_json(&self) -> serde_json::Value {
		match self {
			Value::Null => serde_json::Value::Null,
			Value::Int64(v) => serde_json::Value::from(*v),
			Value::Float64(v) => serde_json::Number::from_f64(*v)
				.map(serde_json::Value::Number)
				.unwrap_or(serde_json::Value::Null),
			Value::Bytes(v) => serde_json::Value::String(hex_encode(v)),
			Value::Text(v) => serde_json::Value::String(v.clone()),
		}
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Null => f.write_str("null"),
			Value::Int64(v) => Display::fmt(v, f),
			Value::Float64(v) => Display::fmt(v, f),
			Value::Bytes(v) => f.write_str(&hex_encode(v)),
			Value::Text(v) => f.write_str(v),
		}
	}
}

fn hex_encode(bytes: &[u8]) -> String {
	bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
