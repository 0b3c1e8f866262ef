// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use repl_type::ValueType;
use serde::{Deserialize, Serialize};

/// Replica identity as reported by the upstream relation message. Mirrors
/// Postgres's `REPLICA IDENTITY` setting: it governs which columns the
/// upstream includes on an `update`/`delete` message and, transitively,
/// which columns this core treats as the row key (see `keyColumns` below).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaIdentity {
	Default,
	Full,
	Nothing,
}

/// A single upstream relation as announced on a relation message.
///
/// `key_columns` may be empty — such relations are replicated but the row
/// key is derived from the Table Spec Cache's primary key instead (see
/// [`crate::row_key`]).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Relation {
	pub schema: String,
	pub name: String,
	pub key_columns: Vec<String>,
	pub replica_identity: ReplicaIdentity,
}

impl Relation {
	pub fn new(
		schema: impl Into<String>,
		name: impl Into<String>,
		key_columns: Vec<String>,
		replica_identity: ReplicaIdentity,
	) -> Self {
		Self { schema: schema.into(), name: name.into(), key_columns, replica_identity }
	}
}

/// An upstream column specification as carried on a relation or DDL message.
///
/// `data_type` carries `|`-separated attributes appended to the base type
/// name — currently `NOT_NULL` and `TEXT_ENUM`. [`ColumnSpec::base_type`]
/// strips them for value-type mapping; the full string is retained verbatim
/// for storage round-trip (DDL replay, diagnostics).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
	pub position: u32,
	pub data_type: String,
	pub nullable: bool,
	pub default: Option<String>,
	pub is_enum: bool,
	pub is_array: bool,
}

impl ColumnSpec {
	/// The upstream type name with its `|`-separated attributes stripped.
	pub fn base_type(&self) -> &str {
		self.data_type.split('|').next().unwrap_or(&self.data_type)
	}

	pub fn has_attribute(&self, attribute: &str) -> bool {
		self.data_type.split('|').skip(1).any(|a| a == attribute)
	}

	/// Maps the upstream base type to this core's scalar value type. Types
	/// this core does not recognize map to `Text`, matching the "retain the
	/// full string" round-trip guarantee: an unsupported type is stored
	/// verbatim rather than rejected.
	pub fn value_type(&self) -> ValueType {
		match self.base_type() {
			"int2" | "int4" | "int8" | "integer" | "bigint" | "smallint" => ValueType::Int64,
			"float4" | "float8" | "real" | "double precision" | "numeric" | "decimal" => ValueType::Float64,
			"bytea" => ValueType::Bytes,
			_ => ValueType::Text,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn base_type_strips_attributes() {
		let col = ColumnSpec {
			position: 0,
			data_type: "varchar|NOT_NULL|TEXT_ENUM".to_string(),
			nullable: false,
			default: None,
			is_enum: true,
			is_array: false,
		};
		assert_eq!(col.base_type(), "varchar");
		assert!(col.has_attribute("NOT_NULL"));
		assert!(col.has_attribute("TEXT_ENUM"));
		assert!(!col.has_attribute("ARRAY"));
	}

	#[test]
	fn maps_known_upstream_types() {
		let col = ColumnSpec {
			position: 0,
			data_type: "int8".to_string(),
			nullable: true,
			default: None,
			is_enum: false,
			is_array: false,
		};
		assert_eq!(col.value_type(), ValueType::Int64);
	}

	#[test]
	fn unrecognized_type_falls_back_to_text() {
		let col = ColumnSpec {
			position: 0,
			data_type: "point".to_string(),
			nullable: true,
			default: None,
			is_enum: false,
			is_array: false,
		};
		assert_eq!(col.value_type(), ValueType::Text);
	}
}
