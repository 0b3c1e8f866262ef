// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::collections::BTreeMap;

use repl_type::Value;

use crate::relation::{Relation, ReplicaIdentity};
use crate::table_spec::TableSpec;

/// A row's identifying key columns, normalized for change-log storage: a
/// `BTreeMap` sorts by column name automatically, giving the same
/// stringification regardless of the order the producer supplied the
/// columns in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowKey(BTreeMap<String, Value>);

impl RowKey {
	pub fn from_columns(columns: impl IntoIterator<Item = (String, Value)>) -> Self {
		Self(columns.into_iter().collect())
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn column_names(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}

	pub fn get(&self, column: &str) -> Option<&Value> {
		self.0.get(column)
	}

	/// Canonical JSON-object stringification used as the change log's
	/// `row_key` column. Key order follows the `BTreeMap`'s lexicographic
	/// column-name order, so two logically-identical keys stringify
	/// identically regardless of producer column order.
	pub fn normalize(&self) -> String {
		let object: serde_json::Map<String, serde_json::Value> =
			self.0.iter().map(|(name, value)| (name.clone(), value.to_json())).collect();
		serde_json::Value::Object(object).to_string()
	}
}

/// Derives the row key for `relation` out of a full row, in priority order:
/// the relation's declared `keyColumns` when replica identity is not
/// `full`, otherwise the table's primary key from the Table Spec Cache.
/// Returns `None` when neither source yields a non-empty set — such a row
/// is replicated but not loggable.
pub fn derive_row_key(relation: &Relation, table_spec: &TableSpec, row: &BTreeMap<String, Value>) -> Option<RowKey> {
	let key_columns: &[String] = if relation.replica_identity != ReplicaIdentity::Full
		&& !relation.key_columns.is_empty()
	{
		&relation.key_columns
	} else if !table_spec.primary_key.is_empty() {
		&table_spec.primary_key
	} else {
		return None;
	};

	let mut columns = Vec::with_capacity(key_columns.len());
	for name in key_columns {
		let value = row.get(name)?.clone();
		columns.push((name.clone(), value));
	}
	Some(RowKey::from_columns(columns))
}
