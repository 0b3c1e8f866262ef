// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

/// Quotes a single identifier for use in generated DDL/DML, doubling any
/// embedded `"`. Schema-qualified names are built by quoting each part
/// separately and joining with `.` — callers never interpolate a raw
/// `schema.table` string.
pub fn quote_ident(ident: &str) -> String {
	format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Renders a table's SQL identifier, qualifying with the schema only when
/// it is non-default, per the replica's identifier convention.
pub fn quote_table(schema: &str, name: &str) -> String {
	if schema.is_empty() || schema == "public" {
		quote_ident(name)
	} else {
		format!("{}.{}", quote_ident(schema), quote_ident(name))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn quotes_reserved_words() {
		assert_eq!(quote_ident("order"), "\"order\"");
	}

	#[test]
	fn doubles_embedded_quotes() {
		assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
	}

	#[test]
	fn qualifies_non_default_schema_only() {
		assert_eq!(quote_table("public", "issues"), "\"issues\"");
		assert_eq!(quote_table("tenant_a", "issues"), "\"tenant_a\".\"issues\"");
	}
}
