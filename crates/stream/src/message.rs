// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::collections::BTreeMap;

use repl_catalog::{ColumnSpec, Relation, RowKey};
use repl_type::{Value, Watermark};

/// A full row as carried on an `insert`/`update` message: column name to
/// scalar value.
pub type Row = BTreeMap<String, Value>;

/// A named column definition as carried on a DDL message.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDdl {
	pub name: String,
	pub spec: ColumnSpec,
}

/// The column list for a `create-table` message.
#[derive(Clone, Debug, PartialEq)]
pub struct TableDdl {
	pub table: String,
	pub columns: Vec<ColumnDdl>,
}

/// An index definition for a `create-index` message.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexDdl {
	pub table: String,
	pub name: String,
	pub columns: Vec<String>,
	pub unique: bool,
}

/// The change stream's tagged message variant, as described in spec.md §6.
/// `control` and `status` carry opaque payloads ignored by the core; every
/// other tag drives the Change Processor's state machine or the
/// Transaction Processor's row/DDL operations.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeMessage {
	Begin { commit_watermark: Watermark },
	Commit { watermark: Watermark },
	Rollback,

	Insert { relation: Relation, new: Row },
	Update { relation: Relation, new: Row, key: Option<RowKey> },
	Delete { relation: Relation, key: RowKey },
	Truncate { relations: Vec<Relation> },

	CreateTable { spec: TableDdl },
	RenameTable { old: String, new: String },
	AddColumn { table: String, column: ColumnDdl },
	UpdateColumn { table: String, old: ColumnDdl, new: ColumnDdl },
	DropColumn { table: String, column: String },
	/// `id` is the producer's opaque table identifier, already resolved
	/// to this core's table key (`schema.name`, or bare `name` for the
	/// default schema) — the core does not maintain its own id-to-name
	/// mapping.
	DropTable { id: String },
	CreateIndex { spec: IndexDdl },
	/// `table` is included alongside the opaque index id because
	/// dropping an index emits a reset for its *owning* table (spec.md
	/// §4.6), which the id alone does not carry.
	DropIndex { table: String, id: String },

	Control(serde_json::Value),
	Status(serde_json::Value),

	/// Fatal: carries the cause reported by the upstream producer.
	Error { cause: String },
}

impl ChangeMessage {
	/// `control`/`status` are accepted in any Change Processor state and
	/// never touch the Transaction Processor.
	pub fn is_out_of_band(&self) -> bool {
		matches!(self, ChangeMessage::Control(_) | ChangeMessage::Status(_))
	}
}
