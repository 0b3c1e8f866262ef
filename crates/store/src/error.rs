// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use repl_type::Error;

/// Classifies a `rusqlite::Error` into the core's error taxonomy. Lock
/// contention is `Transient` (retried once by the caller); anything else
/// raised while applying DML/DDL is `Schema` (the producer and the replica
/// have drifted); errors opening or checkpointing the file itself are
/// `Unrecoverable`.
pub fn classify(err: rusqlite::Error) -> Error {
	use rusqlite::ErrorCode;

	if let rusqlite::Error::SqliteFailure(sqlite_err, _) = &err {
		if matches!(sqlite_err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) {
			return Error::transient("SQLITE_BUSY", err.to_string());
		}
	}
	Error::schema("SQLITE_ERROR", err.to_string())
}

pub fn classify_unrecoverable(err: rusqlite::Error) -> Error {
	Error::unrecoverable("SQLITE_IO_ERROR", err.to_string())
}
