// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! The Change Processor state machine, the Incremental Syncer run loop and
//! the Initial Sync Driver (spec.md §4.7–§4.10). This crate is the only
//! place in the workspace where the synchronous replica/catalog/transaction
//! stack and the async change-stream stack meet.

pub use backoff::Backoff;
pub use change_processor::{ChangeProcessor, ProcessOutcome};
pub use initial_sync::InitialSyncDriver;
pub use syncer::IncrementalSyncer;

mod backoff;
mod change_processor;
mod initial_sync;
mod syncer;
