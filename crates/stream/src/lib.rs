// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Change stream message types and the abstract Change Source Client
//! subscription interface (spec.md §4.8/§6). The core depends only on the
//! [`ChangeSource`] trait and the [`ChangeMessage`] variant; concrete
//! transports (gRPC, in-process replay) live outside this crate.

pub use message::{ChangeMessage, ColumnDdl, IndexDdl, Row, TableDdl};
pub use scripted::ScriptedSource;
pub use subscription::{AckSink, AckToken, ChangeSource, ChangeStream, SubscribeRequest, SubscriptionMode};

mod message;
mod scripted;
mod subscription;
