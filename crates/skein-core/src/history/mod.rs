// Copyright (C) 2025 Skein Data OÜ
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Execution-history pipeline: events, verbosity policy, router, and sinks.
//!
//! Every lifecycle event of a running job passes through
//! [`HistoryEventHandler::handle`], the single chokepoint that decides
//! whether the event must be persisted synchronously for crash recovery and
//! whether it passes the job's verbosity threshold for best-effort logging.

pub mod events;
pub mod handler;
pub mod sinks;

pub use events::{
    AttemptTerminalState, DagState, HistoryEvent, HistoryEventKind, HistoryLogLevel,
};
pub use handler::HistoryEventHandler;
pub use sinks::{LoggingSink, RecoverySink, SinkError};
