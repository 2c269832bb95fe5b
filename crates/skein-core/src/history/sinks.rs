// Copyright (C) 2025 Skein Data OÜ
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sink contracts for the history pipeline.
//!
//! The router owns no durable state; persistence lives behind these traits.

use async_trait::async_trait;
use thiserror::Error;

use super::events::HistoryEvent;

/// Errors reported by history sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    /// An I/O error while writing the event.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A storage-layer failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// The sink was shut down and accepts no further events.
    #[error("sink closed")]
    Closed,
}

/// Durable, ordered append of recovery-critical events.
///
/// `handle` must not return `Ok` until the event is persisted; that return
/// is the durability boundary recovery correctness rests on. The router
/// delivers events for one dag in the order their producing calls completed.
#[async_trait]
pub trait RecoverySink: Send + Sync {
    /// Persist one recovery-critical event.
    async fn handle(&self, event: &HistoryEvent) -> Result<(), SinkError>;
}

/// Best-effort append of policy-filtered events for operational visibility.
///
/// Errors are recorded and swallowed by the router; an implementation may
/// drop events under pressure without affecting job progress.
#[async_trait]
pub trait LoggingSink: Send + Sync {
    /// Append one event.
    async fn handle(&self, event: &HistoryEvent) -> Result<(), SinkError>;
}
