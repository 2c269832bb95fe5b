// Copyright (C) 2025 Skein Data OÜ
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The dag/vertex/task object-model seam.
//!
//! The coordination fabric queries the engine's object model; it never owns
//! it. All methods are synchronous pure lookups, callable from any thread,
//! and must not block on anything the fabric itself does.

use chrono::{DateTime, Utc};

use skein_protocol::ids::TaskAttemptId;
use skein_protocol::messages::AttemptStatusEvent;

use crate::history::HistoryLogLevel;

/// Read-only view of the executing dag, plus delivery of attempt status
/// events into the engine.
///
/// Count and name queries return `None` for a vertex unknown to the
/// executing dag; the tracker turns that into a protocol usage error.
pub trait DagModel: Send + Sync {
    /// Identifier of the executing application context.
    fn app_identifier(&self) -> String;

    /// When the currently executing dag started, if one is executing.
    fn dag_start_time(&self) -> Option<DateTime<Utc>>;

    /// Verbosity override of the currently executing dag's live
    /// configuration, if one is executing and it carries an override.
    ///
    /// Consulted on the recovery path: a recovered dag's level is
    /// reconstructed from live state, not from the recovery event payload.
    fn dag_log_level(&self) -> Option<HistoryLogLevel>;

    /// Total number of tasks in the named vertex.
    fn total_task_count(&self, vertex_name: &str) -> Option<usize>;

    /// Number of completed tasks in the named vertex.
    fn completed_task_count(&self, vertex_name: &str) -> Option<usize>;

    /// Number of running tasks in the named vertex.
    fn running_task_count(&self, vertex_name: &str) -> Option<usize>;

    /// Start time of the first attempt of the given task; `None` when no
    /// attempt has started.
    fn first_attempt_start_time(
        &self,
        vertex_name: &str,
        task_index: u32,
    ) -> Option<DateTime<Utc>>;

    /// Names of the input vertices of the named vertex, root inputs
    /// excluded.
    fn input_vertex_names(&self, vertex_name: &str) -> Option<Vec<String>>;

    /// Hand a batch of status events from a task attempt to the engine.
    /// Fire-and-forget; the heartbeat acknowledges acceptance by count.
    fn handle_attempt_events(&self, attempt_id: &TaskAttemptId, events: &[AttemptStatusEvent]);
}
