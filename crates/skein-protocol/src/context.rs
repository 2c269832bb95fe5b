// Copyright (C) 2025 Skein Data OÜ
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The capability trait a task communicator calls into.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ProtocolError;
use crate::ids::{ContainerId, TaskAttemptId};
use crate::messages::{
    TaskAttemptEndReason, TaskFailureType, TaskHeartbeatRequest, TaskHeartbeatResponse, VertexState,
};

/// The operation set a task-attempt-facing communication channel calls into
/// the application master.
///
/// Implemented once by the master's liveness/commit tracker; communicators
/// depend only on this trait, so deployment-specific transports (and test
/// doubles) plug in without touching the master's internals.
///
/// # Locking precondition
///
/// Do not invoke these operations while holding a lock that anything the
/// master may call back into could need. Write operations synchronize on
/// per-dag and per-attempt state internally; operations for different dags
/// never block each other.
///
/// Read-only queries are synchronous, safe from any thread at any time, and
/// never wait on the master's event routing or durable writers.
#[async_trait]
pub trait TaskCommContext: Send + Sync {
    /// Umbrella keep-alive call, invoked periodically by every live attempt.
    ///
    /// Accepts a batch of status events from the attempt and returns events
    /// queued for it (vertex-state changes) since the last heartbeat. Any
    /// successful call updates the attempt's (and its container's) liveness
    /// timestamp as a side effect.
    ///
    /// # Errors
    ///
    /// Fails with a protocol error if the attempt is unknown, already
    /// terminal, or reports a container other than the one it started in.
    async fn heartbeat(
        &self,
        request: TaskHeartbeatRequest,
    ) -> Result<TaskHeartbeatResponse, ProtocolError>;

    /// Lightweight liveness ping for an attempt; updates the timestamp only.
    ///
    /// Racing with a concurrent [`heartbeat`](Self::heartbeat) is not an
    /// error; the timestamp is last-writer-wins.
    async fn task_alive(&self, attempt_id: &TaskAttemptId) -> Result<(), ProtocolError>;

    /// Lightweight liveness ping for a container; updates the timestamp only.
    async fn container_alive(&self, container_id: &ContainerId) -> Result<(), ProtocolError>;

    /// Commit leader election among attempts of one task.
    ///
    /// Exactly one attempt of a given task ever observes `true`; every other
    /// attempt (and every repeat call) observes the previously decided
    /// outcome. A granted permission is never revoked by this call.
    async fn can_commit(&self, attempt_id: &TaskAttemptId) -> Result<bool, ProtocolError>;

    /// Report that the attempt has started executing in `container_id`.
    async fn task_started_remotely(
        &self,
        attempt_id: &TaskAttemptId,
        container_id: &ContainerId,
    ) -> Result<(), ProtocolError>;

    /// Report that the attempt was killed.
    async fn task_killed(
        &self,
        attempt_id: &TaskAttemptId,
        end_reason: TaskAttemptEndReason,
        diagnostics: Option<&str>,
    ) -> Result<(), ProtocolError>;

    /// Report that the attempt failed.
    ///
    /// The failure type is recorded and forwarded to the retry decision
    /// outside the master's coordination core; it is not interpreted here.
    async fn task_failed(
        &self,
        attempt_id: &TaskAttemptId,
        failure_type: TaskFailureType,
        end_reason: TaskAttemptEndReason,
        diagnostics: Option<&str>,
    ) -> Result<(), ProtocolError>;

    /// Subscribe to state changes of the named vertex.
    ///
    /// May be invoked at most once per vertex name; a second registration is
    /// a usage error and leaves the first subscription untouched. An empty
    /// or absent state set means "notify on every state".
    fn register_for_vertex_state_updates(
        &self,
        vertex_name: &str,
        states: Option<HashSet<VertexState>>,
    ) -> Result<(), ProtocolError>;

    /// Whether the container is known to the master; its state is irrelevant.
    fn is_known_container(&self, container_id: &ContainerId) -> bool;

    /// Total number of tasks in the named vertex.
    fn vertex_total_task_count(&self, vertex_name: &str) -> Result<usize, ProtocolError>;

    /// Number of completed tasks in the named vertex.
    fn vertex_completed_task_count(&self, vertex_name: &str) -> Result<usize, ProtocolError>;

    /// Number of running tasks in the named vertex.
    fn vertex_running_task_count(&self, vertex_name: &str) -> Result<usize, ProtocolError>;

    /// Start time of the first attempt of the given task, if it started.
    fn first_attempt_start_time(
        &self,
        vertex_name: &str,
        task_index: u32,
    ) -> Result<Option<DateTime<Utc>>, ProtocolError>;

    /// Start time of the currently executing dag.
    fn dag_start_time(&self) -> Option<DateTime<Utc>>;

    /// Identifier of the executing application context.
    fn current_app_identifier(&self) -> String;

    /// Names of the input vertices of the named vertex. Root inputs are not
    /// included.
    fn input_vertex_names(&self, vertex_name: &str) -> Result<Vec<String>, ProtocolError>;
}
