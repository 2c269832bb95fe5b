// Copyright (C) 2025 Skein Data OÜ
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Message payloads for the task protocol.
//!
//! A heartbeat is the umbrella keep-alive call: it carries a batch of status
//! events from the attempt and requests any updates queued for it since the
//! last call. The remaining types classify attempt terminations and vertex
//! state changes.

use serde::{Deserialize, Serialize};

use crate::ids::{ContainerId, TaskAttemptId};

/// Periodic update from a running task attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskHeartbeatRequest {
    /// The attempt sending the heartbeat.
    pub attempt_id: TaskAttemptId,
    /// The container the attempt is executing in.
    pub container_id: ContainerId,
    /// Status events produced by the attempt since the last heartbeat.
    pub events: Vec<AttemptStatusEvent>,
    /// Maximum number of inbound events the attempt is willing to receive.
    /// Zero means "as many as the master allows".
    pub max_events: usize,
}

/// Response to a heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskHeartbeatResponse {
    /// Number of status events from the request that were accepted.
    /// Acknowledges consumption so the attempt can drop its send buffer.
    pub accepted_events: usize,
    /// Events queued for the attempt since its last heartbeat.
    pub events: Vec<InboundEvent>,
}

/// A status event produced by a task attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttemptStatusEvent {
    /// Progress report for the attempt's work.
    Progress {
        /// Fraction of work completed, in `[0.0, 1.0]`.
        fraction: f32,
    },
    /// Counter snapshot. The payload is opaque to the master and handed to
    /// the object model as-is.
    Counters {
        /// Counter groups and values.
        counters: serde_json::Value,
    },
}

/// An event queued by the master for delivery to an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundEvent {
    /// A vertex the attempt subscribed to changed state.
    VertexStateChanged(VertexStateUpdate),
}

/// Observable states of a vertex, from a task attempt's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexState {
    /// The vertex finished configuring its parallelism and edges.
    Configured,
    /// The vertex has running tasks.
    Running,
    /// Every task of the vertex succeeded.
    Succeeded,
    /// The vertex failed.
    Failed,
    /// The vertex was killed.
    Killed,
}

/// Notification of a vertex state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexStateUpdate {
    /// Name of the vertex that changed state.
    pub vertex_name: String,
    /// The state the vertex entered.
    pub state: VertexState,
}

/// Why a task attempt ended, as reported by the communicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskAttemptEndReason {
    /// The attempt's own code raised an error.
    ApplicationError,
    /// The framework failed the attempt (bad plan, serialization, etc.).
    FrameworkError,
    /// The master lost contact with the attempt.
    CommunicationError,
    /// The node hosting the container was lost.
    NodeFailed,
    /// The container exited or was stopped underneath the attempt.
    ContainerExited,
    /// The attempt was preempted to make room for other work.
    Preempted,
    /// None of the above.
    Other,
}

/// Classification of a reported task failure, used downstream to decide
/// whether the task is retried. The master records it and passes it on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskFailureType {
    /// The task may be retried on another attempt.
    NonFatal,
    /// Retrying cannot help; the failure fails the task outright.
    Fatal,
}
