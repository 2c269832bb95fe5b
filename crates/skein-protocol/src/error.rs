// Copyright (C) 2025 Skein Data OÜ
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Protocol usage errors.
//!
//! These indicate a bug in the communicator or transport, not a transient
//! condition: callers should fail fast rather than retry. Each variant maps
//! to a stable error code for transports that report codes on the wire.

use thiserror::Error;

use crate::ids::{ContainerId, TaskAttemptId};

/// Errors returned by [`TaskCommContext`](crate::TaskCommContext) operations.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The referenced attempt was never registered with the master.
    #[error("unknown task attempt '{attempt_id}'")]
    UnknownAttempt {
        /// The attempt id that was not found.
        attempt_id: TaskAttemptId,
    },

    /// The referenced attempt already reached a terminal state.
    #[error("task attempt '{attempt_id}' is already terminal ({state})")]
    AttemptTerminal {
        /// The attempt id.
        attempt_id: TaskAttemptId,
        /// The terminal state the attempt is in.
        state: &'static str,
    },

    /// The attempt was already reported as started.
    #[error("task attempt '{attempt_id}' was already started")]
    AlreadyStarted {
        /// The attempt id.
        attempt_id: TaskAttemptId,
    },

    /// The referenced container was never registered with the master.
    #[error("unknown container '{container_id}'")]
    UnknownContainer {
        /// The container id that was not found.
        container_id: ContainerId,
    },

    /// The heartbeat named a container other than the one the attempt was
    /// started in.
    #[error("task attempt '{attempt_id}' is not executing in container '{container_id}'")]
    ContainerMismatch {
        /// The attempt id.
        attempt_id: TaskAttemptId,
        /// The container the heartbeat claimed.
        container_id: ContainerId,
    },

    /// The referenced vertex does not exist in the executing dag.
    #[error("unknown vertex '{vertex_name}'")]
    UnknownVertex {
        /// The vertex name that was not found.
        vertex_name: String,
    },

    /// A vertex-state subscription already exists for this vertex name.
    /// Registration is once-per-vertex; the first subscription is unaffected.
    #[error("vertex state updates already registered for vertex '{vertex_name}'")]
    DuplicateSubscription {
        /// The vertex name registered twice.
        vertex_name: String,
    },

    /// Routing a synthesized lifecycle event failed. Carries the failure
    /// from the master's event router, typically a durable-write error the
    /// caller should treat as job-fatal.
    #[error("failed to route '{event_type}' event: {details}")]
    History {
        /// Type of the event that failed to route.
        event_type: String,
        /// Error details.
        details: String,
    },
}

impl ProtocolError {
    /// Stable error code string for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownAttempt { .. } => "UNKNOWN_ATTEMPT",
            Self::AttemptTerminal { .. } => "ATTEMPT_TERMINAL",
            Self::AlreadyStarted { .. } => "ALREADY_STARTED",
            Self::UnknownContainer { .. } => "UNKNOWN_CONTAINER",
            Self::ContainerMismatch { .. } => "CONTAINER_MISMATCH",
            Self::UnknownVertex { .. } => "UNKNOWN_VERTEX",
            Self::DuplicateSubscription { .. } => "DUPLICATE_SUBSCRIPTION",
            Self::History { .. } => "HISTORY_ROUTING_FAILED",
        }
    }
}
