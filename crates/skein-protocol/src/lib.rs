// Copyright (C) 2025 Skein Data OÜ
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Skein Protocol - task communication contract
//!
//! This crate defines the contract between the skein application master and
//! the pluggable communicators that carry calls from remote task attempts:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Remote Task Attempts                       │
//! │              (executing in containers)                      │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │            Communicator (transport-specific)                │
//! │        carries heartbeat / can_commit / liveness            │
//! └─────────────────────────────────────────────────────────────┘
//!                            │ calls into
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │          TaskCommContext (this crate, trait)                │
//! │     implemented by skein-core's liveness/commit tracker     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The wire transport itself is out of scope: a communicator is handed calls
//! already authenticated and deserialized, and invokes the trait directly.
//!
//! # Modules
//!
//! - [`ids`]: typed identifiers for dags, tasks, attempts, and containers
//! - [`messages`]: heartbeat request/response and status event payloads
//! - [`context`]: the [`TaskCommContext`] capability trait
//! - [`error`]: protocol usage errors with stable error codes

#![deny(missing_docs)]

/// Typed identifiers for dags, vertices, tasks, attempts, and containers.
pub mod ids;

/// Request/response and event payload types for the task protocol.
pub mod messages;

/// The capability trait a communicator calls into.
pub mod context;

/// Protocol usage errors.
pub mod error;

pub use context::TaskCommContext;
pub use error::ProtocolError;
pub use ids::{ContainerId, DagId, TaskAttemptId, TaskId};
pub use messages::{
    AttemptStatusEvent, InboundEvent, TaskAttemptEndReason, TaskFailureType, TaskHeartbeatRequest,
    TaskHeartbeatResponse, VertexState, VertexStateUpdate,
};
