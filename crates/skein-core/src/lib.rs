// Copyright (C) 2025 Skein Data OÜ
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Skein Core - application-master coordination fabric
//!
//! This crate is the master-side coordination fabric of the skein DAG
//! execution engine. It tracks the liveness of remotely executing task
//! attempts, arbitrates which attempt of a task may commit its output, and
//! routes execution-history events so that an in-flight job can be
//! reconstructed after a master crash.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Remote Task Attempts                           │
//! │               (one per container, on own timers)                    │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼ heartbeat / can_commit / alive
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                TaskCommContext (skein-protocol)                     │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     TaskTracker (this crate)                        │
//! │     liveness timestamps · commit grants · vertex subscriptions      │
//! └──────────────┬──────────────────────────────────────┬───────────────┘
//!                │ lifecycle events                     │ queries
//!                ▼                                      ▼
//! ┌───────────────────────────┐            ┌───────────────────────────┐
//! │   HistoryEventHandler     │            │    DagModel (external)    │
//! │  verbosity policy + table │            │  dag/vertex/task lookups  │
//! └──────┬─────────────┬──────┘            └───────────────────────────┘
//!        │ critical    │ filtered
//!        ▼             ▼
//! ┌─────────────┐ ┌─────────────┐
//! │ RecoverySink│ │ LoggingSink │
//! │  (durable)  │ │(best-effort)│
//! └─────────────┘ └─────────────┘
//! ```
//!
//! # Routing guarantees
//!
//! Recovery-critical events (dag submission, completion, and commit-affecting
//! events) are written to the recovery sink synchronously, in per-dag order,
//! before the routing call returns. A recovery write failure is sticky and
//! surfaced via [`HistoryEventHandler::has_recovery_failed`] for a supervisor
//! to act on; it never clears. All other events are filtered by the per-dag
//! verbosity policy and appended to the logging sink best-effort.
//!
//! # Commit leader election
//!
//! `can_commit` grants commit permission to exactly one attempt per task for
//! the task's lifetime. Concurrent calls from competing attempts are
//! arbitrated once; every later call returns the recorded decision. The grant
//! is released only when the granted attempt leaves `Committing` via
//! `task_killed` or `task_failed`, allowing a retry to be elected.
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `SKEIN_RECOVERY_ENABLED` | No | `true` | Gate synchronous recovery writes |
//! | `SKEIN_HISTORY_LOG_LEVEL` | No | `all` | Process-wide verbosity threshold |
//! | `SKEIN_MAX_EVENTS_PER_HEARTBEAT` | No | `500` | Cap on inbound events per heartbeat |
//!
//! # Modules
//!
//! - [`config`]: process-wide configuration from environment variables
//! - [`error`]: core error types with stable error codes
//! - [`history`]: lifecycle events, verbosity policy, event router, sinks
//! - [`model`]: the read-only dag/vertex/task object-model seam
//! - [`tracker`]: task liveness, commit arbitration, vertex subscriptions
//! - [`runtime`]: builder for embedding the fabric into a host application

#![deny(missing_docs)]

/// Process-wide configuration loaded from environment variables.
pub mod config;

/// Error types for coordination operations.
pub mod error;

/// Lifecycle-event model, verbosity policy, event router, and sink contracts.
pub mod history;

/// Read-only object-model queries consumed by the tracker.
pub mod model;

/// Task liveness, commit arbitration, and vertex-state subscriptions.
pub mod tracker;

/// Embeddable runtime wiring config, sinks, and model into the fabric.
pub mod runtime;

mod sync_util;
