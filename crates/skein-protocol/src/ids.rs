// Copyright (C) 2025 Skein Data OÜ
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typed identifiers used across the task protocol.
//!
//! Identity is structural: an attempt is addressed by
//! (dag, vertex, task index, attempt number). Display forms are stable and
//! used in logs and error messages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for one dag (one full execution unit) within an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DagId {
    /// The owning application's identifier.
    pub app_id: String,
    /// Sequence number of the dag within the application.
    pub id: u32,
}

impl DagId {
    /// Create a dag id from an application identifier and sequence number.
    pub fn new(app_id: impl Into<String>, id: u32) -> Self {
        Self {
            app_id: app_id.into(),
            id,
        }
    }
}

impl fmt::Display for DagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dag_{}_{}", self.app_id, self.id)
    }
}

/// Identifier for one task: a (dag, vertex, index) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId {
    /// The dag this task belongs to.
    pub dag: DagId,
    /// Name of the vertex (stage) containing the task.
    pub vertex: String,
    /// Index of the task within its vertex.
    pub index: u32,
}

impl TaskId {
    /// Create a task id.
    pub fn new(dag: DagId, vertex: impl Into<String>, index: u32) -> Self {
        Self {
            dag,
            vertex: vertex.into(),
            index,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task_{}_{}_{}", self.dag, self.vertex, self.index)
    }
}

/// Identifier for one execution instance of a task.
///
/// A task may have several attempts due to retry or speculation; attempts of
/// the same task share the [`TaskId`] and differ in attempt number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskAttemptId {
    /// The task this is an attempt of.
    pub task: TaskId,
    /// Attempt number, starting at 0.
    pub attempt: u32,
}

impl TaskAttemptId {
    /// Create an attempt id.
    pub fn new(task: TaskId, attempt: u32) -> Self {
        Self { task, attempt }
    }

    /// The dag this attempt belongs to.
    pub fn dag(&self) -> &DagId {
        &self.task.dag
    }

    /// The vertex name this attempt belongs to.
    pub fn vertex(&self) -> &str {
        &self.task.vertex
    }
}

impl fmt::Display for TaskAttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt_{}_{}", self.task, self.attempt)
    }
}

/// Opaque identifier for a container executing task attempts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub String);

impl ContainerId {
    /// Create a container id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
