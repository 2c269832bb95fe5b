// Copyright (C) 2025 Skein Data OÜ
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lifecycle events and the verbosity level lattice.
//!
//! Each event kind carries two fixed classifications: a severity (the
//! verbosity level at which it becomes visible to the logging sink) and a
//! recovery-critical flag. Critical kinds are exactly the submission,
//! completion, and commit-affecting kinds; losing one of those would make an
//! in-flight job unrecoverable after a master crash.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use skein_protocol::ids::{ContainerId, DagId, TaskAttemptId};
use skein_protocol::messages::{TaskAttemptEndReason, TaskFailureType};

/// Ordered verbosity threshold for the logging path.
///
/// An event passes a threshold when its severity is at or below the
/// threshold: `None` logs nothing, `All` logs everything. A job's effective
/// threshold is the process-wide default unless its submission carried an
/// override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HistoryLogLevel {
    /// Log nothing.
    None,
    /// Application-level events only.
    Am,
    /// Dag submission/completion/commit events.
    Dag,
    /// Task-attempt lifecycle events.
    Task,
    /// Everything.
    All,
}

impl HistoryLogLevel {
    /// Whether an event of the given severity passes this threshold.
    pub fn should_log(self, event_level: HistoryLogLevel) -> bool {
        self >= event_level && self != HistoryLogLevel::None
    }
}

impl fmt::Display for HistoryLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Am => "am",
            Self::Dag => "dag",
            Self::Task => "task",
            Self::All => "all",
        };
        f.write_str(s)
    }
}

impl FromStr for HistoryLogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "am" => Ok(Self::Am),
            "dag" => Ok(Self::Dag),
            "task" => Ok(Self::Task),
            "all" => Ok(Self::All),
            other => Err(format!("unknown history log level '{}'", other)),
        }
    }
}

/// Terminal state of a finished dag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DagState {
    /// Every vertex committed successfully.
    Succeeded,
    /// The dag failed.
    Failed,
    /// The dag was killed on request.
    Killed,
    /// The dag ended due to an internal error.
    Error,
}

/// Terminal state of a finished task attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptTerminalState {
    /// The attempt completed its work.
    Succeeded,
    /// The attempt failed.
    Failed,
    /// The attempt was killed.
    Killed,
}

/// Discriminant of a [`HistoryEvent`], with its fixed classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryEventKind {
    /// The application master came up.
    AppLaunched,
    /// A dag was submitted for execution.
    DagSubmitted,
    /// A dag was reconstructed from the recovery log after a master restart.
    DagRecovered,
    /// A dag reached a terminal state.
    DagFinished,
    /// The dag-level output commit began.
    DagCommitStarted,
    /// A vertex-level output commit began.
    VertexCommitStarted,
    /// A task attempt started executing remotely.
    TaskAttemptStarted,
    /// A task attempt reached a terminal state.
    TaskAttemptFinished,
}

impl HistoryEventKind {
    /// Whether events of this kind must be persisted synchronously before
    /// the job may proceed. Exactly the submission, completion, and
    /// commit-affecting kinds.
    pub fn is_recovery_critical(self) -> bool {
        matches!(
            self,
            Self::DagSubmitted | Self::DagFinished | Self::DagCommitStarted | Self::VertexCommitStarted
        )
    }

    /// The verbosity level at which events of this kind become visible.
    pub fn severity(self) -> HistoryLogLevel {
        match self {
            Self::AppLaunched => HistoryLogLevel::Am,
            Self::DagSubmitted
            | Self::DagRecovered
            | Self::DagFinished
            | Self::DagCommitStarted
            | Self::VertexCommitStarted => HistoryLogLevel::Dag,
            Self::TaskAttemptStarted | Self::TaskAttemptFinished => HistoryLogLevel::Task,
        }
    }
}

impl fmt::Display for HistoryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AppLaunched => "app_launched",
            Self::DagSubmitted => "dag_submitted",
            Self::DagRecovered => "dag_recovered",
            Self::DagFinished => "dag_finished",
            Self::DagCommitStarted => "dag_commit_started",
            Self::VertexCommitStarted => "vertex_commit_started",
            Self::TaskAttemptStarted => "task_attempt_started",
            Self::TaskAttemptFinished => "task_attempt_finished",
        };
        f.write_str(s)
    }
}

/// A lifecycle event of a running job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HistoryEvent {
    /// The application master came up. Job-independent.
    AppLaunched {
        /// Identifier of the application.
        app_id: String,
        /// When the master came up.
        launch_time: DateTime<Utc>,
    },
    /// A dag was submitted for execution.
    DagSubmitted {
        /// The submitted dag.
        dag_id: DagId,
        /// When the submission was accepted.
        submit_time: DateTime<Utc>,
        /// Per-job verbosity override carried by the submission
        /// configuration, if any.
        log_level: Option<HistoryLogLevel>,
    },
    /// A dag was reconstructed from the recovery log after a master restart.
    DagRecovered {
        /// The recovered dag.
        dag_id: DagId,
        /// When recovery completed.
        recover_time: DateTime<Utc>,
    },
    /// A dag reached a terminal state.
    DagFinished {
        /// The finished dag.
        dag_id: DagId,
        /// When the dag finished.
        finish_time: DateTime<Utc>,
        /// Terminal state.
        state: DagState,
        /// Diagnostics, if any.
        diagnostics: Option<String>,
    },
    /// The dag-level output commit began.
    DagCommitStarted {
        /// The committing dag.
        dag_id: DagId,
        /// When the commit began.
        commit_time: DateTime<Utc>,
    },
    /// A vertex-level output commit began.
    VertexCommitStarted {
        /// The dag owning the vertex.
        dag_id: DagId,
        /// The committing vertex.
        vertex_name: String,
        /// When the commit began.
        commit_time: DateTime<Utc>,
    },
    /// A task attempt started executing remotely.
    TaskAttemptStarted {
        /// The started attempt.
        attempt_id: TaskAttemptId,
        /// The container it is executing in.
        container_id: ContainerId,
        /// When the attempt started.
        start_time: DateTime<Utc>,
    },
    /// A task attempt reached a terminal state.
    TaskAttemptFinished {
        /// The finished attempt.
        attempt_id: TaskAttemptId,
        /// Terminal state.
        state: AttemptTerminalState,
        /// Why the attempt ended, as reported by the communicator.
        end_reason: Option<TaskAttemptEndReason>,
        /// Failure classification for the retry decision, on failures.
        failure_type: Option<TaskFailureType>,
        /// Diagnostics, if any.
        diagnostics: Option<String>,
        /// When the attempt finished.
        finish_time: DateTime<Utc>,
    },
}

impl HistoryEvent {
    /// The kind of this event.
    pub fn kind(&self) -> HistoryEventKind {
        match self {
            Self::AppLaunched { .. } => HistoryEventKind::AppLaunched,
            Self::DagSubmitted { .. } => HistoryEventKind::DagSubmitted,
            Self::DagRecovered { .. } => HistoryEventKind::DagRecovered,
            Self::DagFinished { .. } => HistoryEventKind::DagFinished,
            Self::DagCommitStarted { .. } => HistoryEventKind::DagCommitStarted,
            Self::VertexCommitStarted { .. } => HistoryEventKind::VertexCommitStarted,
            Self::TaskAttemptStarted { .. } => HistoryEventKind::TaskAttemptStarted,
            Self::TaskAttemptFinished { .. } => HistoryEventKind::TaskAttemptFinished,
        }
    }

    /// The dag this event belongs to; `None` for job-independent events.
    pub fn dag_id(&self) -> Option<&DagId> {
        match self {
            Self::AppLaunched { .. } => None,
            Self::DagSubmitted { dag_id, .. }
            | Self::DagRecovered { dag_id, .. }
            | Self::DagFinished { dag_id, .. }
            | Self::DagCommitStarted { dag_id, .. }
            | Self::VertexCommitStarted { dag_id, .. } => Some(dag_id),
            Self::TaskAttemptStarted { attempt_id, .. }
            | Self::TaskAttemptFinished { attempt_id, .. } => Some(attempt_id.dag()),
        }
    }

    /// The verbosity level at which this event becomes visible.
    pub fn severity(&self) -> HistoryLogLevel {
        self.kind().severity()
    }

    /// Whether this event must be persisted synchronously for recovery.
    pub fn is_recovery_critical(&self) -> bool {
        self.kind().is_recovery_critical()
    }
}
