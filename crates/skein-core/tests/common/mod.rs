// Copyright (C) 2025 Skein Data OÜ
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for skein-core integration tests.
//!
//! Provides a TestContext wiring a coordinator to recording sinks and a
//! scripted dag object model.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use skein_core::config::Config;
use skein_core::history::{HistoryEvent, HistoryEventKind, HistoryLogLevel, LoggingSink, RecoverySink, SinkError};
use skein_core::model::DagModel;
use skein_core::runtime::Coordinator;
use skein_protocol::ids::{ContainerId, DagId, TaskAttemptId, TaskId};
use skein_protocol::messages::AttemptStatusEvent;

/// Initialize tracing for a test binary. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Sink recording every event it handles, with a switchable failure mode.
pub struct RecordingSink {
    events: Mutex<Vec<HistoryEvent>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    /// The recorded events, in handling order.
    pub fn events(&self) -> Vec<HistoryEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Kinds of the recorded events, in handling order.
    pub fn kinds(&self) -> Vec<HistoryEventKind> {
        self.events.lock().unwrap().iter().map(|e| e.kind()).collect()
    }

    /// Dag ids of the recorded events, in handling order.
    pub fn dag_ids(&self) -> Vec<Option<DagId>> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.dag_id().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    async fn record(&self, event: &HistoryEvent) -> Result<(), SinkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::Storage("simulated sink failure".to_string()));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[async_trait]
impl LoggingSink for RecordingSink {
    async fn handle(&self, event: &HistoryEvent) -> Result<(), SinkError> {
        self.record(event).await
    }
}

#[async_trait]
impl RecoverySink for RecordingSink {
    async fn handle(&self, event: &HistoryEvent) -> Result<(), SinkError> {
        self.record(event).await
    }
}

/// Per-vertex figures for the scripted model.
#[derive(Clone, Copy)]
pub struct VertexFigures {
    pub total: usize,
    pub completed: usize,
    pub running: usize,
}

/// Scripted dag object model.
pub struct ScriptedModel {
    app_id: String,
    dag_start: DateTime<Utc>,
    live_log_level: Mutex<Option<HistoryLogLevel>>,
    vertices: Mutex<HashMap<String, VertexFigures>>,
    inputs: Mutex<HashMap<String, Vec<String>>>,
    status_events: Mutex<Vec<(TaskAttemptId, usize)>>,
}

impl ScriptedModel {
    /// A model with vertices "Map" (4 tasks) and "Reduce" (2 tasks, fed by
    /// "Map").
    pub fn new() -> Arc<Self> {
        let vertices = HashMap::from([
            (
                "Map".to_string(),
                VertexFigures {
                    total: 4,
                    completed: 1,
                    running: 2,
                },
            ),
            (
                "Reduce".to_string(),
                VertexFigures {
                    total: 2,
                    completed: 0,
                    running: 0,
                },
            ),
        ]);
        let inputs = HashMap::from([
            ("Map".to_string(), vec![]),
            ("Reduce".to_string(), vec!["Map".to_string()]),
        ]);
        Arc::new(Self {
            app_id: "app-42".to_string(),
            dag_start: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            live_log_level: Mutex::new(None),
            vertices: Mutex::new(vertices),
            inputs: Mutex::new(inputs),
            status_events: Mutex::new(Vec::new()),
        })
    }

    /// Script the log level the live dag reports on recovery.
    pub fn set_live_log_level(&self, level: Option<HistoryLogLevel>) {
        *self.live_log_level.lock().unwrap() = level;
    }

    /// Status event batches received via heartbeats, as (attempt, count).
    pub fn received_status_events(&self) -> Vec<(TaskAttemptId, usize)> {
        self.status_events.lock().unwrap().clone()
    }
}

impl DagModel for ScriptedModel {
    fn app_identifier(&self) -> String {
        self.app_id.clone()
    }

    fn dag_start_time(&self) -> Option<DateTime<Utc>> {
        Some(self.dag_start)
    }

    fn dag_log_level(&self) -> Option<HistoryLogLevel> {
        *self.live_log_level.lock().unwrap()
    }

    fn total_task_count(&self, vertex_name: &str) -> Option<usize> {
        self.vertices.lock().unwrap().get(vertex_name).map(|v| v.total)
    }

    fn completed_task_count(&self, vertex_name: &str) -> Option<usize> {
        self.vertices
            .lock()
            .unwrap()
            .get(vertex_name)
            .map(|v| v.completed)
    }

    fn running_task_count(&self, vertex_name: &str) -> Option<usize> {
        self.vertices
            .lock()
            .unwrap()
            .get(vertex_name)
            .map(|v| v.running)
    }

    fn first_attempt_start_time(
        &self,
        vertex_name: &str,
        _task_index: u32,
    ) -> Option<DateTime<Utc>> {
        (vertex_name == "Map").then(|| self.dag_start)
    }

    fn input_vertex_names(&self, vertex_name: &str) -> Option<Vec<String>> {
        self.inputs.lock().unwrap().get(vertex_name).cloned()
    }

    fn handle_attempt_events(&self, attempt_id: &TaskAttemptId, events: &[AttemptStatusEvent]) {
        self.status_events
            .lock()
            .unwrap()
            .push((attempt_id.clone(), events.len()));
    }
}

/// A coordinator wired to recording sinks and a scripted model.
pub struct TestContext {
    pub coordinator: Coordinator,
    pub logging: Arc<RecordingSink>,
    pub recovery: Arc<RecordingSink>,
    pub model: Arc<ScriptedModel>,
}

impl TestContext {
    /// Context with recovery enabled and the given process default level.
    pub fn new(default_level: HistoryLogLevel) -> Self {
        init_tracing();
        let logging = RecordingSink::new();
        let recovery = RecordingSink::new();
        let model = ScriptedModel::new();
        let coordinator = Coordinator::builder()
            .config(Config {
                recovery_enabled: true,
                history_log_level: default_level,
                max_events_per_heartbeat: 500,
            })
            .model(model.clone())
            .logging_sink(logging.clone())
            .recovery_sink(recovery.clone())
            .build()
            .expect("coordinator builds");
        Self {
            coordinator,
            logging,
            recovery,
            model,
        }
    }

    /// Register a container and start an attempt in it.
    pub async fn start_attempt(&self, attempt_id: &TaskAttemptId, container_id: &ContainerId) {
        use skein_protocol::TaskCommContext;
        self.coordinator.tracker().container_launched(container_id);
        self.coordinator
            .tracker()
            .task_started_remotely(attempt_id, container_id)
            .await
            .expect("attempt starts");
    }
}

/// Dag 1 of the scripted application.
pub fn dag() -> DagId {
    DagId::new("app-42", 1)
}

/// Attempt `number` of task `index` in the "Map" vertex of [`dag`].
pub fn attempt(index: u32, number: u32) -> TaskAttemptId {
    TaskAttemptId::new(TaskId::new(dag(), "Map", index), number)
}

pub fn container(id: &str) -> ContainerId {
    ContainerId::new(id)
}
