// Copyright (C) 2025 Skein Data OÜ
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Task liveness and commit tracking.
//!
//! `TaskTracker` is the state behind the task communication protocol: one
//! entry per registered task attempt (liveness timestamp, lifecycle state,
//! inbound event queue), one timestamp per known container, the per-task
//! commit grants, and the vertex-state subscription registry. Protocol
//! operations mutate this state and, where the lifecycle advances, hand a
//! synthesized history event to the router.
//!
//! State is sharded per attempt and per container; operations on unrelated
//! attempts never contend. Read-only queries go straight to the dag object
//! model and never touch the router or the sinks.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use skein_protocol::context::TaskCommContext;
use skein_protocol::error::ProtocolError;
use skein_protocol::ids::{ContainerId, DagId, TaskAttemptId, TaskId};
use skein_protocol::messages::{
    InboundEvent, TaskAttemptEndReason, TaskFailureType, TaskHeartbeatRequest,
    TaskHeartbeatResponse, VertexState, VertexStateUpdate,
};

use crate::error::CoreError;
use crate::history::{AttemptTerminalState, HistoryEvent, HistoryEventHandler};
use crate::model::DagModel;
use crate::sync_util::{lock, read, write};

/// Lifecycle state of a registered attempt. Unregistered attempts are
/// implicitly unstarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptState {
    Running,
    Committing,
    Succeeded,
    Failed,
    Killed,
}

impl AttemptState {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Killed)
    }

    fn name(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Committing => "committing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Killed => "killed",
        }
    }
}

/// Per-attempt state. Locked individually; never held across an await.
struct AttemptEntry {
    state: AttemptState,
    container_id: ContainerId,
    last_alive: DateTime<Utc>,
    inbox: VecDeque<InboundEvent>,
}

/// A vertex-state subscription. An empty filter matches every state.
struct VertexSubscription {
    states: HashSet<VertexState>,
}

impl VertexSubscription {
    fn matches(&self, state: VertexState) -> bool {
        self.states.is_empty() || self.states.contains(&state)
    }
}

/// The default [`TaskCommContext`] implementation.
///
/// Owns attempt and container liveness, the per-task commit grants, and the
/// vertex-state subscription registry. Lifecycle transitions synthesize
/// history events through the shared router; a router failure on a durable
/// write surfaces to the protocol caller as a `History` error.
pub struct TaskTracker {
    app_id: String,
    max_events_per_heartbeat: usize,
    history: Arc<HistoryEventHandler>,
    model: Arc<dyn DagModel>,
    attempts: RwLock<HashMap<TaskAttemptId, Arc<Mutex<AttemptEntry>>>>,
    containers: RwLock<HashMap<ContainerId, Arc<Mutex<DateTime<Utc>>>>>,
    // Task id -> the attempt holding the commit grant. Locked after the
    // attempt entry, never before.
    commits: Mutex<HashMap<TaskId, TaskAttemptId>>,
    subscriptions: Mutex<HashMap<String, VertexSubscription>>,
}

impl TaskTracker {
    /// Create a tracker bound to an event router and a dag object model.
    pub fn new(
        max_events_per_heartbeat: usize,
        history: Arc<HistoryEventHandler>,
        model: Arc<dyn DagModel>,
    ) -> Self {
        let app_id = model.app_identifier();
        info!(app_id = %app_id, max_events_per_heartbeat, "Initializing task tracker");
        Self {
            app_id,
            max_events_per_heartbeat,
            history,
            model,
            attempts: RwLock::new(HashMap::new()),
            containers: RwLock::new(HashMap::new()),
            commits: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Register a container the scheduler has launched. Idempotent; a repeat
    /// call refreshes the liveness timestamp.
    pub fn container_launched(&self, container_id: &ContainerId) {
        debug!(container = %container_id, "Container launched");
        let mut containers = write(&self.containers);
        match containers.get(container_id) {
            Some(ts) => *lock(ts) = Utc::now(),
            None => {
                containers.insert(container_id.clone(), Arc::new(Mutex::new(Utc::now())));
            }
        }
    }

    /// Drop all tracker state belonging to a finished dag.
    ///
    /// Removes the dag's attempt entries and commit grants, and every
    /// container entry that only the removed attempts referenced. Called by
    /// the engine when a dag reaches a terminal state; the router prunes its
    /// own per-dag tables on the same milestone. Without this the tracker
    /// grows without bound over a long session of sequential dags.
    pub fn dag_complete(&self, dag_id: &DagId) {
        let mut released: Vec<ContainerId> = Vec::new();
        {
            let mut attempts = write(&self.attempts);
            attempts.retain(|id, entry| {
                if id.dag() == dag_id {
                    released.push(lock(entry).container_id.clone());
                    false
                } else {
                    true
                }
            });
            let still_hosting: HashSet<ContainerId> = attempts
                .values()
                .map(|entry| lock(entry).container_id.clone())
                .collect();
            let mut containers = write(&self.containers);
            for container_id in released {
                if !still_hosting.contains(&container_id) {
                    containers.remove(&container_id);
                }
            }
        }
        lock(&self.commits).retain(|task, _| task.dag != *dag_id);
        info!(dag = %dag_id, "Dropped tracker state of finished dag");
    }

    /// Fan a vertex state change out to subscribed attempts.
    ///
    /// Delivers a [`VertexStateUpdate`] into the inbound queue of every
    /// non-terminal attempt when a subscription for the vertex exists and its
    /// state filter matches. Attempts pick the update up on their next
    /// heartbeat. Without a subscription the change is dropped.
    pub fn vertex_state_updated(&self, vertex_name: &str, state: VertexState) {
        let subscribed = {
            let subscriptions = lock(&self.subscriptions);
            subscriptions
                .get(vertex_name)
                .is_some_and(|s| s.matches(state))
        };
        if !subscribed {
            return;
        }

        debug!(vertex = vertex_name, state = ?state, "Queueing vertex state update");
        let update = InboundEvent::VertexStateChanged(VertexStateUpdate {
            vertex_name: vertex_name.to_string(),
            state,
        });
        let attempts = read(&self.attempts);
        for entry in attempts.values() {
            let mut entry = lock(entry);
            if !entry.state.is_terminal() {
                entry.inbox.push_back(update.clone());
            }
        }
    }

    /// Report that the attempt finished its work successfully.
    ///
    /// Valid from `running` or `committing`; the commit grant, if held, is
    /// consumed with the success and stays decided for the task's lifetime.
    ///
    /// # Errors
    ///
    /// Fails if the attempt is unknown or already terminal.
    #[instrument(skip(self), fields(attempt = %attempt_id))]
    pub async fn task_succeeded(&self, attempt_id: &TaskAttemptId) -> Result<(), ProtocolError> {
        // 1. Transition under the entry lock.
        let entry = self.attempt_entry(attempt_id)?;
        {
            let mut entry = lock(&entry);
            if entry.state.is_terminal() {
                return Err(ProtocolError::AttemptTerminal {
                    attempt_id: attempt_id.clone(),
                    state: entry.state.name(),
                });
            }
            entry.state = AttemptState::Succeeded;
            entry.last_alive = Utc::now();
        }

        info!("Task attempt succeeded");

        // 2. Synthesize the completion event.
        self.route(HistoryEvent::TaskAttemptFinished {
            attempt_id: attempt_id.clone(),
            state: AttemptTerminalState::Succeeded,
            end_reason: None,
            failure_type: None,
            diagnostics: None,
            finish_time: Utc::now(),
        })
        .await
    }

    /// Last observed liveness timestamp of an attempt, if it is registered.
    ///
    /// The supervisory loop compares this against its deadline to declare an
    /// attempt dead; the tracker itself never times anything out.
    pub fn last_alive(&self, attempt_id: &TaskAttemptId) -> Option<DateTime<Utc>> {
        let attempts = read(&self.attempts);
        attempts.get(attempt_id).map(|entry| lock(entry).last_alive)
    }

    /// Last observed liveness timestamp of a container, if it is registered.
    pub fn container_last_alive(&self, container_id: &ContainerId) -> Option<DateTime<Utc>> {
        let containers = read(&self.containers);
        containers.get(container_id).map(|ts| *lock(ts))
    }

    fn attempt_entry(
        &self,
        attempt_id: &TaskAttemptId,
    ) -> Result<Arc<Mutex<AttemptEntry>>, ProtocolError> {
        let attempts = read(&self.attempts);
        attempts
            .get(attempt_id)
            .cloned()
            .ok_or_else(|| ProtocolError::UnknownAttempt {
                attempt_id: attempt_id.clone(),
            })
    }

    fn touch_container(&self, container_id: &ContainerId) {
        let containers = read(&self.containers);
        if let Some(ts) = containers.get(container_id) {
            *lock(ts) = Utc::now();
        }
    }

    /// Vertex existence gate for queries and subscriptions.
    fn known_vertex(&self, vertex_name: &str) -> Result<(), ProtocolError> {
        if self.model.total_task_count(vertex_name).is_none() {
            return Err(ProtocolError::UnknownVertex {
                vertex_name: vertex_name.to_string(),
            });
        }
        Ok(())
    }

    async fn route(&self, event: HistoryEvent) -> Result<(), ProtocolError> {
        let event_type = event.kind().to_string();
        self.history
            .handle(&event)
            .await
            .map_err(|e: CoreError| ProtocolError::History {
                event_type,
                details: e.to_string(),
            })
    }

    /// Shared terminal transition for `task_killed` and `task_failed`.
    ///
    /// Moves the attempt out of any non-terminal state, releases a held
    /// commit grant so a retry can be re-arbitrated, and synthesizes the
    /// completion event.
    async fn finish_attempt(
        &self,
        attempt_id: &TaskAttemptId,
        terminal: AttemptState,
        state: AttemptTerminalState,
        end_reason: TaskAttemptEndReason,
        failure_type: Option<TaskFailureType>,
        diagnostics: Option<&str>,
    ) -> Result<(), ProtocolError> {
        // 1. Transition under the entry lock; release the grant while still
        //    holding it so a racing can_commit cannot observe a window where
        //    the grantee is terminal but the grant stands.
        let entry = self.attempt_entry(attempt_id)?;
        {
            let mut entry = lock(&entry);
            if entry.state.is_terminal() {
                return Err(ProtocolError::AttemptTerminal {
                    attempt_id: attempt_id.clone(),
                    state: entry.state.name(),
                });
            }
            entry.state = terminal;

            let mut commits = lock(&self.commits);
            if commits.get(&attempt_id.task) == Some(attempt_id) {
                debug!("Releasing commit grant of terminated attempt");
                commits.remove(&attempt_id.task);
            }
        }

        info!(state = state_name(state), reason = ?end_reason, "Task attempt finished");

        // 2. Synthesize the completion event.
        self.route(HistoryEvent::TaskAttemptFinished {
            attempt_id: attempt_id.clone(),
            state,
            end_reason: Some(end_reason),
            failure_type,
            diagnostics: diagnostics.map(str::to_string),
            finish_time: Utc::now(),
        })
        .await
    }
}

fn state_name(state: AttemptTerminalState) -> &'static str {
    match state {
        AttemptTerminalState::Succeeded => "succeeded",
        AttemptTerminalState::Failed => "failed",
        AttemptTerminalState::Killed => "killed",
    }
}

#[async_trait]
impl TaskCommContext for TaskTracker {
    #[instrument(skip(self, request), fields(attempt = %request.attempt_id))]
    async fn heartbeat(
        &self,
        request: TaskHeartbeatRequest,
    ) -> Result<TaskHeartbeatResponse, ProtocolError> {
        // 1. Update liveness and drain the inbox under the entry lock.
        let entry = self.attempt_entry(&request.attempt_id)?;
        let (events, container_id) = {
            let mut entry = lock(&entry);
            if entry.state.is_terminal() {
                return Err(ProtocolError::AttemptTerminal {
                    attempt_id: request.attempt_id.clone(),
                    state: entry.state.name(),
                });
            }
            // The attempt is bound to one container at start; a heartbeat
            // claiming another points at a confused transport.
            if request.container_id != entry.container_id {
                return Err(ProtocolError::ContainerMismatch {
                    attempt_id: request.attempt_id.clone(),
                    container_id: request.container_id.clone(),
                });
            }
            entry.last_alive = Utc::now();

            let cap = if request.max_events == 0 {
                self.max_events_per_heartbeat
            } else {
                request.max_events.min(self.max_events_per_heartbeat)
            };
            let take = entry.inbox.len().min(cap);
            let events = entry.inbox.drain(..take).collect::<Vec<_>>();
            (events, entry.container_id.clone())
        };

        // 2. A heartbeat vouches for the attempt's container too.
        self.touch_container(&container_id);

        // 3. Hand the attempt's status events to the object model.
        if !request.events.is_empty() {
            self.model
                .handle_attempt_events(&request.attempt_id, &request.events);
        }

        debug!(
            accepted = request.events.len(),
            delivered = events.len(),
            "Heartbeat processed"
        );
        Ok(TaskHeartbeatResponse {
            accepted_events: request.events.len(),
            events,
        })
    }

    async fn task_alive(&self, attempt_id: &TaskAttemptId) -> Result<(), ProtocolError> {
        let entry = self.attempt_entry(attempt_id)?;
        let mut entry = lock(&entry);
        // A ping racing a terminal transition is not an error; the attempt
        // is simply no longer tracked for liveness.
        if !entry.state.is_terminal() {
            entry.last_alive = Utc::now();
        }
        Ok(())
    }

    async fn container_alive(&self, container_id: &ContainerId) -> Result<(), ProtocolError> {
        let containers = read(&self.containers);
        let ts = containers
            .get(container_id)
            .ok_or_else(|| ProtocolError::UnknownContainer {
                container_id: container_id.clone(),
            })?;
        *lock(ts) = Utc::now();
        Ok(())
    }

    #[instrument(skip(self), fields(attempt = %attempt_id))]
    async fn can_commit(&self, attempt_id: &TaskAttemptId) -> Result<bool, ProtocolError> {
        let entry = self.attempt_entry(attempt_id)?;
        let mut entry = lock(&entry);
        if entry.state.is_terminal() {
            return Err(ProtocolError::AttemptTerminal {
                attempt_id: attempt_id.clone(),
                state: entry.state.name(),
            });
        }

        // Arbitrate under the entry lock plus the grant lock; one attempt
        // per task ever observes true, repeats observe the stored decision.
        let mut commits = lock(&self.commits);
        match commits.get(&attempt_id.task) {
            Some(holder) if holder == attempt_id => Ok(true),
            Some(holder) => {
                debug!(holder = %holder, "Commit already granted to sibling attempt");
                Ok(false)
            }
            None => {
                info!("Granting commit");
                commits.insert(attempt_id.task.clone(), attempt_id.clone());
                entry.state = AttemptState::Committing;
                Ok(true)
            }
        }
    }

    #[instrument(skip(self), fields(attempt = %attempt_id, container = %container_id))]
    async fn task_started_remotely(
        &self,
        attempt_id: &TaskAttemptId,
        container_id: &ContainerId,
    ) -> Result<(), ProtocolError> {
        // 1. The container must have been registered by the scheduler.
        if !self.is_known_container(container_id) {
            return Err(ProtocolError::UnknownContainer {
                container_id: container_id.clone(),
            });
        }

        // 2. Register the attempt; a repeat start is a usage error.
        {
            let mut attempts = write(&self.attempts);
            if attempts.contains_key(attempt_id) {
                return Err(ProtocolError::AlreadyStarted {
                    attempt_id: attempt_id.clone(),
                });
            }
            attempts.insert(
                attempt_id.clone(),
                Arc::new(Mutex::new(AttemptEntry {
                    state: AttemptState::Running,
                    container_id: container_id.clone(),
                    last_alive: Utc::now(),
                    inbox: VecDeque::new(),
                })),
            );
        }

        info!("Task attempt started remotely");

        // 3. Synthesize the start event.
        self.route(HistoryEvent::TaskAttemptStarted {
            attempt_id: attempt_id.clone(),
            container_id: container_id.clone(),
            start_time: Utc::now(),
        })
        .await
    }

    #[instrument(skip(self, diagnostics), fields(attempt = %attempt_id))]
    async fn task_killed(
        &self,
        attempt_id: &TaskAttemptId,
        end_reason: TaskAttemptEndReason,
        diagnostics: Option<&str>,
    ) -> Result<(), ProtocolError> {
        self.finish_attempt(
            attempt_id,
            AttemptState::Killed,
            AttemptTerminalState::Killed,
            end_reason,
            None,
            diagnostics,
        )
        .await
    }

    #[instrument(skip(self, diagnostics), fields(attempt = %attempt_id))]
    async fn task_failed(
        &self,
        attempt_id: &TaskAttemptId,
        failure_type: TaskFailureType,
        end_reason: TaskAttemptEndReason,
        diagnostics: Option<&str>,
    ) -> Result<(), ProtocolError> {
        self.finish_attempt(
            attempt_id,
            AttemptState::Failed,
            AttemptTerminalState::Failed,
            end_reason,
            Some(failure_type),
            diagnostics,
        )
        .await
    }

    fn register_for_vertex_state_updates(
        &self,
        vertex_name: &str,
        states: Option<HashSet<VertexState>>,
    ) -> Result<(), ProtocolError> {
        self.known_vertex(vertex_name)?;

        let mut subscriptions = lock(&self.subscriptions);
        if subscriptions.contains_key(vertex_name) {
            warn!(vertex = vertex_name, "Duplicate vertex state subscription");
            return Err(ProtocolError::DuplicateSubscription {
                vertex_name: vertex_name.to_string(),
            });
        }
        debug!(vertex = vertex_name, states = ?states, "Registered vertex state subscription");
        subscriptions.insert(
            vertex_name.to_string(),
            VertexSubscription {
                states: states.unwrap_or_default(),
            },
        );
        Ok(())
    }

    fn is_known_container(&self, container_id: &ContainerId) -> bool {
        read(&self.containers).contains_key(container_id)
    }

    fn vertex_total_task_count(&self, vertex_name: &str) -> Result<usize, ProtocolError> {
        self.model
            .total_task_count(vertex_name)
            .ok_or_else(|| ProtocolError::UnknownVertex {
                vertex_name: vertex_name.to_string(),
            })
    }

    fn vertex_completed_task_count(&self, vertex_name: &str) -> Result<usize, ProtocolError> {
        self.model
            .completed_task_count(vertex_name)
            .ok_or_else(|| ProtocolError::UnknownVertex {
                vertex_name: vertex_name.to_string(),
            })
    }

    fn vertex_running_task_count(&self, vertex_name: &str) -> Result<usize, ProtocolError> {
        self.model
            .running_task_count(vertex_name)
            .ok_or_else(|| ProtocolError::UnknownVertex {
                vertex_name: vertex_name.to_string(),
            })
    }

    fn first_attempt_start_time(
        &self,
        vertex_name: &str,
        task_index: u32,
    ) -> Result<Option<DateTime<Utc>>, ProtocolError> {
        self.known_vertex(vertex_name)?;
        Ok(self.model.first_attempt_start_time(vertex_name, task_index))
    }

    fn dag_start_time(&self) -> Option<DateTime<Utc>> {
        self.model.dag_start_time()
    }

    fn current_app_identifier(&self) -> String {
        self.app_id.clone()
    }

    fn input_vertex_names(&self, vertex_name: &str) -> Result<Vec<String>, ProtocolError> {
        self.model
            .input_vertex_names(vertex_name)
            .ok_or_else(|| ProtocolError::UnknownVertex {
                vertex_name: vertex_name.to_string(),
            })
    }
}

impl std::fmt::Debug for TaskTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskTracker")
            .field("app_id", &self.app_id)
            .field("max_events_per_heartbeat", &self.max_events_per_heartbeat)
            .finish()
    }
}
