// Copyright (C) 2025 Skein Data OÜ
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable coordination core.
//!
//! This module provides [`Coordinator`], which wires the event router and the
//! task tracker together for embedding into an application master process.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use skein_core::config::Config;
//! use skein_core::runtime::Coordinator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let coordinator = Coordinator::builder()
//!         .config(Config::from_env()?)
//!         .model(model)
//!         .logging_sink(logging)
//!         .recovery_sink(recovery)
//!         .build()?;
//!
//!     coordinator.app_launched("app-42").await?;
//!     // hand coordinator.tracker() to the transport layer ...
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use skein_protocol::ids::DagId;

use crate::config::Config;
use crate::history::{
    DagState, HistoryEvent, HistoryEventHandler, HistoryLogLevel, LoggingSink, RecoverySink,
};
use crate::model::DagModel;
use crate::tracker::TaskTracker;

/// Builder for creating a [`Coordinator`].
pub struct CoordinatorBuilder {
    config: Config,
    model: Option<Arc<dyn DagModel>>,
    logging: Option<Arc<dyn LoggingSink>>,
    recovery: Option<Arc<dyn RecoverySink>>,
}

impl std::fmt::Debug for CoordinatorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorBuilder")
            .field("config", &self.config)
            .field("model", &self.model.as_ref().map(|_| "..."))
            .field("logging", &self.logging.as_ref().map(|_| "..."))
            .field("recovery", &self.recovery.as_ref().map(|_| "..."))
            .finish()
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            model: None,
            logging: None,
            recovery: None,
        }
    }
}

impl CoordinatorBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration.
    ///
    /// Default: [`Config::default`]. Use [`Config::from_env`] to read the
    /// process environment.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the dag object model (required).
    pub fn model(mut self, model: Arc<dyn DagModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the best-effort logging sink (required).
    pub fn logging_sink(mut self, logging: Arc<dyn LoggingSink>) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Set the durable recovery sink.
    ///
    /// Required when the configuration enables recovery.
    pub fn recovery_sink(mut self, recovery: Arc<dyn RecoverySink>) -> Self {
        self.recovery = Some(recovery);
        self
    }

    /// Build the coordinator.
    ///
    /// Returns an error if required components are missing.
    pub fn build(self) -> Result<Coordinator> {
        let model = self
            .model
            .ok_or_else(|| anyhow::anyhow!("dag model is required"))?;
        let logging = self
            .logging
            .ok_or_else(|| anyhow::anyhow!("logging sink is required"))?;
        if self.config.recovery_enabled && self.recovery.is_none() {
            return Err(anyhow::anyhow!(
                "recovery is enabled but no recovery sink was provided"
            ));
        }

        let history = Arc::new(HistoryEventHandler::new(
            &self.config,
            model.clone(),
            logging,
            self.recovery,
        ));
        let tracker = Arc::new(TaskTracker::new(
            self.config.max_events_per_heartbeat,
            history.clone(),
            model,
        ));

        info!("Coordinator built");
        Ok(Coordinator { history, tracker })
    }
}

/// The assembled coordination core of an application master.
///
/// Holds the event router and the task tracker. The engine's own control
/// thread reports dag lifecycle milestones through the methods here; the
/// transport layer drives the protocol through [`tracker`](Self::tracker).
pub struct Coordinator {
    history: Arc<HistoryEventHandler>,
    tracker: Arc<TaskTracker>,
}

impl Coordinator {
    /// Create a new builder for configuring the coordinator.
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// The event router.
    pub fn history(&self) -> &Arc<HistoryEventHandler> {
        &self.history
    }

    /// The task tracker, implementing the task communication protocol.
    pub fn tracker(&self) -> &Arc<TaskTracker> {
        &self.tracker
    }

    /// Whether a recovery write has ever failed. See
    /// [`HistoryEventHandler::has_recovery_failed`].
    pub fn has_recovery_failed(&self) -> bool {
        self.history.has_recovery_failed()
    }

    /// Report that the application master came up.
    pub async fn app_launched(&self, app_id: &str) -> crate::error::Result<()> {
        self.history
            .handle(&HistoryEvent::AppLaunched {
                app_id: app_id.to_string(),
                launch_time: Utc::now(),
            })
            .await
    }

    /// Report a dag submission, with its optional verbosity override.
    pub async fn dag_submitted(
        &self,
        dag_id: &DagId,
        log_level: Option<HistoryLogLevel>,
    ) -> crate::error::Result<()> {
        self.history
            .handle(&HistoryEvent::DagSubmitted {
                dag_id: dag_id.clone(),
                submit_time: Utc::now(),
                log_level,
            })
            .await
    }

    /// Report that a dag was reconstructed from the recovery log.
    pub async fn dag_recovered(&self, dag_id: &DagId) -> crate::error::Result<()> {
        self.history
            .handle(&HistoryEvent::DagRecovered {
                dag_id: dag_id.clone(),
                recover_time: Utc::now(),
            })
            .await
    }

    /// Report that a dag reached a terminal state.
    ///
    /// Also evicts the dag's attempt, commit, and container state from the
    /// tracker; like the router's level table, tracker state lives no longer
    /// than the dag it belongs to.
    pub async fn dag_finished(
        &self,
        dag_id: &DagId,
        state: DagState,
        diagnostics: Option<&str>,
    ) -> crate::error::Result<()> {
        let result = self
            .history
            .handle(&HistoryEvent::DagFinished {
                dag_id: dag_id.clone(),
                finish_time: Utc::now(),
                state,
                diagnostics: diagnostics.map(str::to_string),
            })
            .await;
        // Evicted even when the durable write failed; the dag is gone either
        // way and a supervisor acts on the returned error.
        self.tracker.dag_complete(dag_id);
        result
    }

    /// Report that the dag-level output commit began.
    pub async fn dag_commit_started(&self, dag_id: &DagId) -> crate::error::Result<()> {
        self.history
            .handle(&HistoryEvent::DagCommitStarted {
                dag_id: dag_id.clone(),
                commit_time: Utc::now(),
            })
            .await
    }

    /// Report that a vertex-level output commit began.
    pub async fn vertex_commit_started(
        &self,
        dag_id: &DagId,
        vertex_name: &str,
    ) -> crate::error::Result<()> {
        self.history
            .handle(&HistoryEvent::VertexCommitStarted {
                dag_id: dag_id.clone(),
                vertex_name: vertex_name.to_string(),
                commit_time: Utc::now(),
            })
            .await
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("history", &self.history)
            .field("tracker", &self.tracker)
            .finish()
    }
}
