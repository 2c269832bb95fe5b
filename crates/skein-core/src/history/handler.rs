// Copyright (C) 2025 Skein Data OÜ
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The event router: recovery gating and the per-dag verbosity policy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, instrument, warn};

use skein_protocol::ids::DagId;

use crate::config::Config;
use crate::error::CoreError;
use crate::model::DagModel;
use crate::sync_util::lock;

use super::events::{HistoryEvent, HistoryLogLevel};
use super::sinks::{LoggingSink, RecoverySink};

/// Routes every lifecycle event of a running job.
///
/// Recovery-critical events are written synchronously to the recovery sink
/// in per-dag order; all events are independently evaluated against the
/// owning dag's verbosity threshold for the best-effort logging sink; and
/// every event produces an unconditional structured operational record.
///
/// The per-dag level-override table lives here and is mutated only on this
/// call path: a submission installs the dag's override, recovery recomputes
/// it from the live dag, and completion removes it.
pub struct HistoryEventHandler {
    recovery_enabled: bool,
    default_level: HistoryLogLevel,
    recovery: Option<Arc<dyn RecoverySink>>,
    logging: Arc<dyn LoggingSink>,
    model: Arc<dyn DagModel>,
    dag_levels: Mutex<HashMap<DagId, HistoryLogLevel>>,
    // Per-dag FIFO for recovery writes; unrelated dags never contend.
    dag_order_locks: Mutex<HashMap<DagId, Arc<tokio::sync::Mutex<()>>>>,
    // Order lock for the occasional job-independent critical event.
    app_order_lock: Arc<tokio::sync::Mutex<()>>,
    recovery_failed: AtomicBool,
}

impl HistoryEventHandler {
    /// Create a router.
    ///
    /// Recovery gating is active only when the config enables it and a
    /// recovery sink is supplied; the runtime builder enforces that an
    /// enabled config comes with a sink.
    pub fn new(
        config: &Config,
        model: Arc<dyn DagModel>,
        logging: Arc<dyn LoggingSink>,
        recovery: Option<Arc<dyn RecoverySink>>,
    ) -> Self {
        let recovery_enabled = config.recovery_enabled && recovery.is_some();
        info!(
            recovery_enabled,
            default_level = %config.history_log_level,
            "Initializing history event handler"
        );
        Self {
            recovery_enabled,
            default_level: config.history_log_level,
            recovery,
            logging,
            model,
            dag_levels: Mutex::new(HashMap::new()),
            dag_order_locks: Mutex::new(HashMap::new()),
            app_order_lock: Arc::new(tokio::sync::Mutex::new(())),
            recovery_failed: AtomicBool::new(false),
        }
    }

    /// Route one event.
    ///
    /// Steps, in fixed order:
    /// 1. Recovery-critical events go to the recovery sink synchronously; a
    ///    failure sets the sticky flag and is returned to the caller.
    /// 2. The verbosity policy is evaluated (installing or removing the
    ///    dag's level override as a side effect); passing events go to the
    ///    logging sink, whose errors are swallowed.
    /// 3. A structured operational record is emitted unconditionally.
    ///
    /// Steps 2 and 3 run regardless of step 1's outcome; a recovery failure
    /// is reported only after they complete.
    #[instrument(skip(self, event), fields(event_type = %event.kind()))]
    pub async fn handle(&self, event: &HistoryEvent) -> Result<(), CoreError> {
        // 1. Durable write for recovery-critical events.
        let recovery_result = if self.recovery_enabled && event.is_recovery_critical() {
            self.write_recovery(event).await
        } else {
            Ok(())
        };

        // 2. Policy-filtered best-effort append.
        if self.should_log(event) {
            if let Err(e) = self.logging.handle(event).await {
                let err = CoreError::LoggingWriteFailed {
                    event_type: event.kind().to_string(),
                    details: e.to_string(),
                };
                warn!(code = err.error_code(), "{}", err);
            }
        }

        // 3. Unconditional operational record.
        match event.dag_id() {
            Some(dag_id) => info!(dag = %dag_id, event = %event.kind(), "history event"),
            None => info!(dag = "n/a", event = %event.kind(), "history event"),
        }

        recovery_result
    }

    /// Whether a recovery write has ever failed. Sticky; never clears.
    ///
    /// Lock-free; a supervisory loop polls this to decide whether to abort
    /// the job.
    pub fn has_recovery_failed(&self) -> bool {
        self.recovery_failed.load(Ordering::Acquire)
    }

    /// The verbosity threshold currently in force for a dag.
    pub fn effective_level(&self, dag_id: &DagId) -> HistoryLogLevel {
        lock(&self.dag_levels)
            .get(dag_id)
            .copied()
            .unwrap_or(self.default_level)
    }

    async fn write_recovery(&self, event: &HistoryEvent) -> Result<(), CoreError> {
        let order_lock = match event.dag_id() {
            Some(dag_id) => lock(&self.dag_order_locks)
                .entry(dag_id.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone(),
            None => self.app_order_lock.clone(),
        };
        let _guard = order_lock.lock().await;

        let Some(recovery) = self.recovery.as_ref() else {
            return Ok(());
        };
        if let Err(e) = recovery.handle(event).await {
            self.recovery_failed.store(true, Ordering::Release);
            let err = CoreError::RecoveryWriteFailed {
                event_type: event.kind().to_string(),
                details: e.to_string(),
            };
            warn!(code = err.error_code(), "{}", err);
            return Err(err);
        }
        Ok(())
    }

    /// Evaluate the logging decision for an event and apply the level-table
    /// mutation the event calls for.
    ///
    /// The decision uses the level in force *before* this event's own
    /// mutation: a submission's freshly computed override applies to every
    /// later event of the dag but never retroactively to the submission
    /// itself, which is always judged by the process default. A finished
    /// event is judged by the dag's own override and removes it afterwards.
    fn should_log(&self, event: &HistoryEvent) -> bool {
        let mut levels = lock(&self.dag_levels);

        let effective = event
            .dag_id()
            .and_then(|dag_id| levels.get(dag_id).copied())
            .unwrap_or(self.default_level);

        match event {
            HistoryEvent::DagSubmitted {
                dag_id, log_level, ..
            } => {
                let level = log_level.unwrap_or(self.default_level);
                debug!(dag = %dag_id, level = %level, "installing dag log level from submission");
                levels.insert(dag_id.clone(), level);
            }
            HistoryEvent::DagRecovered { dag_id, .. } => {
                // Recovery reconstructs from live state, not the event
                // payload: ask the in-memory dag for its configured level.
                let level = self.model.dag_log_level().unwrap_or(self.default_level);
                debug!(dag = %dag_id, level = %level, "installing dag log level from recovered dag");
                levels.insert(dag_id.clone(), level);
            }
            HistoryEvent::DagFinished { dag_id, .. } => {
                levels.remove(dag_id);
                lock(&self.dag_order_locks).remove(dag_id);
            }
            _ => {}
        }

        effective.should_log(event.severity())
    }
}

impl std::fmt::Debug for HistoryEventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryEventHandler")
            .field("recovery_enabled", &self.recovery_enabled)
            .field("default_level", &self.default_level)
            .field("recovery_failed", &self.recovery_failed.load(Ordering::Relaxed))
            .finish()
    }
}
