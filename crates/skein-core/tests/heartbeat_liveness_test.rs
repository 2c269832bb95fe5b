// Copyright (C) 2025 Skein Data OÜ
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for heartbeats and liveness tracking.

mod common;

use common::*;
use skein_core::history::{DagState, HistoryLogLevel};
use skein_protocol::messages::{AttemptStatusEvent, TaskAttemptEndReason, TaskHeartbeatRequest};
use skein_protocol::TaskCommContext;

fn heartbeat_request(
    a: &skein_protocol::ids::TaskAttemptId,
    c: &skein_protocol::ids::ContainerId,
) -> TaskHeartbeatRequest {
    TaskHeartbeatRequest {
        attempt_id: a.clone(),
        container_id: c.clone(),
        events: vec![],
        max_events: 0,
    }
}

/// Any successful heartbeat advances the attempt's and its container's
/// liveness timestamps.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_heartbeat_advances_both_timestamps() {
    let ctx = TestContext::new(HistoryLogLevel::All);
    let (a, c) = (attempt(0, 0), container("c1"));
    ctx.start_attempt(&a, &c).await;

    let tracker = ctx.coordinator.tracker();
    let attempt_before = tracker.last_alive(&a).unwrap();
    let container_before = tracker.container_last_alive(&c).unwrap();

    tracker.heartbeat(heartbeat_request(&a, &c)).await.unwrap();

    assert!(tracker.last_alive(&a).unwrap() >= attempt_before);
    assert!(tracker.container_last_alive(&c).unwrap() >= container_before);
}

/// A ping followed by a heartbeat leaves the later timestamp in place.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ping_then_heartbeat_is_last_writer_wins() {
    let ctx = TestContext::new(HistoryLogLevel::All);
    let (a, c) = (attempt(0, 0), container("c1"));
    ctx.start_attempt(&a, &c).await;

    let tracker = ctx.coordinator.tracker();
    tracker.task_alive(&a).await.unwrap();
    let t1 = tracker.last_alive(&a).unwrap();
    tracker.heartbeat(heartbeat_request(&a, &c)).await.unwrap();
    let t2 = tracker.last_alive(&a).unwrap();
    assert!(t2 >= t1);
}

/// Heartbeat status events are acknowledged and delivered to the object
/// model untouched.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_events_are_acknowledged_and_forwarded() {
    let ctx = TestContext::new(HistoryLogLevel::All);
    let (a, c) = (attempt(0, 0), container("c1"));
    ctx.start_attempt(&a, &c).await;

    let mut request = heartbeat_request(&a, &c);
    request.events = vec![
        AttemptStatusEvent::Progress { fraction: 0.25 },
        AttemptStatusEvent::Counters {
            counters: serde_json::json!({"io": {"bytes_read": 1024}}),
        },
    ];
    let response = ctx.coordinator.tracker().heartbeat(request).await.unwrap();

    assert_eq!(response.accepted_events, 2);
    assert_eq!(ctx.model.received_status_events(), vec![(a, 2)]);
}

/// Protocol calls against unknown or finished attempts fail fast.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_and_terminal_attempts_are_rejected() {
    let ctx = TestContext::new(HistoryLogLevel::All);
    let (a, c) = (attempt(0, 0), container("c1"));
    let tracker = ctx.coordinator.tracker();

    let err = tracker
        .heartbeat(heartbeat_request(&a, &c))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNKNOWN_ATTEMPT");

    ctx.start_attempt(&a, &c).await;
    tracker
        .task_killed(&a, TaskAttemptEndReason::CommunicationError, None)
        .await
        .unwrap();

    let err = tracker
        .heartbeat(heartbeat_request(&a, &c))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ATTEMPT_TERMINAL");
}

/// A liveness ping racing a terminal transition is tolerated; a ping for an
/// attempt that never started is not.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_task_alive_tolerates_terminal_but_not_unknown() {
    let ctx = TestContext::new(HistoryLogLevel::All);
    let (a, c) = (attempt(0, 0), container("c1"));
    let tracker = ctx.coordinator.tracker();

    let err = tracker.task_alive(&a).await.unwrap_err();
    assert_eq!(err.code(), "UNKNOWN_ATTEMPT");

    ctx.start_attempt(&a, &c).await;
    tracker
        .task_killed(&a, TaskAttemptEndReason::Preempted, None)
        .await
        .unwrap();
    tracker.task_alive(&a).await.unwrap();
}

/// Container pings stand alone from attempt liveness.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_container_alive_updates_only_the_container() {
    let ctx = TestContext::new(HistoryLogLevel::All);
    let (a, c) = (attempt(0, 0), container("c1"));
    ctx.start_attempt(&a, &c).await;

    let tracker = ctx.coordinator.tracker();
    let attempt_before = tracker.last_alive(&a).unwrap();
    let container_before = tracker.container_last_alive(&c).unwrap();

    tracker.container_alive(&c).await.unwrap();

    assert!(tracker.container_last_alive(&c).unwrap() >= container_before);
    assert_eq!(tracker.last_alive(&a).unwrap(), attempt_before);
}

/// A heartbeat naming a container other than the attempt's own is rejected.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_heartbeat_from_foreign_container_is_rejected() {
    let ctx = TestContext::new(HistoryLogLevel::All);
    let (a, c) = (attempt(0, 0), container("c1"));
    ctx.start_attempt(&a, &c).await;

    let err = ctx
        .coordinator
        .tracker()
        .heartbeat(heartbeat_request(&a, &container("c2")))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CONTAINER_MISMATCH");
}

/// Finishing a dag evicts its attempts, commit grants, and containers from
/// the tracker; a long-lived master does not accumulate state across dags.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_finished_dag_leaves_no_tracker_state_behind() {
    let ctx = TestContext::new(HistoryLogLevel::All);
    let (a, c) = (attempt(0, 0), container("c1"));
    ctx.start_attempt(&a, &c).await;

    let tracker = ctx.coordinator.tracker();
    assert!(tracker.can_commit(&a).await.unwrap());
    tracker
        .task_killed(&a, TaskAttemptEndReason::ContainerExited, None)
        .await
        .unwrap();
    ctx.coordinator
        .dag_finished(&dag(), DagState::Failed, Some("too many failed attempts"))
        .await
        .unwrap();

    assert!(tracker.last_alive(&a).is_none());
    assert!(tracker.container_last_alive(&c).is_none());
    assert!(!tracker.is_known_container(&c));
    let err = tracker
        .heartbeat(heartbeat_request(&a, &c))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNKNOWN_ATTEMPT");
}

/// Concurrent heartbeats from independent attempts all succeed; read
/// queries stay answerable throughout.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_heartbeats_and_queries() {
    let ctx = std::sync::Arc::new(TestContext::new(HistoryLogLevel::All));
    let c = container("c1");
    let attempts: Vec<_> = (0..8).map(|i| attempt(i, 0)).collect();
    for a in &attempts {
        ctx.start_attempt(a, &c).await;
    }

    let heartbeats = futures::future::join_all(attempts.iter().map(|a| {
        let ctx = ctx.clone();
        let request = heartbeat_request(a, &c);
        async move { ctx.coordinator.tracker().heartbeat(request).await }
    }));
    let queries = async {
        let tracker = ctx.coordinator.tracker();
        assert_eq!(tracker.vertex_total_task_count("Map").unwrap(), 4);
        assert!(tracker.is_known_container(&c));
        assert_eq!(tracker.current_app_identifier(), "app-42");
        assert_eq!(
            tracker.input_vertex_names("Reduce").unwrap(),
            vec!["Map".to_string()]
        );
    };

    let (results, ()) = tokio::join!(heartbeats, queries);
    for result in results {
        result.unwrap();
    }
}
