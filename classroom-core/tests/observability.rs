//! `WS_MONITOR_SUBSCRIBE` and the monitor-mirroring every `Emitter::to_room`
//! fan-out gets, end-to-end against a fully in-memory backend.

mod common;

use classroom_core::metastore::Role;
use common::{assert_no_event, recv_event, settle, Harness};
use serde_json::json;

#[tokio::test]
async fn monitor_subscriber_sees_room_fanout_mirrored() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    harness.metadata.seed_participant(1, 100, Role::Teacher, "Ms. Lee");

    let mut monitor_rx = harness.connect_monitor("sid-monitor").await;
    harness.send("sid-monitor", "WS_MONITOR_SUBSCRIBE", json!({"courseId": 1, "lessonId": lesson_id})).await;
    recv_event(&mut monitor_rx, "WS_MONITOR_SUBSCRIBE").await;
    settle().await;

    let mut teacher_rx = harness.connect_user("sid-teacher", 100).await;
    harness.init_lesson("sid-teacher", &mut teacher_rx, 1, lesson_id).await;

    let mirrored = recv_event(&mut monitor_rx, "WS_MONITOR_EVENT").await;
    let data = mirrored.data.unwrap();
    assert_eq!(data["event"], json!("PARTICIPANT_STATUS"));
    assert_eq!(data["room"], json!(format!("1:{lesson_id}")));
    assert_eq!(data["originSid"], json!("sid-teacher"));
    assert!(data["serverTimestamp"].as_i64().unwrap() > 0);
    assert_eq!(data["data"]["active"], json!(true));
}

#[tokio::test]
async fn non_admin_session_is_rejected_from_monitor_subscribe() {
    let harness = Harness::new();
    harness.metadata.seed_participant(1, 100, Role::Student, "Alice");
    let mut rx = harness.connect_user("sid-1", 100).await;

    harness.send("sid-1", "WS_MONITOR_SUBSCRIBE", json!({"courseId": 1, "lessonId": 1})).await;
    let err = recv_event(&mut rx, "ERROR").await;
    assert_eq!(err.data.unwrap()["error"], json!("FORBIDDEN_PROJECT"));
}

#[tokio::test]
async fn room_fanout_with_no_monitor_subscriber_mirrors_nothing() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    harness.metadata.seed_participant(1, 100, Role::Teacher, "Ms. Lee");

    // No WS_MONITOR_SUBSCRIBE ever happens; a second monitor connection that
    // never subscribes should see nothing but its own direct replies.
    let mut monitor_rx = harness.connect_monitor("sid-monitor").await;

    let mut teacher_rx = harness.connect_user("sid-teacher", 100).await;
    harness.init_lesson("sid-teacher", &mut teacher_rx, 1, lesson_id).await;
    settle().await;

    assert_no_event(&mut monitor_rx, "WS_MONITOR_EVENT").await;
}
