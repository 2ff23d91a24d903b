//! `INIT_LESSON`, `ALL_PARTICIPANT`, `ACTIVITY_PING` end-to-end against a
//! fully in-memory backend.

mod common;

use classroom_core::metastore::{MetadataStore, Role};
use common::{recv_event, settle, Harness};
use serde_json::json;

#[tokio::test]
async fn init_lesson_binds_session_and_announces_presence() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    let participant_id = harness.metadata.seed_participant(1, 100, Role::Student, "Alice");

    let mut rx = harness.connect_user("sid-1", 100).await;
    let response = harness.init_lesson("sid-1", &mut rx, 1, lesson_id).await;

    let data = response.data.expect("INIT_LESSON reply carries data");
    assert_eq!(data["participantId"], json!(participant_id));
    assert_eq!(data["nickname"], json!("Alice"));
    assert_eq!(data["role"], json!("STUDENT"));

    // The caller is a member of its own lesson room, so it hears its own
    // presence announcement once the room forwarder has caught up.
    let presence = recv_event(&mut rx, "PARTICIPANT_STATUS").await;
    let presence = presence.data.unwrap();
    assert_eq!(presence["id"], json!(participant_id));
    assert_eq!(presence["active"], json!(true));
}

#[tokio::test]
async fn init_lesson_rejects_unknown_course() {
    let harness = Harness::new();
    harness.metadata.seed_participant(1, 100, Role::Student, "Alice");
    let mut rx = harness.connect_user("sid-1", 100).await;

    harness.send("sid-1", "INIT_LESSON", json!({"courseId": 1, "lessonId": 999})).await;
    let err = recv_event(&mut rx, "ERROR").await;
    assert_eq!(err.data.unwrap()["error"], json!("ACCESS_COURSE_FAIL"));
}

#[tokio::test]
async fn all_participant_reports_the_roster() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    harness.metadata.seed_participant(1, 100, Role::Teacher, "Ms. Lee");
    harness.metadata.seed_participant(1, 200, Role::Student, "Bob");

    let mut teacher_rx = harness.connect_user("sid-teacher", 100).await;
    harness.init_lesson("sid-teacher", &mut teacher_rx, 1, lesson_id).await;

    harness.send("sid-teacher", "ALL_PARTICIPANT", json!({})).await;
    let roster = recv_event(&mut teacher_rx, "ALL_PARTICIPANT").await;
    let participants = roster.data.unwrap()["participants"].as_array().unwrap().clone();
    assert_eq!(participants.len(), 2);
    assert!(participants.iter().any(|p| p["nickname"] == json!("Ms. Lee") && p["role"] == json!("TEACHER")));
    assert!(participants.iter().any(|p| p["nickname"] == json!("Bob") && p["active"] == json!(false)));
}

#[tokio::test]
async fn activity_ping_flips_an_idle_participant_active_and_announces_it() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    let teacher_id = harness.metadata.seed_participant(1, 100, Role::Teacher, "Ms. Lee");
    let student_id = harness.metadata.seed_participant(1, 200, Role::Student, "Bob");

    let mut teacher_rx = harness.connect_user("sid-teacher", 100).await;
    harness.init_lesson("sid-teacher", &mut teacher_rx, 1, lesson_id).await;

    // Bob never connected, so his participant row is still inactive; the
    // teacher (who holds standing access via the teacher bypass) pings on
    // his behalf and should flip him active.
    harness.send("sid-teacher", "ACTIVITY_PING", json!({"targetPtcId": student_id})).await;
    let ack = recv_event(&mut teacher_rx, "ACTIVITY_PING").await;
    assert!(ack.data.unwrap().as_object().unwrap().is_empty());

    settle().await;
    let presence = recv_event(&mut teacher_rx, "PARTICIPANT_STATUS").await;
    let presence = presence.data.unwrap();
    assert_eq!(presence["id"], json!(student_id));
    assert_eq!(presence["active"], json!(true));

    let bob = harness.metadata.get_participant(student_id).await.unwrap().unwrap();
    assert!(bob.active);
    let _ = teacher_id;
}

#[tokio::test]
async fn disconnect_flips_presence_to_inactive_exactly_once() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    let teacher_id = harness.metadata.seed_participant(1, 100, Role::Teacher, "Ms. Lee");
    let student_id = harness.metadata.seed_participant(1, 200, Role::Student, "Bob");

    let mut teacher_rx = harness.connect_user("sid-teacher", 100).await;
    harness.init_lesson("sid-teacher", &mut teacher_rx, 1, lesson_id).await;
    // The teacher's own join announcement, still sitting unread in its queue.
    recv_event(&mut teacher_rx, "PARTICIPANT_STATUS").await;

    let mut student_rx = harness.connect_user("sid-student", 200).await;
    harness.init_lesson("sid-student", &mut student_rx, 1, lesson_id).await;
    // The student's join announcement, which the teacher also hears.
    let joined = recv_event(&mut teacher_rx, "PARTICIPANT_STATUS").await;
    assert_eq!(joined.data.unwrap()["active"], json!(true));
    settle().await;

    harness.disconnect("sid-student").await;
    settle().await;

    let presence = recv_event(&mut teacher_rx, "PARTICIPANT_STATUS").await;
    let presence = presence.data.unwrap();
    assert_eq!(presence["id"], json!(student_id));
    assert_eq!(presence["active"], json!(false));

    let bob = harness.metadata.get_participant(student_id).await.unwrap().unwrap();
    assert!(!bob.active);
    let _ = teacher_id;
}
