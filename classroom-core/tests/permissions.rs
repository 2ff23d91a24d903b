//! `PROJECT_PERM`, `PROJECT_ACCESSIBLE`, `SUBS_PARTICIPANT` end-to-end
//! against a fully in-memory backend (spec §8 E2E scenarios 2 and 3).

mod common;

use classroom_core::metastore::{MetadataStore, Role};
use common::{assert_no_event, recv_event, settle, Harness};
use serde_json::json;

#[tokio::test]
async fn grant_then_subscribe_then_revoke_forces_subscriber_out() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    harness.metadata.seed_participant(1, 100, Role::Student, "S1");
    harness.metadata.seed_participant(1, 200, Role::Student, "S2");

    let mut s1_rx = harness.connect_user("sid-s1", 100).await;
    harness.init_lesson("sid-s1", &mut s1_rx, 1, lesson_id).await;
    let mut s2_rx = harness.connect_user("sid-s2", 200).await;
    let s2_ptc = harness.init_lesson("sid-s2", &mut s2_rx, 1, lesson_id).await.data.unwrap()["participantId"]
        .as_i64()
        .unwrap();

    // S1 grants S2 READ over S1's project.
    harness.send("sid-s1", "PROJECT_PERM", json!([{"targetId": s2_ptc, "permission": 4}])).await;
    recv_event(&mut s1_rx, "PROJECT_PERM").await;
    let changed = recv_event(&mut s2_rx, "PROJECT_PERM_CHANGED").await;
    let data = changed.data.unwrap();
    assert_eq!(data["permission"], json!(4));
    assert_eq!(data["added"], json!(4));
    assert_eq!(data["removed"], json!(0));
    settle().await;

    // S2 subscribes to S1's stream and succeeds.
    let s1_ptc = {
        let project = harness.metadata.find_project(lesson_id, 100).await.unwrap().unwrap();
        project.participant_id
    };
    harness.send("sid-s2", "SUBS_PARTICIPANT", json!({"target": [s1_ptc]})).await;
    let sub_result = recv_event(&mut s2_rx, "SUBS_PARTICIPANT").await;
    let success: Vec<i64> = serde_json::from_value(sub_result.data.unwrap()["successId"].clone()).unwrap();
    assert_eq!(success, vec![s1_ptc]);
    settle().await;

    // S1 broadcasts a live edit; S2, now subscribed, receives it.
    harness
        .send(
            "sid-s1",
            "FILE_MOD",
            json!({"ownerId": s1_ptc, "file": "a.py", "cursor": {"line": 1}, "change": {"op": "insert"}, "timestamp": 42}),
        )
        .await;
    recv_event(&mut s2_rx, "FILE_MOD").await;

    // S1 revokes READ; the dispatcher forces S2 out of the subscription room.
    harness.send("sid-s1", "PROJECT_PERM", json!([{"targetId": s2_ptc, "permission": 0}])).await;
    recv_event(&mut s1_rx, "PROJECT_PERM").await;
    let revoked = recv_event(&mut s2_rx, "PROJECT_PERM_CHANGED").await;
    let revoked = revoked.data.unwrap();
    assert_eq!(revoked["removed"], json!(4));
    settle().await;

    // A subsequent FILE_MOD from S1 never reaches S2.
    harness
        .send(
            "sid-s1",
            "FILE_MOD",
            json!({"ownerId": s1_ptc, "file": "a.py", "cursor": {"line": 2}, "change": {"op": "insert"}, "timestamp": 43}),
        )
        .await;
    assert_no_event(&mut s2_rx, "FILE_MOD").await;
}

#[tokio::test]
async fn teacher_defaults_to_full_access_without_an_explicit_edge() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    harness.metadata.seed_participant(1, 100, Role::Teacher, "Ms. Lee");
    harness.metadata.seed_participant(1, 200, Role::Student, "Bob");

    let mut teacher_rx = harness.connect_user("sid-teacher", 100).await;
    harness.init_lesson("sid-teacher", &mut teacher_rx, 1, lesson_id).await;
    let mut bob_rx = harness.connect_user("sid-bob", 200).await;
    harness.init_lesson("sid-bob", &mut bob_rx, 1, lesson_id).await;

    // The teacher can read/write Bob's project with no ACL edge at all.
    harness
        .send("sid-teacher", "FILE_CREATE", json!({"ownerId": 200, "type": "file", "name": "notes.txt", "content": "hi"}))
        .await;
    recv_event(&mut teacher_rx, "FILE_CREATE").await;
}

#[tokio::test]
async fn a_student_without_a_grant_is_forbidden_from_a_peers_project() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    harness.metadata.seed_participant(1, 100, Role::Student, "S1");
    harness.metadata.seed_participant(1, 200, Role::Student, "S2");

    let mut s1_rx = harness.connect_user("sid-s1", 100).await;
    harness.init_lesson("sid-s1", &mut s1_rx, 1, lesson_id).await;
    let mut s2_rx = harness.connect_user("sid-s2", 200).await;
    harness.init_lesson("sid-s2", &mut s2_rx, 1, lesson_id).await;

    harness.send("sid-s2", "DIR_INFO", json!({"targetId": 100})).await;
    let err = recv_event(&mut s2_rx, "ERROR").await;
    assert_eq!(err.data.unwrap()["error"], json!("FORBIDDEN_PROJECT"));
}
