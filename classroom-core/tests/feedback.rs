//! `FEEDBACK_ADD`, `FEEDBACK_MOD`, `FEEDBACK_COMMENT`, `FEEDBACK_COMMENT_MOD`
//! end-to-end against a fully in-memory backend (spec §4.N).

mod common;

use classroom_core::metastore::Role;
use common::{assert_no_event, recv_event, settle, Harness};
use serde_json::json;

#[tokio::test]
async fn feedback_add_notifies_the_owner_and_every_acl_member() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    harness.metadata.seed_participant(1, 100, Role::Student, "Owner");
    harness.metadata.seed_participant(1, 200, Role::Student, "Reviewer");
    harness.metadata.seed_participant(1, 300, Role::Student, "Bystander");

    let mut owner_rx = harness.connect_user("sid-owner", 100).await;
    harness.init_lesson("sid-owner", &mut owner_rx, 1, lesson_id).await;
    let mut reviewer_rx = harness.connect_user("sid-reviewer", 200).await;
    harness.init_lesson("sid-reviewer", &mut reviewer_rx, 1, lesson_id).await;
    let mut bystander_rx = harness.connect_user("sid-bystander", 300).await;
    harness.init_lesson("sid-bystander", &mut bystander_rx, 1, lesson_id).await;
    settle().await;

    harness.send("sid-owner", "PROJECT_PERM", json!([{"targetId": 200, "permission": 4}])).await;
    recv_event(&mut owner_rx, "PROJECT_PERM").await;
    recv_event(&mut reviewer_rx, "PROJECT_PERM_CHANGED").await;
    settle().await;

    harness
        .send(
            "sid-reviewer",
            "FEEDBACK_ADD",
            json!({"ref": {"ownerId": 100, "file": "a.py", "line": "3-4"}, "acl": [200], "comment": "fix this"}),
        )
        .await;
    let reply = recv_event(&mut reviewer_rx, "FEEDBACK_ADD").await;
    let feedback_id = reply.data.unwrap()["id"].as_i64().unwrap();

    // The owner (implicit ACL member) also hears about the new thread...
    let owner_view = recv_event(&mut owner_rx, "FEEDBACK_ADD").await;
    assert_eq!(owner_view.data.unwrap()["id"], json!(feedback_id));

    // ...but a bystander who isn't on the ACL and isn't the owner does not.
    assert_no_event(&mut bystander_rx, "FEEDBACK_ADD").await;
}

#[tokio::test]
async fn only_the_author_may_modify_their_feedback_thread() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    harness.metadata.seed_participant(1, 100, Role::Student, "Owner");
    harness.metadata.seed_participant(1, 200, Role::Student, "Reviewer");

    let mut owner_rx = harness.connect_user("sid-owner", 100).await;
    harness.init_lesson("sid-owner", &mut owner_rx, 1, lesson_id).await;
    let mut reviewer_rx = harness.connect_user("sid-reviewer", 200).await;
    harness.init_lesson("sid-reviewer", &mut reviewer_rx, 1, lesson_id).await;

    harness.send("sid-owner", "PROJECT_PERM", json!([{"targetId": 200, "permission": 4}])).await;
    recv_event(&mut owner_rx, "PROJECT_PERM").await;
    recv_event(&mut reviewer_rx, "PROJECT_PERM_CHANGED").await;
    settle().await;

    harness
        .send(
            "sid-reviewer",
            "FEEDBACK_ADD",
            json!({"ref": {"ownerId": 100, "file": "a.py", "line": "1"}, "acl": [], "comment": "note"}),
        )
        .await;
    let reply = recv_event(&mut reviewer_rx, "FEEDBACK_ADD").await;
    let feedback_id = reply.data.unwrap()["id"].as_i64().unwrap();
    recv_event(&mut owner_rx, "FEEDBACK_ADD").await;

    // The owner, who did not author the thread, cannot resolve it.
    harness.send("sid-owner", "FEEDBACK_MOD", json!({"feedbackId": feedback_id, "resolved": true})).await;
    let err = recv_event(&mut owner_rx, "ERROR").await;
    assert_eq!(err.data.unwrap()["error"], json!("FEEDBACK_NOT_AUTH"));

    // The author can.
    harness.send("sid-reviewer", "FEEDBACK_MOD", json!({"feedbackId": feedback_id, "resolved": true})).await;
    let ok = recv_event(&mut reviewer_rx, "FEEDBACK_MOD").await;
    assert_eq!(ok.data.unwrap()["resolved"], json!(true));
}

#[tokio::test]
async fn comment_requires_acl_membership() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    harness.metadata.seed_participant(1, 100, Role::Student, "Owner");
    harness.metadata.seed_participant(1, 200, Role::Student, "Reviewer");
    harness.metadata.seed_participant(1, 300, Role::Student, "Outsider");

    let mut owner_rx = harness.connect_user("sid-owner", 100).await;
    harness.init_lesson("sid-owner", &mut owner_rx, 1, lesson_id).await;
    let mut reviewer_rx = harness.connect_user("sid-reviewer", 200).await;
    harness.init_lesson("sid-reviewer", &mut reviewer_rx, 1, lesson_id).await;
    let mut outsider_rx = harness.connect_user("sid-outsider", 300).await;
    harness.init_lesson("sid-outsider", &mut outsider_rx, 1, lesson_id).await;

    harness
        .send(
            "sid-owner",
            "FEEDBACK_ADD",
            json!({"ref": {"ownerId": 100, "file": "a.py", "line": "1"}, "acl": [200], "comment": "note"}),
        )
        .await;
    let reply = recv_event(&mut owner_rx, "FEEDBACK_ADD").await;
    let feedback_id = reply.data.unwrap()["id"].as_i64().unwrap();
    recv_event(&mut reviewer_rx, "FEEDBACK_ADD").await;

    harness
        .send("sid-outsider", "FEEDBACK_COMMENT", json!({"feedbackId": feedback_id, "content": "can I help?"}))
        .await;
    let err = recv_event(&mut outsider_rx, "ERROR").await;
    assert_eq!(err.data.unwrap()["error"], json!("FEEDBACK_NOT_AUTH"));

    harness
        .send("sid-reviewer", "FEEDBACK_COMMENT", json!({"feedbackId": feedback_id, "content": "on it"}))
        .await;
    recv_event(&mut reviewer_rx, "FEEDBACK_COMMENT").await;
    let mirrored = recv_event(&mut owner_rx, "FEEDBACK_COMMENT").await;
    assert_eq!(mirrored.data.unwrap()["comment"]["content"], json!("on it"));
}
