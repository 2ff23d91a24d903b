//! `FILE_CREATE`, `FILE_SAVE`, `FILE_READ`, `FILE_UPDATE`, `FILE_DELETE`,
//! `DIR_INFO` end-to-end against a fully in-memory backend (spec §8 E2E
//! scenarios 4 "size cap" and 5 "rename with code references").

mod common;

use classroom_core::keys::encode_filename;
use classroom_core::kv::KvStore;
use classroom_core::metastore::Role;
use common::{recv_event, settle, Harness};
use serde_json::json;

#[tokio::test]
async fn create_save_and_read_round_trip_through_the_hot_tier() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    harness.metadata.seed_participant(1, 100, Role::Student, "Alice");

    let mut rx = harness.connect_user("sid-1", 100).await;
    harness.init_lesson("sid-1", &mut rx, 1, lesson_id).await;

    harness.send("sid-1", "FILE_CREATE", json!({"ownerId": 100, "type": "file", "name": "main.py", "content": "print(1)"})).await;
    let created = recv_event(&mut rx, "FILE_CREATE").await;
    assert_eq!(created.data.unwrap()["name"], json!("main.py"));

    harness.send("sid-1", "DIR_INFO", json!({"targetId": 100})).await;
    let listing = recv_event(&mut rx, "DIR_INFO").await;
    let files: Vec<String> = serde_json::from_value(listing.data.unwrap()["files"].clone()).unwrap();
    assert!(files.contains(&encode_filename("main.py")));

    harness.send("sid-1", "FILE_SAVE", json!({"ownerId": 100, "file": "main.py", "content": "print(2)"})).await;
    recv_event(&mut rx, "FILE_SAVE").await;

    harness.send("sid-1", "FILE_READ", json!({"ownerId": 100, "file": "main.py"})).await;
    let read = recv_event(&mut rx, "FILE_READ").await;
    let encoded = read.data.unwrap()["content"].as_str().unwrap().to_string();
    let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded).unwrap();
    assert_eq!(decoded, b"print(2)");
}

#[tokio::test]
async fn create_on_an_existing_name_fails() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    harness.metadata.seed_participant(1, 100, Role::Student, "Alice");
    let mut rx = harness.connect_user("sid-1", 100).await;
    harness.init_lesson("sid-1", &mut rx, 1, lesson_id).await;

    harness.send("sid-1", "FILE_CREATE", json!({"ownerId": 100, "type": "file", "name": "a.py", "content": "x"})).await;
    recv_event(&mut rx, "FILE_CREATE").await;

    harness.send("sid-1", "FILE_CREATE", json!({"ownerId": 100, "type": "file", "name": "a.py", "content": "y"})).await;
    let err = recv_event(&mut rx, "ERROR").await;
    assert_eq!(err.data.unwrap()["error"], json!("FILE_EXISTS"));
}

#[tokio::test]
async fn a_viewer_without_write_cannot_save() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    harness.metadata.seed_participant(1, 100, Role::Student, "Alice");
    harness.metadata.seed_participant(1, 200, Role::Student, "Bob");

    let mut owner_rx = harness.connect_user("sid-owner", 100).await;
    harness.init_lesson("sid-owner", &mut owner_rx, 1, lesson_id).await;
    let mut viewer_rx = harness.connect_user("sid-viewer", 200).await;
    harness.init_lesson("sid-viewer", &mut viewer_rx, 1, lesson_id).await;

    // Grant READ only, no WRITE.
    harness.send("sid-owner", "PROJECT_PERM", json!([{"targetId": 200, "permission": 4}])).await;
    recv_event(&mut owner_rx, "PROJECT_PERM").await;
    settle().await;

    harness
        .send("sid-viewer", "FILE_SAVE", json!({"ownerId": 100, "file": "x.py", "content": "x"}))
        .await;
    let err = recv_event(&mut viewer_rx, "ERROR").await;
    assert_eq!(err.data.unwrap()["error"], json!("FORBIDDEN_PROJECT"));
}

#[tokio::test]
async fn file_save_rejects_content_that_would_exceed_the_project_cap() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    harness.metadata.seed_participant(1, 100, Role::Student, "Alice");
    let mut rx = harness.connect_user("sid-1", 100).await;
    harness.init_lesson("sid-1", &mut rx, 1, lesson_id).await;

    // The configured cap is 512MiB by default; seed the size counter
    // directly so the scenario doesn't need gigabytes of real content.
    let key = format!("crs:1:{lesson_id}:100:size");
    harness.ctx.kv.set(&key, b"530000000").await.unwrap();

    let big_content = "x".repeat(10_000_000);
    harness
        .send("sid-1", "FILE_SAVE", json!({"ownerId": 100, "file": "big.bin", "content": big_content}))
        .await;
    let err = recv_event(&mut rx, "ERROR").await;
    assert_eq!(err.data.unwrap()["error"], json!("TOTAL_SIZE_EXCEEDED"));

    harness.send("sid-1", "DIR_INFO", json!({"targetId": 100})).await;
    let listing = recv_event(&mut rx, "DIR_INFO").await;
    let files: Vec<String> = serde_json::from_value(listing.data.unwrap()["files"].clone()).unwrap();
    assert!(!files.contains(&encode_filename("big.bin")));
}

#[tokio::test]
async fn renaming_a_directory_rewrites_code_references_onto_the_new_path() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    harness.metadata.seed_participant(1, 100, Role::Student, "Alice");
    let mut rx = harness.connect_user("sid-1", 100).await;
    harness.init_lesson("sid-1", &mut rx, 1, lesson_id).await;

    harness.send("sid-1", "FILE_CREATE", json!({"ownerId": 100, "type": "directory", "name": "a"})).await;
    recv_event(&mut rx, "FILE_CREATE").await;
    harness.send("sid-1", "FILE_CREATE", json!({"ownerId": 100, "type": "file", "name": "a/b.py", "content": "x"})).await;
    recv_event(&mut rx, "FILE_CREATE").await;

    harness
        .send(
            "sid-1",
            "FEEDBACK_ADD",
            json!({"ref": {"ownerId": 100, "file": "a/b.py", "line": "3-4"}, "acl": [], "comment": "please fix"}),
        )
        .await;
    recv_event(&mut rx, "FEEDBACK_ADD").await;

    harness
        .send("sid-1", "FILE_UPDATE", json!({"ownerId": 100, "type": "directory", "name": "a", "rename": "z"}))
        .await;
    recv_event(&mut rx, "FILE_UPDATE").await;

    harness.send("sid-1", "FEEDBACK_LIST", json!({})).await;
    let rollup = recv_event(&mut rx, "FEEDBACK_LIST").await;
    let data = rollup.data.unwrap();
    let threads = data["feedback"].as_array().unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0]["file"], json!("z/b.py"));
}

#[tokio::test]
async fn deleting_a_file_removes_it_from_the_listing() {
    let harness = Harness::new();
    let lesson_id = harness.metadata.seed_lesson(1, None);
    harness.metadata.seed_participant(1, 100, Role::Student, "Alice");
    let mut rx = harness.connect_user("sid-1", 100).await;
    harness.init_lesson("sid-1", &mut rx, 1, lesson_id).await;

    harness.send("sid-1", "FILE_CREATE", json!({"ownerId": 100, "type": "file", "name": "temp.py", "content": "x"})).await;
    recv_event(&mut rx, "FILE_CREATE").await;

    harness.send("sid-1", "FILE_DELETE", json!({"ownerId": 100, "type": "file", "name": "temp.py"})).await;
    recv_event(&mut rx, "FILE_DELETE").await;

    harness.send("sid-1", "DIR_INFO", json!({"targetId": 100})).await;
    let listing = recv_event(&mut rx, "DIR_INFO").await;
    let files: Vec<String> = serde_json::from_value(listing.data.unwrap()["files"].clone()).unwrap();
    assert!(!files.contains(&encode_filename("temp.py")));
}
