//! Lesson template application on first entry (spec §8 E2E scenario 1).

mod common;

use classroom_core::keys::encode_filename;
use classroom_core::metastore::Role;
use classroom_core::objectstore::ObjectStore;
use common::{recv_event, Harness};
use serde_json::json;
use std::io::Write;

fn build_template_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn entering_a_lesson_applies_its_template_once() {
    let harness = Harness::new();
    let big = vec![b'x'; 200];
    let zip_bytes = build_template_zip(&[("main.py", b"print('hello')"), ("big.bin", &big)]);
    let archive_key = "course/1/lesson/template.zip";
    harness.ctx.objects.put(archive_key, zip_bytes).await.unwrap();
    let lesson_id = harness.metadata.seed_lesson(1, Some(archive_key));
    harness.metadata.seed_participant(1, 100, Role::Student, "Alice");

    let mut rx = harness.connect_user("sid-1", 100).await;
    harness.init_lesson("sid-1", &mut rx, 1, lesson_id).await;

    harness.send("sid-1", "DIR_INFO", json!({"targetId": 100})).await;
    let listing = recv_event(&mut rx, "DIR_INFO").await;
    let files: Vec<String> = serde_json::from_value(listing.data.unwrap()["files"].clone()).unwrap();
    assert!(files.contains(&encode_filename("main.py")));
    assert!(files.contains(&encode_filename("big.bin")));

    harness.send("sid-1", "FILE_READ", json!({"ownerId": 100, "file": "main.py"})).await;
    let read = recv_event(&mut rx, "FILE_READ").await;
    let encoded = read.data.unwrap()["content"].as_str().unwrap().to_string();
    let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded).unwrap();
    assert_eq!(decoded, b"print('hello')");

    harness.send("sid-1", "FILE_READ", json!({"ownerId": 100, "file": "big.bin"})).await;
    let read = recv_event(&mut rx, "FILE_READ").await;
    let encoded = read.data.unwrap()["content"].as_str().unwrap().to_string();
    let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded).unwrap();
    assert_eq!(decoded.len(), 200);

    // The template is only applied once: a second INIT_LESSON does not
    // re-extract or duplicate entries.
    let mut rx2 = harness.connect_user("sid-1b", 100).await;
    harness.init_lesson("sid-1b", &mut rx2, 1, lesson_id).await;
    harness.send("sid-1b", "DIR_INFO", json!({"targetId": 100})).await;
    let listing = recv_event(&mut rx2, "DIR_INFO").await;
    let files: Vec<String> = serde_json::from_value(listing.data.unwrap()["files"].clone()).unwrap();
    let main_py = encode_filename("main.py");
    assert_eq!(files.iter().filter(|f| **f == main_py).count(), 1);
}
