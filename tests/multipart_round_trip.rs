//! End-to-end transfer tests against an in-memory fake storage service
//!
//! These tests drive the public [`Blazer`] API through both transfer paths:
//! - Small files: one upload request, one download request
//! - Large files: start / parallel parts / finish, then parallel ranged
//!   downloads reassembled in part order
//!
//! # Running the tests
//!
//! ```bash
//! cargo test --test multipart_round_trip
//! ```

mod common;

use blazer::checksum::{sha1_bytes, sha1_file};
use blazer::{Direction, Error, Event, TransferError};
use common::{
    FakeStorage, TEST_BUCKET, TEST_MIN_PART_SIZE, create_test_client, generate_content, write_file,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn large_file_round_trips_through_multipart_paths() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (server, fake) = FakeStorage::start().await;
    let client = create_test_client(&server, &temp_dir, 3);

    // 5.5 minimum parts -> 5 parts, the last one absorbing the remainder
    let data = generate_content(5_500);
    let source = write_file(temp_dir.path(), "source.bin", &data);

    let uploaded = client
        .upload_file(TEST_BUCKET, &source, "dir/source.bin", "application/octet-stream", None)
        .await
        .unwrap();

    assert_eq!(fake.part_uploads(), 5);
    assert_eq!(fake.part_url_requests(), 5);
    assert_eq!(fake.finish_calls(), 1);
    assert_eq!(fake.cancel_calls(), 0);
    assert_eq!(fake.stored_content(&uploaded.file_id).unwrap(), data);

    let destination = temp_dir.path().join("downloaded.bin");
    let info = client
        .download_file_by_id(&uploaded.file_id, &destination, Some(4))
        .await
        .unwrap();

    assert_eq!(info.content_length, 5_500);
    assert_eq!(fake.ranged_downloads(), 5);
    assert_eq!(std::fs::read(&destination).unwrap(), data);
    assert_eq!(sha1_file(&destination).unwrap(), sha1_file(&source).unwrap());
    assert!(
        !temp_dir.path().join("downloaded.bin.download").exists(),
        "scratch directory should be gone after coalescing"
    );
}

#[tokio::test]
async fn small_file_round_trips_through_single_requests() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (server, fake) = FakeStorage::start().await;
    let client = create_test_client(&server, &temp_dir, 2);

    let data = generate_content((2 * TEST_MIN_PART_SIZE - 1) as usize);
    let source = write_file(temp_dir.path(), "small.bin", &data);

    let uploaded = client
        .upload_file(TEST_BUCKET, &source, "small.bin", "b2/x-auto", None)
        .await
        .unwrap();

    assert_eq!(fake.part_uploads(), 0, "small files never use the multipart path");
    assert_eq!(uploaded.content_sha1.as_deref(), Some(sha1_bytes(&data).as_str()));

    let destination = temp_dir.path().join("small.out");
    client
        .download_file_by_id(&uploaded.file_id, &destination, None)
        .await
        .unwrap();

    assert_eq!(fake.ranged_downloads(), 0);
    assert_eq!(std::fs::read(&destination).unwrap(), data);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transient_part_failures_are_retried_with_fresh_urls() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (server, fake) = FakeStorage::start().await;
    let client = create_test_client(&server, &temp_dir, 2);

    let data = generate_content(3_000);
    let source = write_file(temp_dir.path(), "flaky.bin", &data);
    fake.fail_next_part_uploads(2);

    let uploaded = client
        .upload_file(TEST_BUCKET, &source, "flaky.bin", "b2/x-auto", None)
        .await
        .unwrap();

    assert_eq!(fake.part_uploads(), 3);
    assert_eq!(fake.part_url_requests(), 5, "one part URL per attempt");
    assert_eq!(fake.stored_content(&uploaded.file_id).unwrap(), data);
}

#[tokio::test]
async fn exhausted_retries_fail_the_upload_without_commit() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (server, fake) = FakeStorage::start().await;
    let client = create_test_client(&server, &temp_dir, 1);

    let data = generate_content(2_000);
    let source = write_file(temp_dir.path(), "doomed.bin", &data);
    // Enough failures to exhaust every attempt of both parts
    fake.fail_next_part_uploads(100);

    let err = client
        .upload_file(TEST_BUCKET, &source, "doomed.bin", "b2/x-auto", None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Transfer(TransferError::PartsFailed { failed: 2, total: 2, .. })
    ));
    assert_eq!(fake.finish_calls(), 0);
    assert_eq!(fake.part_url_requests(), 10, "five attempts per part");
    assert_eq!(fake.cancel_calls(), 1);
    assert_eq!(fake.open_large_files(), 0, "the abandoned large file is cancelled");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn events_describe_the_transfer() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (server, _fake) = FakeStorage::start().await;
    let client = create_test_client(&server, &temp_dir, 2);
    let mut events = client.subscribe();

    let data = generate_content(4_200);
    let source = write_file(temp_dir.path(), "evented.bin", &data);

    let uploaded = client
        .upload_file(TEST_BUCKET, &source, "evented.bin", "b2/x-auto", None)
        .await
        .unwrap();

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    assert!(matches!(
        received.first(),
        Some(Event::TransferStarted { direction: Direction::Upload, parts: 4, total_bytes: 4_200, .. })
    ));
    let completed_parts = received
        .iter()
        .filter(|e| matches!(e, Event::PartCompleted { .. }))
        .count();
    assert_eq!(completed_parts, 4);
    match received.last() {
        Some(Event::TransferComplete { file_id, .. }) => assert_eq!(file_id, &uploaded.file_id),
        other => panic!("expected TransferComplete last, got {other:?}"),
    }
}
