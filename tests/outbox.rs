//! Outbox Integration Tests
//!
//! The service publishing through a real JSONL outbox: ordering,
//! exactly-once delivery and completion notices from the download consumer.

use std::sync::Arc;

use capture::core::{CaptureService, DownloadCompleted, Outbox};
use capture::domain::{Aggregate, AggregateType, CorrelationId, DomainEvent};
use capture::platforms::{ingest, Captured};
use serde_json::json;
use tempfile::TempDir;

async fn service_with_outbox() -> (CaptureService<Captured>, Outbox, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let outbox = Outbox::open(temp_dir.path().join("outbox.jsonl"))
        .await
        .unwrap();
    let service = CaptureService::new(Arc::new(outbox.clone()));
    (service, outbox, temp_dir)
}

fn video(id: &str) -> Captured {
    ingest(
        AggregateType::Video,
        json!({
            "id": id,
            "channelId": "UC_x5XG1OV2P6uZZ5FSM9Ttw",
            "title": "Talk",
            "views": 1000
        }),
    )
    .unwrap()
}

fn kinds(events: &[DomainEvent]) -> Vec<&str> {
    events.iter().map(|e| e.event_kind()).collect()
}

#[tokio::test]
async fn test_full_download_flow_is_logged_in_order() {
    let (service, outbox, _temp) = service_with_outbox().await;

    service.capture(video("dQw4w9WgXcQ")).await.unwrap();
    service.request_download("dQw4w9WgXcQ").await.unwrap();
    service
        .complete_download(&DownloadCompleted {
            aggregate_id: "dQw4w9WgXcQ".to_string(),
            local_path: "/media/youtube/dQw4w9WgXcQ.mp4".to_string(),
            correlation_id: None,
        })
        .await
        .unwrap();

    let events = outbox.for_aggregate("dQw4w9WgXcQ").await.unwrap();
    assert_eq!(
        kinds(&events),
        vec!["video.captured", "video.download.requested", "video.downloaded"]
    );

    let downloaded = outbox.last_of_kind("video.downloaded").await.unwrap().unwrap();
    assert_eq!(downloaded.payload()["localPath"], "/media/youtube/dQw4w9WgXcQ.mp4");
}

#[tokio::test]
async fn test_replayed_notice_writes_nothing() {
    let (service, outbox, _temp) = service_with_outbox().await;
    service.capture(video("dQw4w9WgXcQ")).await.unwrap();

    let notice: DownloadCompleted = serde_json::from_value(json!({
        "aggregateId": "dQw4w9WgXcQ",
        "localPath": "/media/youtube/dQw4w9WgXcQ.mp4",
        "correlationId": CorrelationId::new()
    }))
    .unwrap();

    for _ in 0..3 {
        service.complete_download(&notice).await.unwrap();
    }

    let downloaded = outbox
        .find_events(|e| e.event_kind() == "video.downloaded")
        .await
        .unwrap();
    assert_eq!(downloaded.len(), 1);
    assert_eq!(downloaded[0].correlation_id(), notice.correlation_id.unwrap());
}

#[tokio::test]
async fn test_republishing_is_exactly_once() {
    let (_service, outbox, _temp) = service_with_outbox().await;
    let mut captured = video("9bZkp7q19f0");
    let events = captured.pull_domain_events();

    assert_eq!(outbox.append(&events).await.unwrap(), 1);
    assert_eq!(outbox.append(&events).await.unwrap(), 0);
    assert!(outbox.is_published(events[0].idempotency_key()).await.unwrap());
    assert_eq!(outbox.replay().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_commands_serialize_per_aggregate() {
    let (service, outbox, _temp) = service_with_outbox().await;
    let service = Arc::new(service);
    service.capture(video("dQw4w9WgXcQ")).await.unwrap();
    service.capture(video("9bZkp7q19f0")).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..10 {
        let service = Arc::clone(&service);
        let id = if i % 2 == 0 { "dQw4w9WgXcQ" } else { "9bZkp7q19f0" };
        tasks.push(tokio::spawn(async move {
            service.request_download(id).await.unwrap()
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // each request is a distinct attempt, so every event survives dedupe
    for id in ["dQw4w9WgXcQ", "9bZkp7q19f0"] {
        let attempts: Vec<u64> = outbox
            .for_aggregate(id)
            .await
            .unwrap()
            .iter()
            .filter(|e| e.event_kind() == "video.download.requested")
            .map(|e| e.payload()["attempt"].as_u64().unwrap())
            .collect();
        assert_eq!(attempts, vec![1, 2, 3, 4, 5]);
    }
}

#[tokio::test]
async fn test_outbox_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state").join("outbox.jsonl");

    {
        let outbox = Outbox::open(&path).await.unwrap();
        let service: CaptureService<Captured> = CaptureService::new(Arc::new(outbox));
        service.capture(video("kJQP7kiw5Fk")).await.unwrap();
    }

    let reopened = Outbox::open(&path).await.unwrap();
    let events = reopened.replay().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].aggregate_type(), AggregateType::Video);
}

#[tokio::test]
async fn test_unwritable_outbox_loses_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("outbox.jsonl");
    let outbox = Outbox::open(&path).await.unwrap();
    let service: CaptureService<Captured> = CaptureService::new(Arc::new(outbox.clone()));
    service.capture(video("dQw4w9WgXcQ")).await.unwrap();

    // a directory in the outbox's place makes every append fail
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();
    assert!(service.request_download("dQw4w9WgXcQ").await.is_err());
    assert!(service.request_download("dQw4w9WgXcQ").await.is_err());

    std::fs::remove_dir(&path).unwrap();
    let flushed = service.flush("dQw4w9WgXcQ").await.unwrap();
    assert_eq!(flushed.len(), 2);

    let events = outbox.replay().await.unwrap();
    assert_eq!(
        kinds(&events),
        vec!["video.download.requested", "video.download.requested"]
    );
    assert_eq!(events[0].payload()["attempt"], 1);
    assert_eq!(events[1].payload()["attempt"], 2);
}
