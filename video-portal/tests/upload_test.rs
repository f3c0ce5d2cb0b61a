//! Upload flow end to end: local file, multipart transfer, hand-off to the
//! library.

mod common;

use axum::http::StatusCode;
use common::{video_json, TestPortal};
use serde_json::json;
use std::sync::{Arc, Mutex};
use video_portal::config::UploadSettings;
use video_portal::services::upload::{
    CandidateFile, ProgressReporter, UploadPhase, UploadTransport,
};
use video_portal::services::video_client::VideoClient;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn write_video(dir: &tempfile::TempDir, name: &str, size: usize) -> String {
    let path = dir.path().join(name);
    tokio::fs::write(&path, vec![7u8; size]).await.unwrap();
    path.display().to_string()
}

async fn mock_upload(portal: &TestPortal, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/api/videos/upload"))
        .and(header("authorization", "Bearer token-1"))
        .and(body_string_contains("name=\"title\""))
        .and(body_string_contains("Holiday"))
        .and(body_string_contains("filename=\"holiday.mp4\""))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "video": video_json("v9", "u1", "pending", None)
        })))
        .expect(expected)
        .mount(&portal.api)
        .await;
}

#[tokio::test]
async fn upload_runs_in_background_and_lands_in_library() {
    let portal = TestPortal::spawn().await;
    portal.sign_in("token-1", "u1", "editor");
    mock_upload(&portal, 1).await;
    let dir = tempfile::tempdir().unwrap();
    let file = write_video(&dir, "holiday.mp4", 64 * 1024).await;
    let mut status_rx = portal.state.uploads.subscribe();

    let (status, body) = portal
        .send_json("POST", "/api/upload", json!({ "path": file, "title": "Holiday" }))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["phase"], "uploading");

    status_rx
        .wait_for(|status| status.phase == UploadPhase::Idle)
        .await
        .unwrap();

    let asset = portal.state.library.cached("v9").await.unwrap();
    assert_eq!(asset.title, "Video v9");
    let (_, body) = portal.get("/api/upload").await;
    assert_eq!(body["phase"], "idle");
    assert_eq!(body["progress"], 0);
}

#[tokio::test]
async fn selecting_without_title_suggests_one() {
    let portal = TestPortal::spawn().await;
    portal.sign_in("token-1", "u1", "editor");
    let dir = tempfile::tempdir().unwrap();
    let file = write_video(&dir, "summer.trip.mov", 1024).await;

    let (status, body) = portal
        .send_json("POST", "/api/upload", json!({ "path": file }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "file_selected");
    assert_eq!(body["suggestedTitle"], "summer.trip");
    assert_eq!(body["file"]["mediaType"], "video/quicktime");

    let (status, body) = portal.send_empty("DELETE", "/api/upload").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], false);
    assert_eq!(portal.state.uploads.status().phase, UploadPhase::Idle);
}

#[tokio::test]
async fn oversized_file_is_rejected_before_transfer() {
    let portal = TestPortal::spawn_with_upload(UploadSettings {
        max_file_size_bytes: 1024,
        ..UploadSettings::default()
    })
    .await;
    portal.sign_in("token-1", "u1", "editor");
    mock_upload(&portal, 0).await;
    let dir = tempfile::tempdir().unwrap();
    let file = write_video(&dir, "holiday.mp4", 1025).await;

    let (status, body) = portal
        .send_json("POST", "/api/upload", json!({ "path": file, "title": "Holiday" }))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["details"].as_str().unwrap().contains("exceeds"));
}

#[tokio::test]
async fn unsupported_extension_is_rejected() {
    let portal = TestPortal::spawn().await;
    portal.sign_in("token-1", "u1", "editor");
    let dir = tempfile::tempdir().unwrap();
    let file = write_video(&dir, "notes.txt", 16).await;

    let (status, _) = portal
        .send_json("POST", "/api/upload", json!({ "path": file, "title": "Notes" }))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn transport_streams_file_and_reports_progress() {
    let portal = TestPortal::spawn().await;
    portal.sign_in("token-1", "u1", "editor");
    mock_upload(&portal, 1).await;
    let dir = tempfile::tempdir().unwrap();
    let file = write_video(&dir, "holiday.mp4", 256 * 1024).await;
    let candidate = CandidateFile::from_path(&file).await.unwrap();

    let api = Arc::new(
        video_portal::services::api_client::ApiClient::new(
            &video_portal::config::ApiSettings {
                base_url: format!("{}/api", portal.api.uri()),
                stream_base_url: None,
                request_timeout_secs: 5,
            },
            portal.state.credentials.clone(),
        )
        .unwrap(),
    );
    let client = VideoClient::new(api);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let reporter = ProgressReporter::new({
        let seen = seen.clone();
        move |sent, total| seen.lock().unwrap().push((sent, total))
    });

    let asset = client.upload(&candidate, "Holiday", reporter).await.unwrap();

    assert_eq!(asset.id, "v9");
    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert_eq!(*seen.last().unwrap(), (256 * 1024, 256 * 1024));
}

#[tokio::test]
async fn server_rejection_keeps_file_selected() {
    let portal = TestPortal::spawn().await;
    portal.sign_in("token-1", "u1", "editor");
    Mock::given(method("POST"))
        .and(path("/api/videos/upload"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "message": "Corrupt container" })),
        )
        .mount(&portal.api)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let file = write_video(&dir, "holiday.mp4", 1024).await;
    let candidate = CandidateFile::from_path(&file).await.unwrap();

    let err = portal
        .state
        .uploads
        .submit(candidate, "Holiday")
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Corrupt container");
    let status = portal.state.uploads.status();
    assert_eq!(status.phase, UploadPhase::FileSelected);
    assert_eq!(status.last_error.as_deref(), Some("Corrupt container"));
    assert_eq!(status.progress, 0);
}
