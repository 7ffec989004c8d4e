//! End-to-end tests: HTTP requests through the router, the real process runner and a
//! fake extraction tool run by `/bin/sh`.
#![cfg(unix)]

mod common;

use common::*;
use media_dl::Event;
use media_dl::api::create_router;
use std::time::Duration;
use tower::ServiceExt;

/// Drain events already broadcast
fn drain(events: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    received
}

#[tokio::test]
async fn test_reported_path_download_is_served() {
    let (downloader, _temp_dir) = create_downloader(WRITES_TEMPLATE).await;
    let app = create_router(downloader.clone(), downloader.get_config());
    let mut events = downloader.subscribe();

    let (status, json) = into_json(
        app.clone()
            .oneshot(post_json(
                "/download",
                r#"{"locator": "https://www.youtube.com/watch?v=dQw4w9WgXcQ", "formatId": "audio"}"#,
            ))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, 200, "body: {json}");
    assert_eq!(json["success"], true);
    let file_name = json["fileName"].as_str().unwrap().to_string();
    assert!(file_name.starts_with("dQw4w9WgXcQ"), "got {file_name}");
    assert!(file_name.ends_with(".m4a"));

    let resolved = drain(&mut events).into_iter().find_map(|event| match event {
        Event::ArtifactResolved { tier, .. } => Some(tier),
        _ => None,
    });
    assert_eq!(resolved.as_deref(), Some("reported_path"));

    let file_path = json["filePath"].as_str().unwrap();
    let response = app
        .oneshot(
            axum::http::Request::builder()
                .uri(file_path)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"media");

    assert_no_scratch_left(downloader.get_config().output_dir());
}

#[tokio::test]
async fn test_unreported_file_found_by_recency() {
    let (downloader, _temp_dir) = create_downloader(REPORTS_BOGUS_PATH).await;
    let app = create_router(downloader.clone(), downloader.get_config());
    let mut events = downloader.subscribe();

    let (status, json) = into_json(
        app.oneshot(post_json("/download", r#"{"locator": "abc", "formatId": "audio"}"#))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, 200, "body: {json}");
    assert_eq!(json["fileName"], "Some Title.m4a");
    assert_eq!(json["filePath"], "/downloads/Some Title.m4a");

    let resolved = drain(&mut events).into_iter().find_map(|event| match event {
        Event::ArtifactResolved { tier, .. } => Some(tier),
        _ => None,
    });
    assert_eq!(resolved.as_deref(), Some("recent"));

    let output_dir = downloader.get_config().output_dir().clone();
    assert_eq!(visible_files(&output_dir), vec!["Some Title.m4a".to_string()]);
}

#[tokio::test]
async fn test_tool_failure_is_500_without_resolution() {
    let (downloader, _temp_dir) = create_downloader(FAILS).await;
    let app = create_router(downloader.clone(), downloader.get_config());
    let mut events = downloader.subscribe();

    let (status, json) = into_json(
        app.oneshot(post_json(
            "/download",
            r#"{"locator": "https://www.youtube.com/watch?v=xxxxxxxxxxx", "formatId": "video-hd"}"#,
        ))
        .await
        .unwrap(),
    )
    .await;

    assert_eq!(status, 500);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "process_failed");
    assert!(json["error"].as_str().unwrap().contains("Video unavailable"));

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(e, Event::JobFailed { .. })));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, Event::ArtifactResolved { .. } | Event::ResolutionMissed { .. }))
    );
    assert!(visible_files(downloader.get_config().output_dir()).is_empty());
}

#[tokio::test]
async fn test_partial_output_is_discarded_on_failure() {
    let (downloader, _temp_dir) = create_downloader(LEAVES_PARTIAL).await;
    let app = create_router(downloader.clone(), downloader.get_config());

    let (status, _json) = into_json(
        app.oneshot(post_json("/download", r#"{"locator": "abc", "formatId": "audio"}"#))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, 500);
    let output_dir = downloader.get_config().output_dir().clone();
    assert!(visible_files(&output_dir).is_empty());
    assert_no_scratch_left(&output_dir);
}

#[tokio::test]
async fn test_success_without_output_is_404() {
    let (downloader, _temp_dir) = create_downloader(PRODUCES_NOTHING).await;
    let app = create_router(downloader.clone(), downloader.get_config());

    let (status, json) = into_json(
        app.oneshot(post_json("/download", r#"{"locator": "abc", "formatId": "best"}"#))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, 404);
    assert_eq!(json["code"], "resolution_miss");
}

#[tokio::test]
async fn test_delete_then_delete_again() {
    let (downloader, _temp_dir) = create_downloader(WRITES_TEMPLATE).await;
    let app = create_router(downloader.clone(), downloader.get_config());

    let (status, json) = into_json(
        app.clone()
            .oneshot(post_json("/download", r#"{"locator": "abc", "formatId": "audio"}"#))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 200, "body: {json}");
    let file_name = json["fileName"].as_str().unwrap().to_string();
    let output_dir = downloader.get_config().output_dir().clone();
    assert!(output_dir.join(&file_name).is_file());

    let uri = format!("/download/{file_name}");
    let (status, json) = into_json(app.clone().oneshot(delete_request(&uri)).await.unwrap()).await;
    assert_eq!(status, 200);
    assert_eq!(json["success"], true);
    assert!(!output_dir.join(&file_name).exists());

    let (status, json) = into_json(app.oneshot(delete_request(&uri)).await.unwrap()).await;
    assert_eq!(status, 404);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_repeated_download_gets_distinct_name() {
    // The tool names both files identically; promotion must keep the first one
    let (downloader, _temp_dir) = create_downloader(REPORTS_BOGUS_PATH).await;
    let app = create_router(downloader.clone(), downloader.get_config());

    let mut names = Vec::new();
    for _ in 0..2 {
        let (status, json) = into_json(
            app.clone()
                .oneshot(post_json("/download", r#"{"locator": "abc", "formatId": "audio"}"#))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(status, 200, "body: {json}");
        names.push(json["fileName"].as_str().unwrap().to_string());
    }

    assert_eq!(names[0], "Some Title.m4a");
    assert_eq!(names[1], "Some Title_1.m4a");
    assert_eq!(
        visible_files(downloader.get_config().output_dir()),
        vec!["Some Title.m4a".to_string(), "Some Title_1.m4a".to_string()]
    );
}

#[tokio::test]
async fn test_shared_directory_mode() {
    let (downloader, _temp_dir) =
        create_downloader_with(WRITES_TEMPLATE, |config| config.download.isolate_jobs = false)
            .await;
    let app = create_router(downloader.clone(), downloader.get_config());

    let (status, json) = into_json(
        app.oneshot(post_json("/download", r#"{"locator": "abc", "formatId": "video-sd"}"#))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, 200, "body: {json}");
    let output_dir = downloader.get_config().output_dir().clone();
    assert!(!output_dir.join(".jobs").exists());
    assert_eq!(visible_files(&output_dir).len(), 1);
}

#[tokio::test]
async fn test_sweep_removes_expired_downloads() {
    let (downloader, _temp_dir) = create_downloader_with(WRITES_TEMPLATE, |config| {
        config.lifecycle.max_age = Duration::from_millis(1);
    })
    .await;

    let artifact = downloader
        .download(media_dl::DownloadRequest::new("abc", "audio"))
        .await
        .unwrap();
    let output_dir = downloader.get_config().output_dir().clone();
    assert!(output_dir.join(&artifact.file_name).is_file());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let report = downloader.sweep_now().await.unwrap();

    assert_eq!(report.deleted, vec![artifact.file_name.clone()]);
    assert!(visible_files(&output_dir).is_empty());
}
