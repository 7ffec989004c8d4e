//! Custom test assertions for end-to-end tests

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use std::path::Path;

/// Response status and JSON body
pub async fn into_json(response: Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// `POST` a JSON body
pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

/// `DELETE` a URI
pub fn delete_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

/// Names of the visible files in a directory
pub fn visible_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("Failed to read dir")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    names
}

/// Assert the scratch area holds no job directories
pub fn assert_no_scratch_left(output_dir: &Path) {
    let scratch = output_dir.join(".jobs");
    if scratch.exists() {
        let left: Vec<_> = std::fs::read_dir(&scratch)
            .expect("Failed to read scratch dir")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name())
            .collect();
        assert!(left.is_empty(), "scratch directories left behind: {left:?}");
    }
}
