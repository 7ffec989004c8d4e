//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`downloads`] - Download jobs, artifact deletion, format catalog
//! - [`system`] - Health, events, OpenAPI

use serde::{Deserialize, Serialize};

mod downloads;
mod system;

pub use downloads::*;
pub use system::*;

// ============================================================================
// Response Types (shared across handlers)
// ============================================================================

/// Body of a successful `POST /download`
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    /// Always `true`
    pub success: bool,
    /// File name inside the shared output directory
    pub file_name: String,
    /// URL path the file is served from
    pub file_path: String,
}

/// Body of a successful operation without payload
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SuccessResponse {
    /// Always `true`
    pub success: bool,
}

/// Body of `GET /health`
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `"ok"` while accepting jobs, `"shutting_down"` afterwards
    pub status: String,
    /// Crate version
    pub version: String,
    /// Host environment the invocation strategy targets
    pub environment: crate::environment::EnvironmentKind,
    /// Jobs queued or running
    pub in_flight: usize,
}
