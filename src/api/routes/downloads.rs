//! Download job and artifact handlers.

use super::{DownloadResponse, SuccessResponse};
use crate::api::AppState;
use crate::error::Error;
use crate::types::DownloadRequest;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /download - Download media and return the produced file
#[utoipa::path(
    post,
    path = "/download",
    tag = "downloads",
    request_body = crate::types::DownloadRequest,
    responses(
        (status = 200, description = "File downloaded", body = DownloadResponse),
        (status = 400, description = "Missing locator or formatId", body = crate::error::ApiError),
        (status = 404, description = "Tool succeeded but no file was found", body = crate::error::ApiError),
        (status = 500, description = "Tool failed", body = crate::error::ApiError),
        (status = 503, description = "Too many jobs or shutting down", body = crate::error::ApiError)
    )
)]
pub async fn start_download(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return Error::from(rejection).into_response(),
    };

    match state.downloader.download(request).await {
        Ok(artifact) => (
            StatusCode::OK,
            Json(DownloadResponse {
                success: true,
                file_name: artifact.file_name,
                file_path: artifact.file_path,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /download/:file_name - Delete a produced file
#[utoipa::path(
    delete,
    path = "/download/{file_name}",
    tag = "downloads",
    params(
        ("file_name" = String, Path, description = "File name returned by POST /download")
    ),
    responses(
        (status = 200, description = "File deleted", body = SuccessResponse),
        (status = 400, description = "Name contains '..', '/' or '\\'", body = crate::error::ApiError),
        (status = 404, description = "No such file", body = crate::error::ApiError),
        (status = 500, description = "Deletion failed", body = crate::error::ApiError)
    )
)]
pub async fn delete_download(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Response {
    match state.downloader.delete_artifact(&file_name).await {
        Ok(()) => (StatusCode::OK, Json(SuccessResponse { success: true })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /jobs - List in-flight jobs
#[utoipa::path(
    get,
    path = "/jobs",
    tag = "downloads",
    responses(
        (status = 200, description = "Queued and running jobs", body = Vec<crate::types::JobInfo>)
    )
)]
pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.downloader.list_jobs())
}

/// GET /formats - List recognized format ids
#[utoipa::path(
    get,
    path = "/formats",
    tag = "downloads",
    responses(
        (status = 200, description = "Format catalog", body = Vec<crate::format::FormatInfo>)
    )
)]
pub async fn list_formats() -> impl IntoResponse {
    Json(crate::format::catalog())
}
