//! Upload session handlers.
//!
//! The transfer runs in the background; clients follow it through
//! `GET /api/upload`.

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::services::upload::{CandidateFile, UploadOutcome, UploadStatus};
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    /// Local path of the video file.
    pub path: String,
    /// Omit to only select the file and get a suggested title back.
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// GET /api/upload
pub async fn upload_status(State(state): State<AppState>) -> Json<UploadStatus> {
    Json(state.uploads.status())
}

/// Select a file, or select and start uploading it when a title is given.
///
/// POST /api/upload
pub async fn upload_handler(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> Result<(StatusCode, Json<UploadStatus>), AppError> {
    let file = CandidateFile::from_path(&req.path).await?;

    let Some(title) = req.title else {
        let status = state.uploads.select(file)?;
        return Ok((StatusCode::OK, Json(status)));
    };

    let pending = state.uploads.start(file, &title)?;
    tokio::spawn(async move {
        match pending.run().await {
            Ok(UploadOutcome::Completed(video)) => {
                tracing::debug!(video_id = %video.id, "Background upload finished");
            }
            Ok(UploadOutcome::Cancelled) => {}
            Err(e) => tracing::debug!(error = %e, "Background upload failed"),
        }
    });

    Ok((StatusCode::ACCEPTED, Json(state.uploads.status())))
}

/// Cancel the running transfer, or drop the selected file when idle.
///
/// DELETE /api/upload
pub async fn cancel_upload(
    State(state): State<AppState>,
) -> Result<Json<CancelResponse>, AppError> {
    if state.uploads.cancel() {
        return Ok(Json(CancelResponse { cancelled: true }));
    }

    state.uploads.remove_file()?;
    Ok(Json(CancelResponse { cancelled: false }))
}
