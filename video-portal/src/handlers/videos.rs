//! Single-asset handlers: detail with playback link, rename, delete.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::models::VideoAsset;
use crate::services::reconciler::ReconciledAsset;
use crate::utils::format::{format_date, format_duration, format_file_size};
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetailResponse {
    #[serde(flatten)]
    pub video: ReconciledAsset,
    pub playback_url: String,
    pub duration_label: String,
    pub size_label: String,
    pub uploaded_on: String,
}

/// Fresh asset state plus a playback URL for the current session.
///
/// GET /api/videos/{id}
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<VideoDetailResponse>, AppError> {
    let playback_url = state.streams.authorized_playback_url(&video_id)?;
    let video = state.library.fetch(&video_id).await?;

    Ok(Json(VideoDetailResponse {
        duration_label: format_duration(video.asset.duration_seconds),
        size_label: format_file_size(video.asset.size_bytes),
        uploaded_on: format_date(video.asset.uploaded_at),
        playback_url,
        video,
    }))
}

/// PUT /api/videos/{id}
pub async fn rename_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<VideoAsset>, AppError> {
    let video = state.library.rename(&video_id, &req.title).await?;
    Ok(Json(video))
}

/// DELETE /api/videos/{id}
pub async fn delete_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.library.delete(&video_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
