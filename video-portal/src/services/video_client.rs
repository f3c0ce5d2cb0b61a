//! Asset registry client for the `/videos` endpoints.

use crate::error::{PortalError, ValidationError};
use crate::models::video::{VideoEnvelope, VideoListEnvelope};
use crate::models::VideoAsset;
use crate::services::api_client::ApiClient;
use crate::services::reconciler::AssetRegistry;
use crate::services::upload::{CandidateFile, ProgressReporter, UploadTransport};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

pub struct VideoClient {
    api: Arc<ApiClient>,
}

#[derive(Serialize)]
struct TitleUpdate<'a> {
    title: &'a str,
}

impl VideoClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn list_videos(&self) -> Result<Vec<VideoAsset>, PortalError> {
        let envelope: VideoListEnvelope = self.api.get_json("/videos").await?;
        Ok(envelope.into_inner())
    }

    pub async fn get_video(&self, video_id: &str) -> Result<VideoAsset, PortalError> {
        let envelope: VideoEnvelope = self.api.get_json(&video_path(video_id)).await?;
        Ok(envelope.into_inner())
    }

    pub async fn update_title(&self, video_id: &str, title: &str) -> Result<VideoAsset, PortalError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingTitle.into());
        }

        let envelope: VideoEnvelope = self
            .api
            .put_json(&video_path(video_id), &TitleUpdate { title })
            .await?;
        Ok(envelope.into_inner())
    }

    pub async fn delete_video(&self, video_id: &str) -> Result<(), PortalError> {
        self.api.delete(&video_path(video_id)).await
    }
}

fn video_path(video_id: &str) -> String {
    format!("/videos/{}", urlencoding::encode(video_id))
}

#[async_trait]
impl AssetRegistry for VideoClient {
    async fn list(&self) -> Result<Vec<VideoAsset>, PortalError> {
        self.list_videos().await
    }

    async fn get(&self, video_id: &str) -> Result<VideoAsset, PortalError> {
        self.get_video(video_id).await
    }

    async fn update_title(&self, video_id: &str, title: &str) -> Result<VideoAsset, PortalError> {
        VideoClient::update_title(self, video_id, title).await
    }

    async fn delete(&self, video_id: &str) -> Result<(), PortalError> {
        self.delete_video(video_id).await
    }
}

#[async_trait]
impl UploadTransport for VideoClient {
    /// `POST /videos/upload` with the file streamed from disk as the `video`
    /// part. Progress is reported as chunks are handed to the connection.
    async fn upload(
        &self,
        file: &CandidateFile,
        title: &str,
        progress: ProgressReporter,
    ) -> Result<VideoAsset, PortalError> {
        let handle = tokio::fs::File::open(&file.path).await.map_err(|e| {
            tracing::error!(path = %file.path.display(), error = %e, "Failed to open upload source");
            PortalError::Transport(format!("Cannot read {}: {}", file.file_name, e))
        })?;

        let total = file.size_bytes;
        let mut sent: u64 = 0;
        let body = ReaderStream::new(handle).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                progress.report(sent, total);
            }
            chunk
        });

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(body), total)
            .file_name(file.file_name.clone())
            .mime_str(&file.media_type)?;
        let form = Form::new()
            .text("title", title.to_string())
            .part("video", part);

        let envelope: VideoEnvelope = self.api.post_multipart("/videos/upload", form).await?;
        Ok(envelope.into_inner())
    }
}
