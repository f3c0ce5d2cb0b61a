//! Video asset records and the status projection shown to users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Processing state, owned by the external transcoding pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, ProcessingStatus::Pending | ProcessingStatus::Processing)
    }
}

/// Moderation verdict. Only meaningful once processing has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityStatus {
    #[default]
    #[serde(alias = "pending")]
    Unset,
    Safe,
    Flagged,
}

fn sensitivity_or_unset<'de, D>(deserializer: D) -> Result<SensitivityStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<SensitivityStatus>::deserialize(deserializer)?.unwrap_or_default())
}

/// User-facing status derived from processing and moderation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    Processing,
    Safe,
    Flagged,
}

impl DisplayStatus {
    /// Merge the two upstream signals.
    ///
    /// A failed pipeline run is shown as `Flagged`; an unresolved moderation
    /// verdict on a completed asset is never shown as `Safe`.
    pub fn derive(processing: ProcessingStatus, sensitivity: SensitivityStatus) -> Self {
        match (processing, sensitivity) {
            (ProcessingStatus::Pending | ProcessingStatus::Processing, _) => {
                DisplayStatus::Processing
            }
            (ProcessingStatus::Failed, _) => DisplayStatus::Flagged,
            (ProcessingStatus::Completed, SensitivityStatus::Safe) => DisplayStatus::Safe,
            (ProcessingStatus::Completed, SensitivityStatus::Flagged) => DisplayStatus::Flagged,
            (ProcessingStatus::Completed, SensitivityStatus::Unset) => DisplayStatus::Processing,
        }
    }
}

/// Library filter tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Safe,
    Flagged,
    Processing,
}

impl StatusFilter {
    pub fn matches(&self, status: DisplayStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Safe => status == DisplayStatus::Safe,
            StatusFilter::Flagged => status == DisplayStatus::Flagged,
            StatusFilter::Processing => status == DisplayStatus::Processing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoAsset {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(alias = "owner", alias = "uploadedBy", alias = "userId")]
    pub owner_id: String,
    #[serde(default)]
    pub owner_email: Option<String>,
    #[serde(rename = "size", alias = "sizeBytes", default)]
    pub size_bytes: u64,
    #[serde(rename = "duration", alias = "durationSeconds", default)]
    pub duration_seconds: Option<f64>,
    pub uploaded_at: DateTime<Utc>,
    pub processing_status: ProcessingStatus,
    #[serde(default, deserialize_with = "sensitivity_or_unset")]
    pub sensitivity_status: SensitivityStatus,
    #[serde(alias = "originalName", default)]
    pub filename: String,
}

impl VideoAsset {
    pub fn display_status(&self) -> DisplayStatus {
        DisplayStatus::derive(self.processing_status, self.sensitivity_status)
    }

    pub fn is_owned_by(&self, identity_id: &str) -> bool {
        self.owner_id == identity_id
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum VideoEnvelope {
    Wrapped { video: VideoAsset },
    Bare(VideoAsset),
}

impl VideoEnvelope {
    pub(crate) fn into_inner(self) -> VideoAsset {
        match self {
            VideoEnvelope::Wrapped { video } => video,
            VideoEnvelope::Bare(video) => video,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum VideoListEnvelope {
    Wrapped { videos: Vec<VideoAsset> },
    Bare(Vec<VideoAsset>),
}

impl VideoListEnvelope {
    pub(crate) fn into_inner(self) -> Vec<VideoAsset> {
        match self {
            VideoListEnvelope::Wrapped { videos } => videos,
            VideoListEnvelope::Bare(videos) => videos,
        }
    }
}
