//! Upload session controller.
//!
//! `Idle -> FileSelected -> Uploading -> {Idle | FileSelected}`. One transfer
//! at a time per controller; every check that can fail locally runs before
//! the first byte is sent.

use crate::config::UploadSettings;
use crate::error::{PortalError, UploadError, ValidationError};
use crate::models::VideoAsset;
use crate::services::metrics;
use crate::services::reconciler::LifecycleReconciler;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// A local file the user picked for upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFile {
    pub path: PathBuf,
    pub file_name: String,
    pub media_type: String,
    pub size_bytes: u64,
}

impl CandidateFile {
    pub fn new(
        path: impl Into<PathBuf>,
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            path: path.into(),
            file_name: file_name.into(),
            media_type: media_type.into(),
            size_bytes,
        }
    }

    /// Describe a file on disk. The media type is taken from the extension.
    pub async fn from_path(path: impl Into<PathBuf>) -> Result<Self, UploadError> {
        let path = path.into();
        let unreadable = |reason: String| UploadError::Unreadable {
            path: path.display().to_string(),
            reason,
        };

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| unreadable(e.to_string()))?;
        if !metadata.is_file() {
            return Err(unreadable("not a regular file".to_string()));
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| unreadable("missing file name".to_string()))?;
        let media_type = media_type_for(&path).to_string();

        Ok(Self {
            size_bytes: metadata.len(),
            file_name,
            media_type,
            path,
        })
    }

    /// File name without its last extension.
    pub fn suggested_title(&self) -> String {
        Path::new(&self.file_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_name.clone())
    }
}

fn media_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" | "qt" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

/// Percentage of `sent` over `total`, rounded and clamped to `0..=100`.
pub fn progress_percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let sent = u128::from(sent.min(total));
    let total = u128::from(total);
    ((sent * 100 + total / 2) / total) as u8
}

/// Sink for transfer progress, handed to the transport for one attempt.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<dyn Fn(u64, u64) + Send + Sync>,
}

impl ProgressReporter {
    pub fn new(sink: impl Fn(u64, u64) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    pub fn report(&self, sent: u64, total: u64) {
        (self.sink)(sent, total);
    }
}

/// Sends the multipart upload to the asset registry.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn upload(
        &self,
        file: &CandidateFile,
        title: &str,
        progress: ProgressReporter,
    ) -> Result<VideoAsset, PortalError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPhase {
    #[default]
    Idle,
    FileSelected,
    Uploading,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatus {
    pub phase: UploadPhase,
    pub file: Option<CandidateFile>,
    pub suggested_title: Option<String>,
    pub progress: u8,
    pub last_error: Option<String>,
    #[serde(skip)]
    attempt: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Completed(VideoAsset),
    Cancelled,
}

pub struct UploadController {
    transport: Arc<dyn UploadTransport>,
    reconciler: Arc<LifecycleReconciler>,
    settings: UploadSettings,
    state: Arc<watch::Sender<UploadStatus>>,
    in_flight: Mutex<Option<CancellationToken>>,
    attempts: AtomicU64,
}

impl UploadController {
    pub fn new(
        transport: Arc<dyn UploadTransport>,
        reconciler: Arc<LifecycleReconciler>,
        settings: UploadSettings,
    ) -> Self {
        let (state, _) = watch::channel(UploadStatus::default());
        Self {
            transport,
            reconciler,
            settings,
            state: Arc::new(state),
            in_flight: Mutex::new(None),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn status(&self) -> UploadStatus {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadStatus> {
        self.state.subscribe()
    }

    pub fn is_uploading(&self) -> bool {
        self.slot().is_some()
    }

    /// Check a file against the allow-list and size ceiling.
    pub fn validate(&self, file: &CandidateFile) -> Result<(), ValidationError> {
        let allowed = self
            .settings
            .allowed_media_types
            .iter()
            .any(|media_type| media_type.eq_ignore_ascii_case(&file.media_type));
        if !allowed {
            return Err(ValidationError::UnsupportedFormat {
                media_type: file.media_type.clone(),
            });
        }

        if file.size_bytes > self.settings.max_file_size_bytes {
            return Err(ValidationError::FileTooLarge {
                size: file.size_bytes,
                limit: self.settings.max_file_size_bytes,
            });
        }

        Ok(())
    }

    /// Pick a file. Rejected files leave the previous selection in place.
    pub fn select(&self, file: CandidateFile) -> Result<UploadStatus, UploadError> {
        if self.is_uploading() {
            return Err(UploadError::AlreadyUploading);
        }

        if let Err(e) = self.validate(&file) {
            tracing::info!(file_name = %file.file_name, error = %e, "Rejected upload candidate");
            self.state
                .send_modify(|status| status.last_error = Some(e.to_string()));
            return Err(e.into());
        }

        self.state.send_modify(|status| {
            status.phase = UploadPhase::FileSelected;
            status.suggested_title = Some(file.suggested_title());
            status.file = Some(file);
            status.progress = 0;
            status.last_error = None;
        });
        Ok(self.status())
    }

    pub fn remove_file(&self) -> Result<(), UploadError> {
        if self.is_uploading() {
            return Err(UploadError::AlreadyUploading);
        }

        self.state.send_modify(|status| {
            *status = UploadStatus {
                attempt: status.attempt,
                ..UploadStatus::default()
            };
        });
        Ok(())
    }

    /// Validate and reserve the single transfer slot. The returned handle
    /// performs the transfer when run; dropping it cancels.
    pub fn start(
        self: &Arc<Self>,
        file: CandidateFile,
        title: &str,
    ) -> Result<PendingUpload, UploadError> {
        self.validate(&file)?;
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingTitle.into());
        }

        let cancel = CancellationToken::new();
        {
            let mut slot = self.slot();
            if slot.is_some() {
                return Err(UploadError::AlreadyUploading);
            }
            *slot = Some(cancel.clone());
        }
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        self.state.send_modify(|status| {
            status.phase = UploadPhase::Uploading;
            status.suggested_title = Some(file.suggested_title());
            status.file = Some(file.clone());
            status.progress = 0;
            status.last_error = None;
            status.attempt = attempt;
        });
        tracing::info!(
            attempt,
            file_name = %file.file_name,
            size_bytes = file.size_bytes,
            "Upload started"
        );

        Ok(PendingUpload {
            controller: Arc::clone(self),
            file,
            title: title.to_string(),
            attempt,
            cancel,
            settled: false,
        })
    }

    pub async fn submit(
        self: &Arc<Self>,
        file: CandidateFile,
        title: &str,
    ) -> Result<UploadOutcome, UploadError> {
        self.start(file, title)?.run().await
    }

    /// Abort the in-flight transfer. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        match self.slot().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reporter(&self, attempt: u64) -> ProgressReporter {
        let state = Arc::clone(&self.state);
        ProgressReporter::new(move |sent, total| {
            let percent = progress_percent(sent, total);
            state.send_if_modified(|status| {
                let advances = status.phase == UploadPhase::Uploading
                    && status.attempt == attempt
                    && percent > status.progress;
                if advances {
                    status.progress = percent;
                }
                advances
            });
        })
    }

    /// Leave `Uploading` for `phase`, unless a newer attempt owns the state.
    fn settle(&self, attempt: u64, phase: UploadPhase, last_error: Option<String>) {
        self.state.send_if_modified(|status| {
            if status.attempt != attempt || status.phase != UploadPhase::Uploading {
                return false;
            }
            status.phase = phase;
            status.progress = 0;
            status.last_error = last_error;
            if phase == UploadPhase::Idle {
                status.file = None;
                status.suggested_title = None;
            }
            true
        });
    }
}

/// A reserved transfer. Holds the controller's single-flight slot until it
/// completes or is dropped.
pub struct PendingUpload {
    controller: Arc<UploadController>,
    file: CandidateFile,
    title: String,
    attempt: u64,
    cancel: CancellationToken,
    settled: bool,
}

impl PendingUpload {
    pub async fn run(mut self) -> Result<UploadOutcome, UploadError> {
        let controller = Arc::clone(&self.controller);
        let reporter = controller.reporter(self.attempt);

        let result = tokio::select! {
            _ = self.cancel.cancelled() => None,
            result = controller.transport.upload(&self.file, &self.title, reporter) => Some(result),
        };

        match result {
            None => {
                self.settle_cancelled();
                Ok(UploadOutcome::Cancelled)
            }
            Some(Ok(asset)) => {
                tracing::info!(attempt = self.attempt, video_id = %asset.id, "Upload completed");
                controller.reconciler.insert(asset.clone()).await;
                controller.settle(self.attempt, UploadPhase::Idle, None);
                self.settled = true;
                metrics::record_upload("completed");
                Ok(UploadOutcome::Completed(asset))
            }
            Some(Err(e)) => {
                let err = UploadError::failed(e);
                tracing::warn!(attempt = self.attempt, error = %err, "Upload failed");
                controller.settle(self.attempt, UploadPhase::FileSelected, Some(err.to_string()));
                self.settled = true;
                metrics::record_upload("failed");
                Err(err)
            }
        }
    }

    fn settle_cancelled(&mut self) {
        tracing::info!(attempt = self.attempt, "Upload cancelled");
        self.controller
            .settle(self.attempt, UploadPhase::FileSelected, None);
        self.settled = true;
        metrics::record_upload("cancelled");
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        if !self.settled {
            self.settle_cancelled();
        }
        *self.controller.slot() = None;
    }
}
