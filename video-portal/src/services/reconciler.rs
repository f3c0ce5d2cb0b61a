//! Lifecycle reconciler: owns the local asset cache and merges processing and
//! moderation state into the status users see.
//!
//! Every fetch and every confirmed mutation takes a sequence number. A fetch
//! result is applied only when its number is newer than the last applied one,
//! so a slow response can never overwrite fresher data. Failed fetches leave
//! the cached assets untouched.

use crate::error::{PortalError, ValidationError};
use crate::models::{DisplayStatus, Identity, ProcessingStatus, StatusFilter, VideoAsset};
use crate::services::credential_store::CredentialStore;
use crate::services::policy::{self, Action};
use crate::utils::format::format_time_ago;
use crate::utils::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// CRUD surface of the asset registry.
#[async_trait]
pub trait AssetRegistry: Send + Sync {
    async fn list(&self) -> Result<Vec<VideoAsset>, PortalError>;
    async fn get(&self, video_id: &str) -> Result<VideoAsset, PortalError>;
    async fn update_title(&self, video_id: &str, title: &str) -> Result<VideoAsset, PortalError>;
    async fn delete(&self, video_id: &str) -> Result<(), PortalError>;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: StatusFilter,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledAsset {
    #[serde(flatten)]
    pub asset: VideoAsset,
    pub display_status: DisplayStatus,
    /// The pipeline gave up on this asset. Shown as `Flagged`, but a UI may
    /// want to tell it apart from a moderation decision.
    pub processing_failed: bool,
}

impl From<VideoAsset> for ReconciledAsset {
    fn from(asset: VideoAsset) -> Self {
        Self {
            display_status: asset.display_status(),
            processing_failed: asset.processing_status == ProcessingStatus::Failed,
            asset,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentUpload {
    #[serde(flatten)]
    pub video: ReconciledAsset,
    pub uploaded_ago: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryStats {
    pub total: usize,
    pub processing: usize,
    pub completed: usize,
    pub flagged: usize,
    pub total_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryState {
    pub loaded: bool,
    pub last_error: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// A newer fetch or mutation already landed; this response was dropped.
    Stale,
}

#[derive(Default)]
struct Cache {
    assets: Vec<VideoAsset>,
    applied_seq: u64,
    loaded: bool,
    last_error: Option<String>,
    refreshed_at: Option<DateTime<Utc>>,
}

const LOAD_FAILED_MESSAGE: &str = "Failed to load videos";

pub struct LifecycleReconciler {
    registry: Arc<dyn AssetRegistry>,
    credentials: Arc<CredentialStore>,
    clock: Arc<dyn Clock>,
    cache: RwLock<Cache>,
    next_seq: AtomicU64,
}

impl LifecycleReconciler {
    pub fn new(
        registry: Arc<dyn AssetRegistry>,
        credentials: Arc<CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            credentials,
            clock,
            cache: RwLock::new(Cache::default()),
            next_seq: AtomicU64::new(0),
        }
    }

    fn issue_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Fetch the asset list and apply it unless a newer result already has.
    pub async fn refresh(&self) -> Result<RefreshOutcome, PortalError> {
        let seq = self.issue_seq();
        let result = self.registry.list().await;

        let mut cache = self.cache.write().await;
        match result {
            Ok(assets) if seq > cache.applied_seq => {
                tracing::debug!(seq, count = assets.len(), "Applied asset list");
                cache.applied_seq = seq;
                cache.assets = assets;
                cache.loaded = true;
                cache.last_error = None;
                cache.refreshed_at = Some(self.clock.now());
                Ok(RefreshOutcome::Applied)
            }
            Ok(_) => {
                tracing::debug!(seq, applied = cache.applied_seq, "Discarded stale asset list");
                Ok(RefreshOutcome::Stale)
            }
            Err(e) => {
                tracing::warn!(seq, error = %e, retryable = e.is_retryable(), "Asset list fetch failed");
                if seq > cache.applied_seq {
                    cache.last_error = Some(e.user_message(LOAD_FAILED_MESSAGE));
                }
                Err(e)
            }
        }
    }

    /// Cached assets matching `query`, in fetch order.
    pub async fn view(&self, query: &LibraryQuery) -> Vec<ReconciledAsset> {
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let cache = self.cache.read().await;
        cache
            .assets
            .iter()
            .filter(|asset| query.status.matches(asset.display_status()))
            .filter(|asset| match &needle {
                Some(needle) => matches_search(asset, needle),
                None => true,
            })
            .cloned()
            .map(ReconciledAsset::from)
            .collect()
    }

    /// Newest uploads first. Equal timestamps keep fetch order.
    pub async fn recent(&self, limit: usize) -> Vec<RecentUpload> {
        let now = self.clock.now();
        let mut assets = self.cache.read().await.assets.clone();
        // stable sort
        assets.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));

        assets
            .into_iter()
            .take(limit)
            .map(|asset| RecentUpload {
                uploaded_ago: format_time_ago(now, asset.uploaded_at),
                video: asset.into(),
            })
            .collect()
    }

    pub async fn stats(&self) -> LibraryStats {
        let cache = self.cache.read().await;
        let mut stats = LibraryStats {
            total: cache.assets.len(),
            ..Default::default()
        };
        let mut seconds = 0.0;

        for asset in &cache.assets {
            if asset.processing_status.is_in_flight() {
                stats.processing += 1;
            }
            if asset.processing_status == ProcessingStatus::Completed {
                stats.completed += 1;
            }
            if asset.display_status() == DisplayStatus::Flagged {
                stats.flagged += 1;
            }
            seconds += asset.duration_seconds.unwrap_or(0.0);
        }

        stats.total_hours = (seconds / 3600.0 * 10.0).round() / 10.0;
        stats
    }

    pub async fn state(&self) -> LibraryState {
        let cache = self.cache.read().await;
        LibraryState {
            loaded: cache.loaded,
            last_error: cache.last_error.clone(),
            refreshed_at: cache.refreshed_at,
        }
    }

    pub async fn cached(&self, video_id: &str) -> Option<VideoAsset> {
        self.cache
            .read()
            .await
            .assets
            .iter()
            .find(|asset| asset.id == video_id)
            .cloned()
    }

    /// Fetch one asset and fold it into the cache.
    pub async fn fetch(&self, video_id: &str) -> Result<ReconciledAsset, PortalError> {
        match self.registry.get(video_id).await {
            Ok(asset) => {
                self.upsert(asset.clone()).await;
                Ok(asset.into())
            }
            Err(e) => Err(self.reconcile_failure(video_id, e).await),
        }
    }

    /// Hand-off from a completed upload.
    pub async fn insert(&self, asset: VideoAsset) {
        tracing::info!(video_id = %asset.id, "Registered uploaded asset");
        self.upsert(asset).await;
    }

    pub async fn rename(&self, video_id: &str, title: &str) -> Result<VideoAsset, PortalError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingTitle.into());
        }

        let actor = self.actor()?;
        let asset = self.lookup(video_id).await?;
        if !policy::can_rename(&actor, &asset) {
            let action = if asset.is_owned_by(&actor.id) {
                Action::EditOwnTitle
            } else {
                Action::EditAnyTitle
            };
            return Err(PortalError::NotPermitted(action));
        }

        match self.registry.update_title(video_id, title).await {
            Ok(updated) => {
                tracing::info!(video_id = %video_id, user_id = %actor.id, "Video title updated");
                self.upsert(updated.clone()).await;
                Ok(updated)
            }
            Err(e) => Err(self.reconcile_failure(video_id, e).await),
        }
    }

    pub async fn delete(&self, video_id: &str) -> Result<(), PortalError> {
        let actor = self.actor()?;
        let asset = self.lookup(video_id).await?;
        if !policy::can_delete(&actor, &asset) {
            let action = if asset.is_owned_by(&actor.id) {
                Action::DeleteOwnVideo
            } else {
                Action::DeleteAnyVideo
            };
            return Err(PortalError::NotPermitted(action));
        }

        match self.registry.delete(video_id).await {
            Ok(()) => {
                tracing::info!(video_id = %video_id, user_id = %actor.id, "Video deleted");
                self.remove(video_id).await;
                Ok(())
            }
            Err(e) => Err(self.reconcile_failure(video_id, e).await),
        }
    }

    /// Drop everything, e.g. after sign-out.
    pub async fn reset(&self) {
        let seq = self.issue_seq();
        let mut cache = self.cache.write().await;
        *cache = Cache {
            applied_seq: seq,
            ..Cache::default()
        };
    }

    /// Periodic refresh until `cancel` fires. An in-flight fetch is abandoned
    /// on cancellation, so nothing is written after teardown.
    pub fn spawn_polling(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                if !self.credentials.is_authenticated() {
                    continue;
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = self.refresh() => {
                        if let Err(e) = result {
                            tracing::debug!(error = %e, "Background refresh failed");
                        }
                    }
                }
            }

            tracing::debug!("Library polling stopped");
        })
    }

    /// Blocks cache writers until the returned guard is dropped.
    #[cfg(test)]
    pub(crate) async fn hold_cache(&self) -> impl Send + '_ {
        self.cache.read().await
    }

    fn actor(&self) -> Result<Identity, PortalError> {
        self.credentials
            .identity()
            .ok_or(PortalError::NotAuthenticated)
    }

    async fn lookup(&self, video_id: &str) -> Result<VideoAsset, PortalError> {
        match self.cached(video_id).await {
            Some(asset) => Ok(asset),
            None => self.fetch(video_id).await.map(|reconciled| reconciled.asset),
        }
    }

    async fn upsert(&self, asset: VideoAsset) {
        let seq = self.issue_seq();
        let mut cache = self.cache.write().await;
        cache.applied_seq = seq;
        match cache.assets.iter_mut().find(|existing| existing.id == asset.id) {
            Some(existing) => *existing = asset,
            None => cache.assets.insert(0, asset),
        }
    }

    async fn remove(&self, video_id: &str) {
        let seq = self.issue_seq();
        let mut cache = self.cache.write().await;
        cache.applied_seq = seq;
        cache.assets.retain(|asset| asset.id != video_id);
    }

    /// A target that is gone upstream is dropped locally before the error
    /// is surfaced.
    async fn reconcile_failure(&self, video_id: &str, err: PortalError) -> PortalError {
        if matches!(err, PortalError::ConflictOrNotFound(_)) {
            tracing::info!(video_id = %video_id, "Dropping stale asset from cache");
            self.remove(video_id).await;
        }
        err
    }
}

fn matches_search(asset: &VideoAsset, needle: &str) -> bool {
    asset.title.to_lowercase().contains(needle)
        || asset
            .owner_email
            .as_deref()
            .is_some_and(|email| email.to_lowercase().contains(needle))
}
