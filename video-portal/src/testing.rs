//! Fixtures shared by unit tests.

use crate::error::PortalError;
use crate::models::{Identity, ProcessingStatus, Role, SensitivityStatus, VideoAsset};
use crate::services::credential_store::{Credential, CredentialStore};
use crate::services::reconciler::AssetRegistry;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::oneshot;

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, hour, minute, 0).unwrap()
}

pub fn identity(id: &str, role: Role) -> Identity {
    Identity {
        id: id.to_string(),
        display_name: format!("User {}", id),
        email: format!("{}@example.com", id),
        role,
        created_at: None,
    }
}

pub fn signed_in(id: &str, role: Role) -> CredentialStore {
    let store = CredentialStore::new();
    store.set(Credential::new(format!("token-{}", id), identity(id, role)));
    store
}

pub fn video(id: &str, owner: &str) -> VideoAsset {
    VideoAsset {
        id: id.to_string(),
        title: format!("Video {}", id),
        owner_id: owner.to_string(),
        owner_email: Some(format!("{}@example.com", owner)),
        size_bytes: 1024,
        duration_seconds: Some(60.0),
        uploaded_at: at(10, 0),
        processing_status: ProcessingStatus::Completed,
        sensitivity_status: SensitivityStatus::Safe,
        filename: format!("{}.mp4", id),
    }
}

pub fn with_status(
    mut asset: VideoAsset,
    processing: ProcessingStatus,
    sensitivity: SensitivityStatus,
) -> VideoAsset {
    asset.processing_status = processing;
    asset.sensitivity_status = sensitivity;
    asset
}

/// One scripted answer to `list`. A gate holds the answer back until the
/// test releases it.
pub struct ListReply {
    pub gate: Option<oneshot::Receiver<()>>,
    pub result: Result<Vec<VideoAsset>, PortalError>,
}

/// Registry double. `list` pops scripted replies; single-asset calls are
/// served from `assets` unless a failure is queued.
#[derive(Default)]
pub struct FakeRegistry {
    pub replies: Mutex<VecDeque<ListReply>>,
    pub assets: Mutex<Vec<VideoAsset>>,
    pub failures: Mutex<VecDeque<PortalError>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn with_assets(assets: Vec<VideoAsset>) -> Self {
        let registry = Self::default();
        *registry.assets.lock().unwrap() = assets;
        registry
    }

    pub fn reply(&self, result: Result<Vec<VideoAsset>, PortalError>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ListReply { gate: None, result });
    }

    pub fn gated_reply(&self, result: Result<Vec<VideoAsset>, PortalError>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().unwrap().push_back(ListReply {
            gate: Some(rx),
            result,
        });
        tx
    }

    pub fn fail_next(&self, err: PortalError) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<(), PortalError> {
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AssetRegistry for FakeRegistry {
    async fn list(&self) -> Result<Vec<VideoAsset>, PortalError> {
        self.calls.lock().unwrap().push("list".to_string());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(ListReply { gate, result }) => {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                result
            }
            None => Ok(self.assets.lock().unwrap().clone()),
        }
    }

    async fn get(&self, video_id: &str) -> Result<VideoAsset, PortalError> {
        self.record(format!("get {}", video_id))?;
        self.assets
            .lock()
            .unwrap()
            .iter()
            .find(|asset| asset.id == video_id)
            .cloned()
            .ok_or(PortalError::ConflictOrNotFound(None))
    }

    async fn update_title(&self, video_id: &str, title: &str) -> Result<VideoAsset, PortalError> {
        self.record(format!("rename {} {}", video_id, title))?;
        let mut assets = self.assets.lock().unwrap();
        let asset = assets
            .iter_mut()
            .find(|asset| asset.id == video_id)
            .ok_or(PortalError::ConflictOrNotFound(None))?;
        asset.title = title.to_string();
        Ok(asset.clone())
    }

    async fn delete(&self, video_id: &str) -> Result<(), PortalError> {
        self.record(format!("delete {}", video_id))?;
        self.assets.lock().unwrap().retain(|asset| asset.id != video_id);
        Ok(())
    }
}
