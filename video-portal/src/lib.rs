pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use config::Settings;
use error::PortalError;
use services::{
    api_client::ApiClient, auth_client::AuthClient, credential_store::CredentialStore,
    reconciler::LifecycleReconciler, roster::RosterController, stream::StreamAuthorizer,
    upload::UploadController, video_client::VideoClient,
};
use std::sync::Arc;
use utils::SystemClock;

/// Shared application state: the session slot and every component that
/// acts on behalf of the signed-in user.
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<CredentialStore>,
    pub auth_client: Arc<AuthClient>,
    pub library: Arc<LifecycleReconciler>,
    pub uploads: Arc<UploadController>,
    pub roster: Arc<RosterController>,
    pub streams: Arc<StreamAuthorizer>,
    pub recent_limit: usize,
}

impl AppState {
    /// Wire all components against the configured API.
    pub fn new(settings: &Settings) -> Result<Self, PortalError> {
        let credentials = Arc::new(CredentialStore::new());
        let api = Arc::new(ApiClient::new(&settings.api, credentials.clone())?);

        let auth_client = Arc::new(AuthClient::new(api.clone()));
        let videos = Arc::new(VideoClient::new(api));

        let library = Arc::new(LifecycleReconciler::new(
            videos.clone(),
            credentials.clone(),
            Arc::new(SystemClock),
        ));
        let uploads = Arc::new(UploadController::new(
            videos,
            library.clone(),
            settings.upload.clone(),
        ));
        let roster = Arc::new(RosterController::new(
            auth_client.clone(),
            credentials.clone(),
        ));
        let streams = Arc::new(StreamAuthorizer::new(
            settings.api.stream_base_url(),
            credentials.clone(),
        ));

        Ok(Self {
            credentials,
            auth_client,
            library,
            uploads,
            roster,
            streams,
            recent_limit: settings.library.recent_limit,
        })
    }
}
