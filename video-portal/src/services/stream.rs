//! Playback URLs for the streaming endpoint.
//!
//! Media elements cannot send headers, so the credential travels as a query
//! parameter. URLs are built on demand and never cached, so a rotated token
//! is always picked up.

use crate::error::PortalError;
use crate::services::credential_store::CredentialStore;
use std::sync::Arc;

pub struct StreamAuthorizer {
    stream_base: String,
    credentials: Arc<CredentialStore>,
}

impl StreamAuthorizer {
    pub fn new(stream_base: impl Into<String>, credentials: Arc<CredentialStore>) -> Self {
        Self {
            stream_base: stream_base.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Stream URL for `video_id`. Without a credential the token parameter is
    /// left off and the server will refuse the request.
    pub fn playback_url(&self, video_id: &str) -> String {
        let base = format!(
            "{}/videos/{}/stream",
            self.stream_base,
            urlencoding::encode(video_id)
        );

        match self.credentials.current() {
            Some(credential) => {
                format!("{}?token={}", base, urlencoding::encode(credential.token()))
            }
            None => base,
        }
    }

    /// Like [`playback_url`](Self::playback_url), but refuses when signed out
    /// so the caller can send the user to login instead.
    pub fn authorized_playback_url(&self, video_id: &str) -> Result<String, PortalError> {
        if !self.credentials.is_authenticated() {
            return Err(PortalError::NotAuthenticated);
        }
        Ok(self.playback_url(video_id))
    }
}
