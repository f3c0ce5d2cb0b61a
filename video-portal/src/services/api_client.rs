//! Shared request path for every call to the video platform API.
//!
//! Attaches the stored bearer credential, injects trace context, records
//! metrics and maps HTTP failures onto [`PortalError`]. A 401 invalidates the
//! credential the request was sent with before the error is returned.

use crate::config::ApiSettings;
use crate::error::PortalError;
use crate::services::credential_store::CredentialStore;
use crate::services::metrics;
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use service_core::observability::{TracedClientExt, TracedRequest};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct ApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    credentials: Arc<CredentialStore>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl ApiClient {
    pub fn new(settings: &ApiSettings, credentials: Arc<CredentialStore>) -> Result<Self, PortalError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            timeout: settings.request_timeout(),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, PortalError> {
        let response = self
            .execute(Method::GET, path, Some(self.timeout), |req| req)
            .await?;
        Ok(response.json().await?)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, PortalError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .execute(Method::POST, path, Some(self.timeout), |req| req.json(body))
            .await?;
        Ok(response.json().await?)
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, PortalError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .execute(Method::PUT, path, Some(self.timeout), |req| req.json(body))
            .await?;
        Ok(response.json().await?)
    }

    pub async fn delete(&self, path: &str) -> Result<(), PortalError> {
        self.execute(Method::DELETE, path, Some(self.timeout), |req| req)
            .await?;
        Ok(())
    }

    /// Multipart POST without the request timeout; large transfers are
    /// bounded by cancellation instead.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T, PortalError> {
        let response = self
            .execute(Method::POST, path, None, |req| req.multipart(form))
            .await?;
        Ok(response.json().await?)
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        timeout: Option<Duration>,
        build: impl FnOnce(TracedRequest) -> TracedRequest,
    ) -> Result<reqwest::Response, PortalError> {
        let url = format!("{}{}", self.base_url, path);
        let endpoint = endpoint_label(path);

        let request = match method {
            Method::POST => self.client.traced_post(&url),
            Method::PUT => self.client.traced_put(&url),
            Method::DELETE => self.client.traced_delete(&url),
            _ => self.client.traced_get(&url),
        };

        // Snapshot: the 401 hook must only clear the credential used here.
        let credential = self.credentials.current();
        let request = match &credential {
            Some(credential) => request.bearer_auth(credential.token()),
            None => request,
        };
        let request = match timeout {
            Some(timeout) => build(request).timeout(timeout),
            None => build(request),
        };

        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_api_request(method.as_str(), &endpoint, "error", started.elapsed());
                tracing::warn!(method = %method, endpoint = %endpoint, error = %e, "API request failed");
                return Err(e.into());
            }
        };

        let status = response.status();
        metrics::record_api_request(
            method.as_str(),
            &endpoint,
            status.as_str(),
            started.elapsed(),
        );

        if status.is_success() {
            tracing::debug!(method = %method, endpoint = %endpoint, status = %status, "API request succeeded");
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            return match credential {
                Some(credential) => {
                    tracing::warn!(endpoint = %endpoint, "API rejected session credential");
                    self.credentials.invalidate(credential.token());
                    Err(PortalError::CredentialRejected)
                }
                None => Err(PortalError::Unauthorized(error_message(response).await)),
            };
        }

        let message = error_message(response).await;
        tracing::warn!(
            method = %method,
            endpoint = %endpoint,
            status = %status,
            message = message.as_deref().unwrap_or("-"),
            "API request rejected"
        );

        Err(match status {
            StatusCode::FORBIDDEN => PortalError::Forbidden(message),
            StatusCode::NOT_FOUND | StatusCode::CONFLICT | StatusCode::GONE => {
                PortalError::ConflictOrNotFound(message)
            }
            _ => PortalError::Server {
                status: status.as_u16(),
                message,
            },
        })
    }
}

async fn error_message(response: reqwest::Response) -> Option<String> {
    let text = response.text().await.ok()?;
    serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.message.or(body.error))
        .filter(|message| !message.trim().is_empty())
}

/// Metric label for a request path with identifiers collapsed to `:id`.
fn endpoint_label(path: &str) -> String {
    const STATIC_SEGMENTS: [&str; 9] = [
        "auth", "login", "register", "profile", "users", "role", "videos", "upload", "stream",
    ];

    let path = path.split('?').next().unwrap_or(path);
    path.split('/')
        .map(|segment| {
            if segment.is_empty() || STATIC_SEGMENTS.contains(&segment) {
                segment
            } else {
                ":id"
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
