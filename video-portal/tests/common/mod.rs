#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use video_portal::config::{
    ApiSettings, LibrarySettings, ServerSettings, Settings, TelemetrySettings, UploadSettings,
};
use video_portal::services::credential_store::Credential;
use video_portal::startup::build_router;
use video_portal::AppState;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct TestPortal {
    pub api: MockServer,
    pub state: AppState,
    pub router: Router,
}

impl TestPortal {
    pub async fn spawn() -> Self {
        Self::spawn_with_upload(UploadSettings::default()).await
    }

    pub async fn spawn_with_upload(upload: UploadSettings) -> Self {
        let api = MockServer::start().await;

        let settings = Settings {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            api: ApiSettings {
                base_url: format!("{}/api", api.uri()),
                stream_base_url: None,
                request_timeout_secs: 5,
            },
            upload,
            library: LibrarySettings::default(),
            telemetry: TelemetrySettings::default(),
        };

        let state = AppState::new(&settings).expect("Failed to build app state");
        let router = build_router(state.clone());

        Self { api, state, router }
    }

    /// Store a credential directly, skipping the login round trip.
    pub fn sign_in(&self, token: &str, id: &str, role: &str) {
        let identity = serde_json::from_value(identity_json(id, role)).unwrap();
        self.state.credentials.set(Credential::new(token, identity));
    }

    pub async fn mock_login(&self, token: &str, id: &str, role: &str) {
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": token,
                "user": identity_json(id, role),
            })))
            .mount(&self.api)
            .await;
    }

    pub async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn send_json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn send_empty(&self, method: &str, uri: &str) -> (StatusCode, Value) {
        self.request(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

pub fn identity_json(id: &str, role: &str) -> Value {
    json!({
        "_id": id,
        "name": format!("User {}", id),
        "email": format!("{}@example.com", id),
        "role": role,
    })
}

pub fn video_json(id: &str, owner: &str, processing: &str, sensitivity: Option<&str>) -> Value {
    json!({
        "_id": id,
        "title": format!("Video {}", id),
        "owner": owner,
        "size": 1048576,
        "duration": 120,
        "uploadedAt": "2024-06-01T10:00:00Z",
        "processingStatus": processing,
        "sensitivityStatus": sensitivity,
        "filename": format!("{}.mp4", id),
    })
}
