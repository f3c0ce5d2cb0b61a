use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use service_core::middleware::tracing::request_id_middleware;
use service_core::observability::REQUEST_ID_HEADER;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    app::health_check,
    auth::{login_handler, logout_handler, register_handler, session_handler},
    library::{dashboard_handler, library_handler, refresh_handler},
    metrics::metrics,
    upload::{cancel_upload, upload_handler, upload_status},
    users::{cancel_removal, change_role, confirm_removal, list_users, request_removal},
    videos::{delete_video, get_video, rename_video},
};
use crate::middleware::auth::auth_middleware;
use crate::services::credential_store::SessionEvent;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/library", get(library_handler))
        .route("/library/refresh", post(refresh_handler))
        .route("/dashboard", get(dashboard_handler))
        .route(
            "/videos/:id",
            get(get_video).put(rename_video).delete(delete_video),
        )
        .route(
            "/upload",
            get(upload_status).post(upload_handler).delete(cancel_upload),
        )
        .route("/users", get(list_users))
        .route("/users/:id/role", put(change_role))
        .route("/users/:id/removal", post(request_removal))
        .route("/users/removal/confirm", post(confirm_removal))
        .route("/users/removal", axum::routing::delete(cancel_removal))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/session", get(session_handler))
        .route("/session/login", post(login_handler))
        .route("/session/register", post(register_handler))
        .route("/session/logout", post(logout_handler))
        .nest("/api", api)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Applies session transitions to the portal state. The library is only
/// dropped when the signed-in identity changes; a fresh token for the same
/// user keeps the last good list on screen.
pub struct SessionWatcher {
    state: AppState,
    current_user: Option<String>,
}

impl SessionWatcher {
    pub fn new(state: AppState) -> Self {
        let current_user = state.credentials.identity().map(|identity| identity.id);
        Self {
            state,
            current_user,
        }
    }

    pub async fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::SignedOut { reason } => {
                tracing::info!(reason = ?reason, "Session ended, clearing local state");
                self.current_user = None;
                self.state.uploads.cancel();
                self.state.roster.reset().await;
                self.state.library.reset().await;
            }
            SessionEvent::SignedIn { user_id } => {
                if self.current_user.as_deref() != Some(user_id.as_str()) {
                    tracing::debug!(user_id = %user_id, "Session started for a new identity");
                    self.state.roster.reset().await;
                    self.state.library.reset().await;
                    self.current_user = Some(user_id);
                }
                if let Err(e) = self.state.library.refresh().await {
                    tracing::warn!(error = %e, "Library load after sign-in failed");
                }
            }
        }
    }
}

pub fn spawn_session_watcher(state: AppState, cancel: CancellationToken) -> JoinHandle<()> {
    let mut events = state.credentials.subscribe();
    let mut watcher = SessionWatcher::new(state);

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };

            match event {
                Ok(event) => watcher.apply(event).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Session watcher lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
