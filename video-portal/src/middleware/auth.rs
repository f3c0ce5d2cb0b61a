use crate::error::PortalError;
use crate::AppState;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use service_core::error::AppError;

/// Reject requests while no credential is held, so the caller can send the
/// user back to login.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.credentials.is_authenticated() {
        tracing::debug!(uri = %request.uri(), "Request without session");
        return AppError::from(PortalError::NotAuthenticated).into_response();
    }

    next.run(request).await
}
