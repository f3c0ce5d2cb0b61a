//! Session handlers: sign in, register, sign out, current identity.

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use serde::Serialize;

use crate::error::PortalError;
use crate::models::Identity;
use crate::services::auth_client::{LoginRequest, RegisterRequest};
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initials: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,
}

impl SessionResponse {
    fn signed_in(user: Identity) -> Self {
        Self {
            authenticated: true,
            display_name: Some(user.name().to_string()),
            initials: Some(user.initials()),
            user: Some(user),
        }
    }

    fn signed_out() -> Self {
        Self {
            authenticated: false,
            display_name: None,
            initials: None,
            user: None,
        }
    }
}

/// Sign in with email and password.
///
/// POST /session/login
pub async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let user = state.auth_client.login(payload).await?;
    Ok(Json(SessionResponse::signed_in(user)))
}

/// Create an account and sign in with it.
///
/// POST /session/register
pub async fn register_handler(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let user = state.auth_client.register(payload).await?;
    Ok((StatusCode::CREATED, Json(SessionResponse::signed_in(user))))
}

/// POST /session/logout
pub async fn logout_handler(State(state): State<AppState>) -> StatusCode {
    if state.auth_client.logout() {
        tracing::info!("User logged out");
    }
    StatusCode::NO_CONTENT
}

/// Current identity, re-read from the identity provider so role changes
/// made elsewhere are picked up.
///
/// GET /session
pub async fn session_handler(
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, AppError> {
    match state.auth_client.profile().await {
        Ok(user) => Ok(Json(SessionResponse::signed_in(user))),
        Err(PortalError::NotAuthenticated) => Ok(Json(SessionResponse::signed_out())),
        Err(e) if e.is_retryable() => {
            tracing::warn!(error = %e, "Profile refresh failed, serving stored identity");
            match state.credentials.identity() {
                Some(user) => Ok(Json(SessionResponse::signed_in(user))),
                None => Ok(Json(SessionResponse::signed_out())),
            }
        }
        Err(e) => Err(e.into()),
    }
}
