//! Admin roster handlers.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Identity, Role};
use crate::services::roster::RemovalTicket;
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize)]
pub struct RosterQuery {
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RosterResponse {
    pub users: Vec<Identity>,
}

#[derive(Debug, Deserialize)]
pub struct RoleChangeRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRemovalRequest {
    pub ticket: Uuid,
}

/// GET /api/users?search=
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<RosterQuery>,
) -> Result<Json<RosterResponse>, AppError> {
    let users = state.roster.list(query.search.as_deref()).await?;
    Ok(Json(RosterResponse { users }))
}

/// PUT /api/users/{id}/role
pub async fn change_role(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<RoleChangeRequest>,
) -> Result<Json<Identity>, AppError> {
    let user = state.roster.change_role(&user_id, req.role).await?;
    Ok(Json(user))
}

/// First step of removal; nothing is deleted until the ticket is confirmed.
///
/// POST /api/users/{id}/removal
pub async fn request_removal(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<(StatusCode, Json<RemovalTicket>), AppError> {
    let ticket = state.roster.request_removal(&user_id).await?;
    Ok((StatusCode::ACCEPTED, Json(ticket)))
}

/// POST /api/users/removal/confirm
pub async fn confirm_removal(
    State(state): State<AppState>,
    Json(req): Json<ConfirmRemovalRequest>,
) -> Result<Json<RemovalTicket>, AppError> {
    let ticket = state.roster.confirm_removal(req.ticket).await?;
    Ok(Json(ticket))
}

/// DELETE /api/users/removal
pub async fn cancel_removal(State(state): State<AppState>) -> StatusCode {
    if state.roster.cancel_removal() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
