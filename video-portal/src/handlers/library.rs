//! Library and dashboard handlers backed by the lifecycle reconciler.

use axum::extract::{Json, Query, State};
use serde::Serialize;

use crate::services::reconciler::{
    LibraryQuery, LibraryState, LibraryStats, ReconciledAsset, RecentUpload,
};
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryResponse {
    pub videos: Vec<ReconciledAsset>,
    pub state: LibraryState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub stats: LibraryStats,
    pub recent_uploads: Vec<RecentUpload>,
    pub state: LibraryState,
}

/// Load once on first view; later updates come from polling or an explicit
/// refresh. A failed first load still answers with the error in `state`.
async fn ensure_loaded(state: &AppState) {
    if !state.library.state().await.loaded {
        if let Err(e) = state.library.refresh().await {
            tracing::warn!(error = %e, "Initial library load failed");
        }
    }
}

/// Reconciled library view.
///
/// GET /api/library?search=&status=
pub async fn library_handler(
    State(state): State<AppState>,
    Query(query): Query<LibraryQuery>,
) -> Json<LibraryResponse> {
    ensure_loaded(&state).await;

    Json(LibraryResponse {
        videos: state.library.view(&query).await,
        state: state.library.state().await,
    })
}

/// Force a refresh, then answer with the full library.
///
/// POST /api/library/refresh
pub async fn refresh_handler(
    State(state): State<AppState>,
) -> Result<Json<LibraryResponse>, AppError> {
    state.library.refresh().await?;

    Ok(Json(LibraryResponse {
        videos: state.library.view(&LibraryQuery::default()).await,
        state: state.library.state().await,
    }))
}

/// Counts, total hours and the most recent uploads.
///
/// GET /api/dashboard
pub async fn dashboard_handler(State(state): State<AppState>) -> Json<DashboardResponse> {
    ensure_loaded(&state).await;

    Json(DashboardResponse {
        stats: state.library.stats().await,
        recent_uploads: state.library.recent(state.recent_limit).await,
        state: state.library.state().await,
    })
}
