//! Administrative credential management. Every handler here re-checks the
//! session identity against the single designated admin user id; the service
//! layer enforces the same gate, so a non-admin can never reach a write.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::require_session_user;
use super::{ApiError, ApiResponse, AppState, PasswordChangeResponse};
use crate::services::ResolvedCredential;

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

/// GET /admin/credentials
/// Merged view of every user's current resolved password (remote wins per
/// user), plaintext values included, for the single designated admin.
pub async fn credential_overview(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<Vec<ResolvedCredential>>>, ApiError> {
    let actor = require_session_user(&session).await?;

    let overview = state.auth().credential_overview(&actor.id).await?;

    Ok(Json(ApiResponse::success(overview)))
}

/// POST /admin/credentials/{user_id}/reset
/// Overwrite a user's credential without proof of the old one.
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(user_id): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<PasswordChangeResponse>>, ApiError> {
    let actor = require_session_user(&session).await?;

    let result = state
        .auth()
        .admin_reset(&actor.id, &user_id, &payload.new_password)
        .await?;

    Ok(Json(ApiResponse::success(PasswordChangeResponse {
        message: "Password has been reset".to_string(),
        synced_remote: result.synced_remote,
    })))
}
