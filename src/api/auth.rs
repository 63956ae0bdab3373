use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, AppState, PasswordChangeResponse, UserDto};
use crate::services::SessionUser;

/// Session slot holding the profile-only identity snapshot.
pub const SESSION_USER_KEY: &str = "user";

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Authentication middleware: a well-formed session identity is required.
/// A persisted session that fails to parse is discarded and treated as no
/// session at all.
pub async fn auth_middleware(
    session: Session,
    request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(user) = restore_session_user(&session).await? {
        tracing::Span::current().record("user_id", &user.id);
        return Ok(next.run(request).await);
    }

    let response = (StatusCode::UNAUTHORIZED, "Unauthorized");
    Ok(response.into_response())
}

/// Non-destructive session restore. Corrupted entries are flushed silently.
async fn restore_session_user(session: &Session) -> Result<Option<SessionUser>, ApiError> {
    match session.get::<SessionUser>(SESSION_USER_KEY).await {
        Ok(user) => Ok(user),
        Err(e) => {
            tracing::warn!("Discarding malformed persisted session: {e}");
            session
                .flush()
                .await
                .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;
            Ok(None)
        }
    }
}

/// Get the identity from the session, failing with 401 when absent.
pub async fn require_session_user(session: &Session) -> Result<SessionUser, ApiError> {
    restore_session_user(session)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
/// Authenticate with username and password, establishes a session on success.
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    if payload.username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let user = state
        .auth()
        .login(&payload.username, &payload.password)
        .await?;

    session
        .insert(SESSION_USER_KEY, &user)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;

    Ok(Json(ApiResponse::success(UserDto::from(&user))))
}

/// POST /auth/logout
/// Forget the current identity. Purely client-side: there is no server-side
/// registry beyond the session record itself.
pub async fn logout(session: Session) -> impl IntoResponse {
    let _ = session.flush().await;
    (StatusCode::OK, "Logged out")
}

/// GET /auth/me
/// Current profile. This is the restore path: reading it twice yields the
/// same identity.
pub async fn get_current_user(
    session: Session,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = require_session_user(&session).await?;
    Ok(Json(ApiResponse::success(UserDto::from(&user))))
}

/// PUT /auth/password
/// Self-service password change. On success the session is torn down so the
/// next request must log in with the new password; no stale in-memory
/// comparison can survive the change.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<PasswordChangeResponse>>, ApiError> {
    let user = require_session_user(&session).await?;

    let result = state
        .auth()
        .change_password(
            &user.id,
            &payload.current_password,
            &payload.new_password,
            &payload.confirm_password,
        )
        .await?;

    session
        .flush()
        .await
        .map_err(|e| ApiError::internal(format!("Session teardown failed: {e}")))?;

    tracing::info!("Password changed for user: {}", user.username);

    Ok(Json(ApiResponse::success(PasswordChangeResponse {
        message: "Password updated. Please log in again with your new password.".to_string(),
        synced_remote: result.synced_remote,
    })))
}

/// GET /users
/// Directory listing, profile fields only.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<UserDto>>> {
    let users = state
        .shared
        .directory
        .users()
        .iter()
        .map(UserDto::from)
        .collect();

    Json(ApiResponse::success(users))
}
