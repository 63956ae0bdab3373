//! Domain service for session authentication and credential changes.
//!
//! Login, self-service password change, and the administrative reset flow all
//! go through this service; credential state itself is owned by the resolver.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::directory::{Role, User};
use crate::services::resolver::{CredentialWrite, ResolvedCredential};

/// Errors specific to authentication operations.
///
/// `UserNotFound` and `BadCredentials` deliberately render the same message:
/// the caller must not learn which half of the credential pair was wrong.
/// They stay distinct variants for tests.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username or password incorrect")]
    UserNotFound,

    #[error("Username or password incorrect")]
    BadCredentials,

    #[error("{0}")]
    Validation(String),

    #[error("Not authorized for this operation")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// The authenticated identity as persisted in the session: profile fields
/// only, credential fields stripped. A session never carries a password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    pub name: String,
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    pub role: Role,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            position: user.position.clone(),
            track: user.track.clone(),
            role: user.role,
        }
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and returns the profile snapshot for the session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UserNotFound`] or [`AuthError::BadCredentials`];
    /// both surface identically.
    async fn login(&self, username: &str, password: &str) -> Result<SessionUser, AuthError>;

    /// Self-service password change for the active session's user.
    ///
    /// Validation order (first failing check wins): non-empty fields, new ==
    /// confirm, minimum length 6, current password matches the resolved
    /// value.
    async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<CredentialWrite, AuthError>;

    /// Administrative reset: overwrite `target_user_id`'s credential without
    /// proof of the old one. Gated to the single designated admin identity.
    async fn admin_reset(
        &self,
        actor_id: &str,
        target_user_id: &str,
        new_password: &str,
    ) -> Result<CredentialWrite, AuthError>;

    /// Merged credential view for all users. Admin-gated like the reset.
    async fn credential_overview(
        &self,
        actor_id: &str,
    ) -> Result<Vec<ResolvedCredential>, AuthError>;
}
