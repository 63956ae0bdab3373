//! Directory-backed implementation of the `AuthService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::directory::UserDirectory;
use crate::services::auth_service::{AuthError, AuthService, SessionUser};
use crate::services::resolver::{CredentialResolver, CredentialWrite, ResolvedCredential};

pub struct PortalAuthService {
    directory: Arc<UserDirectory>,
    resolver: Arc<CredentialResolver>,
    admin_user_id: String,
}

impl PortalAuthService {
    #[must_use]
    pub const fn new(
        directory: Arc<UserDirectory>,
        resolver: Arc<CredentialResolver>,
        admin_user_id: String,
    ) -> Self {
        Self {
            directory,
            resolver,
            admin_user_id,
        }
    }

    fn require_admin(&self, actor_id: &str) -> Result<(), AuthError> {
        if actor_id == self.admin_user_id {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

#[async_trait]
impl AuthService for PortalAuthService {
    async fn login(&self, username: &str, password: &str) -> Result<SessionUser, AuthError> {
        // Exact match, case-sensitive, no normalization.
        let user = self
            .directory
            .find_by_username(username)
            .ok_or(AuthError::UserNotFound)?;

        let current = self.resolver.resolve_current_password(user).await;

        if password != current {
            return Err(AuthError::BadCredentials);
        }

        info!("Login: {}", user.username);
        Ok(SessionUser::from(user))
    }

    async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<CredentialWrite, AuthError> {
        if current_password.is_empty() || new_password.is_empty() || confirm_password.is_empty() {
            return Err(AuthError::Validation("All fields are required".to_string()));
        }

        if new_password != confirm_password {
            return Err(AuthError::Validation(
                "New passwords do not match".to_string(),
            ));
        }

        if new_password.chars().count() < 6 {
            return Err(AuthError::Validation(
                "Password must be at least 6 characters".to_string(),
            ));
        }

        let user = self
            .directory
            .find_by_id(user_id)
            .ok_or_else(|| AuthError::Validation("User not found".to_string()))?;

        let current = self.resolver.resolve_current_password(user).await;
        if current_password != current {
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let result = self
            .resolver
            .write_credential(&user.id, new_password, &user.name, true)
            .await?;

        info!("Password changed (self-service): {}", user.username);
        Ok(result)
    }

    async fn admin_reset(
        &self,
        actor_id: &str,
        target_user_id: &str,
        new_password: &str,
    ) -> Result<CredentialWrite, AuthError> {
        self.require_admin(actor_id)?;

        if new_password.is_empty() {
            return Err(AuthError::Validation(
                "New password is required".to_string(),
            ));
        }

        let admin = self
            .directory
            .find_by_id(actor_id)
            .ok_or(AuthError::Forbidden)?;
        let target = self
            .directory
            .find_by_id(target_user_id)
            .ok_or_else(|| AuthError::Validation("Unknown user id".to_string()))?;

        let result = self
            .resolver
            .write_credential(&target.id, new_password, &admin.name, false)
            .await?;

        info!(
            "Password reset by admin: target={} admin={}",
            target.username, admin.username
        );
        Ok(result)
    }

    async fn credential_overview(
        &self,
        actor_id: &str,
    ) -> Result<Vec<ResolvedCredential>, AuthError> {
        self.require_admin(actor_id)?;
        Ok(self.resolver.resolve_all(self.directory.users()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    async fn service() -> PortalAuthService {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let resolver = Arc::new(CredentialResolver::new(store, None, false));
        PortalAuthService::new(
            Arc::new(UserDirectory::provisioned()),
            resolver,
            "kim-mu-bin".to_string(),
        )
    }

    #[tokio::test]
    async fn login_with_default_password_succeeds() {
        let auth = service().await;
        let session = auth.login("kmb", "woaini96!!").await.unwrap();
        assert_eq!(session.id, "kim-mu-bin");
    }

    #[tokio::test]
    async fn login_failures_share_one_message() {
        let auth = service().await;

        let wrong_password = auth.login("kmb", "wrong").await.unwrap_err();
        let unknown_user = auth.login("nonexistent", "anything").await.unwrap_err();

        assert!(matches!(wrong_password, AuthError::BadCredentials));
        assert!(matches!(unknown_user, AuthError::UserNotFound));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn mismatch_is_reported_before_length() {
        let auth = service().await;

        // Both rules violated: mismatch must win.
        let err = auth
            .change_password("kim-mu-bin", "woaini96!!", "abc", "abd")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "New passwords do not match");

        let err = auth
            .change_password("kim-mu-bin", "woaini96!!", "abc", "abc")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 6 characters");

        let err = auth
            .change_password("kim-mu-bin", "", "abcdef", "abcdef")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "All fields are required");

        let err = auth
            .change_password("kim-mu-bin", "not-current", "abcdef", "abcdef")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Current password is incorrect");
    }

    #[tokio::test]
    async fn change_takes_effect_for_next_login() {
        let auth = service().await;

        auth.change_password("kim-mu-bin", "woaini96!!", "brandnew1", "brandnew1")
            .await
            .unwrap();

        assert!(matches!(
            auth.login("kmb", "woaini96!!").await.unwrap_err(),
            AuthError::BadCredentials
        ));
        assert!(auth.login("kmb", "brandnew1").await.is_ok());
    }

    #[tokio::test]
    async fn non_admin_reset_has_no_effect() {
        let auth = service().await;

        let err = auth
            .admin_reset("chun-ji-yeon", "song-kyu-nam", "hijacked1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden));

        // Target still logs in with the default.
        assert!(auth.login("skn", "seowon2026").await.is_ok());
    }

    #[tokio::test]
    async fn admin_reset_overwrites_without_old_password() {
        let auth = service().await;

        auth.admin_reset("kim-mu-bin", "song-kyu-nam", "issued-pw1")
            .await
            .unwrap();

        assert!(auth.login("skn", "issued-pw1").await.is_ok());

        let overview = auth.credential_overview("kim-mu-bin").await.unwrap();
        let entry = overview
            .iter()
            .find(|r| r.user_id == "song-kyu-nam")
            .unwrap();
        assert_eq!(entry.current_password, "issued-pw1");
        assert_eq!(entry.changed_by.as_deref(), Some("김무빈"));
    }

    #[tokio::test]
    async fn overview_is_admin_gated() {
        let auth = service().await;
        assert!(matches!(
            auth.credential_overview("ceo-kim-jin-hwan").await.unwrap_err(),
            AuthError::Forbidden
        ));
    }
}
