//! Credential resolution and propagation.
//!
//! The resolver is the only writer of credential state. Reads apply a strict
//! precedence: remote store -> local cache -> roster default. The remote store
//! is the cross-device source of truth; the local cache keeps the system
//! usable through network partitions and unprovisioned stores. Passwords are
//! compared and stored as plaintext equality values end to end.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, warn};

use crate::clients::remote::CredentialStore;
use crate::db::{CredentialChange, Store};
use crate::directory::User;

/// Outcome of a credential write. The local write succeeding is what makes
/// the call succeed; `synced_remote` is the separate cross-device ack.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CredentialWrite {
    pub synced_remote: bool,
}

/// One user's merged credential view, for the administrative overview.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedCredential {
    pub user_id: String,
    pub username: String,
    pub name: String,
    pub position: String,
    pub current_password: String,
    /// False when the roster default is still in effect.
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_at: Option<String>,
}

pub struct CredentialResolver {
    store: Store,
    remote: Option<Arc<dyn CredentialStore>>,
    /// Local-development short-circuit: skip the remote tier on reads.
    local_dev: bool,
}

impl CredentialResolver {
    #[must_use]
    pub fn new(store: Store, remote: Option<Arc<dyn CredentialStore>>, local_dev: bool) -> Self {
        Self {
            store,
            remote,
            local_dev,
        }
    }

    /// Produce the single current password for a user.
    ///
    /// Never fails: remote errors and cache errors degrade to the next
    /// precedence tier. A remote hit is written through to the local cache so
    /// later offline reads agree with the last known remote value.
    pub async fn resolve_current_password(&self, user: &User) -> String {
        if self.local_dev {
            debug!("Local dev: skipping remote credential lookup for {}", user.id);
        } else if let Some(remote) = &self.remote {
            match remote.fetch_password(&user.id).await {
                Ok(Some(password)) => {
                    self.write_through(&user.id, &password).await;
                    return password;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Remote store unreachable, falling back to local cache: {e}");
                }
            }
        }

        match self.store.get_credential_change(&user.id).await {
            Ok(Some(change)) => change.new_password,
            Ok(None) => user.default_password.clone(),
            Err(e) => {
                warn!("Local credential cache read failed, using default: {e}");
                user.default_password.clone()
            }
        }
    }

    /// Record a credential change. The local write is unconditional and must
    /// succeed; the remote write is attempted exactly once and its failure
    /// degrades silently to local-only persistence. There is no atomicity
    /// between the two targets.
    pub async fn write_credential(
        &self,
        user_id: &str,
        new_password: &str,
        changed_by: &str,
        originated_by_self: bool,
    ) -> Result<CredentialWrite> {
        let change = CredentialChange {
            user_id: user_id.to_string(),
            new_password: new_password.to_string(),
            changed_by: changed_by.to_string(),
            changed_at: chrono::Utc::now().to_rfc3339(),
            originated_by_self,
        };

        self.store.upsert_credential_change(&change).await?;

        let synced_remote = if let Some(remote) = &self.remote {
            match remote.upsert_password(user_id, new_password).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Remote credential sync failed, saved locally only: {e}");
                    false
                }
            }
        } else {
            false
        };

        Ok(CredentialWrite { synced_remote })
    }

    /// Merged credential view across all users: local cache overlaid by the
    /// full remote map (remote wins per user), falling back to each roster
    /// default where neither has a record.
    pub async fn resolve_all(&self, users: &[User]) -> Vec<ResolvedCredential> {
        let local = match self.store.list_credential_changes().await {
            Ok(map) => map,
            Err(e) => {
                warn!("Local credential cache listing failed: {e}");
                HashMap::new()
            }
        };

        let remote = if self.local_dev {
            HashMap::new()
        } else if let Some(remote) = &self.remote {
            match remote.fetch_all_passwords().await {
                Ok(map) => map,
                Err(e) => {
                    warn!("Remote store unreachable for overview: {e}");
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        users
            .iter()
            .map(|user| {
                let local_change = local.get(&user.id);
                let remote_password = remote.get(&user.id);

                let current_password = remote_password
                    .cloned()
                    .or_else(|| local_change.map(|c| c.new_password.clone()))
                    .unwrap_or_else(|| user.default_password.clone());

                let changed = remote_password.is_some() || local_change.is_some();

                // Change metadata only exists locally; a remote-only entry
                // shows the password without attribution.
                let attribution = local_change
                    .filter(|c| c.new_password == current_password);

                ResolvedCredential {
                    user_id: user.id.clone(),
                    username: user.username.clone(),
                    name: user.name.clone(),
                    position: user.position.clone(),
                    current_password,
                    changed,
                    changed_by: attribution.map(|c| c.changed_by.clone()),
                    changed_at: attribution.map(|c| c.changed_at.clone()),
                }
            })
            .collect()
    }

    async fn write_through(&self, user_id: &str, password: &str) {
        let change = CredentialChange {
            user_id: user_id.to_string(),
            new_password: password.to_string(),
            changed_by: "remote-sync".to_string(),
            changed_at: chrono::Utc::now().to_rfc3339(),
            originated_by_self: false,
        };

        if let Err(e) = self.store.upsert_credential_change(&change).await {
            warn!("Write-through of remote credential failed: {e}");
        }
    }
}
