use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::collections::HashMap;

use crate::entities::{credential_changes, prelude::*};

/// A recorded password change, as held in the local cache.
#[derive(Debug, Clone)]
pub struct CredentialChange {
    pub user_id: String,
    pub new_password: String,
    pub changed_by: String,
    pub changed_at: String,
    pub originated_by_self: bool,
}

impl From<credential_changes::Model> for CredentialChange {
    fn from(model: credential_changes::Model) -> Self {
        Self {
            user_id: model.user_id,
            new_password: model.new_password,
            changed_by: model.changed_by,
            changed_at: model.changed_at,
            originated_by_self: model.originated_by_self,
        }
    }
}

pub struct CredentialRepository {
    conn: DatabaseConnection,
}

impl CredentialRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<CredentialChange>> {
        let record = CredentialChanges::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("Failed to query credential change")?;

        Ok(record.map(CredentialChange::from))
    }

    /// Overwrite-on-write: the row is replaced, not appended to.
    pub async fn upsert(&self, change: &CredentialChange) -> Result<()> {
        let existing = CredentialChanges::find_by_id(&change.user_id)
            .one(&self.conn)
            .await
            .context("Failed to query credential change for upsert")?;

        if let Some(existing) = existing {
            let mut active: credential_changes::ActiveModel = existing.into();
            active.new_password = Set(change.new_password.clone());
            active.changed_by = Set(change.changed_by.clone());
            active.changed_at = Set(change.changed_at.clone());
            active.originated_by_self = Set(change.originated_by_self);
            active
                .update(&self.conn)
                .await
                .context("Failed to update credential change")?;
        } else {
            let active = credential_changes::ActiveModel {
                user_id: Set(change.user_id.clone()),
                new_password: Set(change.new_password.clone()),
                changed_by: Set(change.changed_by.clone()),
                changed_at: Set(change.changed_at.clone()),
                originated_by_self: Set(change.originated_by_self),
            };
            active
                .insert(&self.conn)
                .await
                .context("Failed to insert credential change")?;
        }

        Ok(())
    }

    pub async fn list(&self) -> Result<HashMap<String, CredentialChange>> {
        let records = CredentialChanges::find()
            .all(&self.conn)
            .await
            .context("Failed to list credential changes")?;

        Ok(records
            .into_iter()
            .map(|m| (m.user_id.clone(), CredentialChange::from(m)))
            .collect())
    }
}
