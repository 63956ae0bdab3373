use sea_orm::entity::prelude::*;

/// One row per user id, overwritten on every change, never deleted.
/// This table is the device-local credential cache: the fallback tier when
/// the remote store is unreachable and the write-through target when it is.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "credential_changes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,

    /// Latest password value; supersedes the roster default when present.
    /// Plaintext, compared by equality (see the resolver docs).
    pub new_password: String,

    /// Display name of the actor who performed the change.
    pub changed_by: String,

    pub changed_at: String,

    /// Self-service change vs administrative reset. Informational only;
    /// precedence does not depend on it.
    pub originated_by_self: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
