use serde::Serialize;

use crate::directory::{Role, User};
use crate::services::SessionUser;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Profile view of a user. No credential fields, ever.
#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: String,
    pub username: String,
    pub name: String,
    pub position: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    pub role: Role,
    pub can_write: bool,
}

impl From<&SessionUser> for UserDto {
    fn from(user: &SessionUser) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            position: user.position.clone(),
            track: user.track.clone(),
            role: user.role,
            can_write: user.role.can_write(),
        }
    }
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            position: user.position.clone(),
            track: user.track.clone(),
            role: user.role,
            can_write: user.role.can_write(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `synced_remote` is the cross-device ack: false means the change is saved
/// on this device only and will propagate once the store is reachable again.
#[derive(Debug, Serialize)]
pub struct PasswordChangeResponse {
    pub message: String,
    pub synced_remote: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub uptime_seconds: u64,
    pub database_ok: bool,
    pub remote_store_configured: bool,
    pub local_dev: bool,
}
