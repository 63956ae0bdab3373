pub mod auth_service;
pub mod auth_service_impl;
pub mod resolver;

pub use auth_service::{AuthError, AuthService, SessionUser};
pub use auth_service_impl::PortalAuthService;
pub use resolver::{CredentialResolver, CredentialWrite, ResolvedCredential};
