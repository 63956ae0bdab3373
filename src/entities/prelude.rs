pub use super::credential_changes::Entity as CredentialChanges;
