//! Remote credential store client.
//!
//! The store is a hosted PostgREST-style table keyed on `user_id`. Because
//! deployments have drifted between schema names, every operation walks the
//! configured candidate-table list in order and takes the first table that
//! answers. Rows that do not match the expected shape are treated as not
//! found rather than propagated.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;

use crate::config::RemoteStoreConfig;

/// The cross-device source of truth for current passwords.
///
/// Implementations must treat "store not provisioned" and "store unreachable"
/// identically: as an `Err` the resolver converts into fallback behavior.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Point lookup by user id. `Ok(None)` means no record in any table.
    async fn fetch_password(&self, user_id: &str) -> Result<Option<String>>;

    /// Upsert keyed on `user_id`. Attempted once; no retry.
    async fn upsert_password(&self, user_id: &str, new_password: &str) -> Result<()>;

    /// Full map of user id -> current password, for the admin overview.
    async fn fetch_all_passwords(&self) -> Result<HashMap<String, String>>;
}

#[derive(Debug, Serialize)]
struct UpsertRow<'a> {
    user_id: &'a str,
    new_password: &'a str,
    updated_at: String,
}

/// Tagged record shape at the store boundary. Anything the store returns
/// that does not deserialize into this is treated as "not found."
#[derive(Debug, Deserialize)]
struct PasswordRow {
    user_id: String,
    new_password: String,
}

pub struct RestCredentialStore {
    client: Client,
    base_url: Url,
    api_key: String,
    tables: Vec<String>,
}

impl RestCredentialStore {
    pub fn new(config: &RemoteStoreConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .with_context(|| format!("Invalid remote store URL: {}", config.url))?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_seconds))
            .user_agent("Keystone/1.0")
            .build()
            .map_err(|e| anyhow!("Failed to build remote store HTTP client: {e}"))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            tables: config.tables.clone(),
        })
    }

    pub fn with_shared_client(client: Client, config: &RemoteStoreConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .with_context(|| format!("Invalid remote store URL: {}", config.url))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            tables: config.tables.clone(),
        })
    }

    fn table_url(&self, table: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("Remote store URL cannot be a base"))?
            .extend(["rest", "v1", table]);
        Ok(url)
    }

    async fn rows_from(&self, url: Url) -> Result<Vec<PasswordRow>> {
        let response = self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("Remote store returned {}", response.status());
        }

        // Shape mismatch fails closed: the caller sees an empty result set.
        match response.json::<Vec<PasswordRow>>().await {
            Ok(rows) => Ok(rows),
            Err(e) => {
                warn!("Remote store returned ill-shaped rows, treating as empty: {e}");
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl CredentialStore for RestCredentialStore {
    async fn fetch_password(&self, user_id: &str) -> Result<Option<String>> {
        let mut last_err: Option<anyhow::Error> = None;
        let mut any_table_answered = false;

        for table in &self.tables {
            let mut url = self.table_url(table)?;
            url.query_pairs_mut()
                .append_pair("user_id", &format!("eq.{user_id}"))
                .append_pair("select", "user_id,new_password");

            match self.rows_from(url).await {
                Ok(rows) => {
                    if let Some(row) = rows.into_iter().find(|r| r.user_id == user_id) {
                        debug!("Remote credential hit ({table}): {user_id}");
                        return Ok(Some(row.new_password));
                    }
                    // A miss in one table still consults the drifted twin;
                    // records may live in either.
                    any_table_answered = true;
                }
                Err(e) => last_err = Some(e),
            }
        }

        if any_table_answered {
            return Ok(None);
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    async fn upsert_password(&self, user_id: &str, new_password: &str) -> Result<()> {
        let row = UpsertRow {
            user_id,
            new_password,
            updated_at: chrono::Utc::now().to_rfc3339(),
        };

        let mut last_err: Option<anyhow::Error> = None;

        for table in &self.tables {
            let mut url = self.table_url(table)?;
            url.query_pairs_mut().append_pair("on_conflict", "user_id");

            let result = self
                .client
                .post(url)
                .header("apikey", &self.api_key)
                .bearer_auth(&self.api_key)
                .header("Prefer", "resolution=merge-duplicates")
                .json(&[&row])
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    debug!("Remote credential upsert succeeded ({table}): {user_id}");
                    return Ok(());
                }
                Ok(response) => {
                    last_err = Some(anyhow!("Remote store returned {}", response.status()));
                }
                Err(e) => last_err = Some(e.into()),
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("No candidate tables configured")))
    }

    async fn fetch_all_passwords(&self) -> Result<HashMap<String, String>> {
        let mut last_err: Option<anyhow::Error> = None;

        for table in &self.tables {
            let mut url = self.table_url(table)?;
            url.query_pairs_mut()
                .append_pair("select", "user_id,new_password");

            match self.rows_from(url).await {
                Ok(rows) => {
                    return Ok(rows
                        .into_iter()
                        .map(|r| (r.user_id, r.new_password))
                        .collect());
                }
                Err(e) => last_err = Some(e),
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(HashMap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteStoreConfig;

    fn test_config() -> RemoteStoreConfig {
        RemoteStoreConfig {
            url: "https://example.supabase.co".to_string(),
            api_key: "anon-key".to_string(),
            ..RemoteStoreConfig::default()
        }
    }

    #[test]
    fn test_table_url_appends_rest_path() {
        let store = RestCredentialStore::new(&test_config()).unwrap();
        let url = store.table_url("password_changes").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.supabase.co/rest/v1/password_changes"
        );
    }

    #[test]
    fn test_rejects_invalid_url() {
        let mut config = test_config();
        config.url = "not a url".to_string();
        assert!(RestCredentialStore::new(&config).is_err());
    }

    #[test]
    fn test_ill_shaped_row_fails_closed() {
        // A row missing new_password must not deserialize.
        let raw = r#"[{"user_id": "kim-mu-bin", "pw": "x"}]"#;
        assert!(serde_json::from_str::<Vec<PasswordRow>>(raw).is_err());

        let raw = r#"[{"user_id": "kim-mu-bin", "new_password": "x"}]"#;
        let rows = serde_json::from_str::<Vec<PasswordRow>>(raw).unwrap();
        assert_eq!(rows[0].new_password, "x");
    }
}
