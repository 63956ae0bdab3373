use std::sync::Arc;

use crate::clients::remote::{CredentialStore, RestCredentialStore};
use crate::config::Config;
use crate::db::Store;
use crate::directory::UserDirectory;
use crate::services::{AuthService, CredentialResolver, PortalAuthService};

/// Build a shared HTTP client with reasonable defaults for remote store calls.
fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .user_agent("Keystone/1.0")
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Config,

    pub store: Store,

    pub directory: Arc<UserDirectory>,

    pub resolver: Arc<CredentialResolver>,

    pub auth: Arc<dyn AuthService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let directory = Arc::new(UserDirectory::load(
            config.general.directory_path.as_deref(),
        )?);

        // Unconfigured remote store is treated identically to unreachable,
        // so it simply never gets a client.
        let remote: Option<Arc<dyn CredentialStore>> = if config.remote_store.is_configured() {
            let http_client =
                build_shared_http_client(config.remote_store.request_timeout_seconds)?;
            Some(Arc::new(RestCredentialStore::with_shared_client(
                http_client,
                &config.remote_store,
            )?))
        } else {
            None
        };

        Self::with_remote(config, store, directory, remote)
    }

    /// Wiring seam used by tests to inject a remote store double.
    pub fn with_remote(
        config: Config,
        store: Store,
        directory: Arc<UserDirectory>,
        remote: Option<Arc<dyn CredentialStore>>,
    ) -> anyhow::Result<Self> {
        let resolver = Arc::new(CredentialResolver::new(
            store.clone(),
            remote,
            config.general.local_dev,
        ));

        let auth = Arc::new(PortalAuthService::new(
            directory.clone(),
            resolver.clone(),
            config.general.admin_user_id.clone(),
        )) as Arc<dyn AuthService>;

        Ok(Self {
            config,
            store,
            directory,
            resolver,
            auth,
        })
    }
}
