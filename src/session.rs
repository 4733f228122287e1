//! Explicit run context handed to every command.
//!
//! Owns the transport and token provider so that commands and resources never
//! reach for process-wide state. Tests build one over a `MemoryTransport`.

use std::sync::Arc;

use appconfig::{AppConfigClient, ConfigStore, Resolver};
use azrest::{ApiClient, SettleConfig, TokenProvider, Transport, scopes};
use declarative::{ExecuteOptions, FailurePolicy};

pub const ARM_ENDPOINT: &str = "https://management.azure.com";
pub const SEARCH_DOMAIN: &str = "search.windows.net";
pub const KEY_VAULT_DOMAIN: &str = "vault.azure.net";
pub const KEY_VAULT_API_VERSION: &str = "7.4";

pub struct Session {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
    pub settle: SettleConfig,
    pub dry_run: bool,
    pub verbose: u8,
    /// `type` or `type.name` filter applied to every plan
    pub target: Option<String>,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            transport,
            tokens,
            settle: SettleConfig::default(),
            dry_run: false,
            verbose: 0,
            target: None,
        }
    }

    pub fn with_settle(mut self, settle: SettleConfig) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    fn client(&self, endpoint: String, api_version: &str, scope: &str) -> ApiClient {
        ApiClient::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.tokens),
            endpoint,
            api_version,
            scope,
        )
    }

    /// Azure Resource Manager at a given provider API version.
    pub fn arm(&self, api_version: &str) -> ApiClient {
        self.client(ARM_ENDPOINT.to_string(), api_version, scopes::MANAGEMENT)
    }

    /// Search data plane of one service.
    pub fn search(&self, service: &str, api_version: &str) -> ApiClient {
        self.client(
            format!("https://{service}.{SEARCH_DOMAIN}"),
            api_version,
            scopes::SEARCH,
        )
    }

    /// Key Vault data plane of one vault.
    pub fn key_vault(&self, vault: &str) -> ApiClient {
        self.client(
            format!("https://{vault}.{KEY_VAULT_DOMAIN}"),
            KEY_VAULT_API_VERSION,
            scopes::KEY_VAULT,
        )
    }

    pub fn app_config(&self, endpoint: &str) -> AppConfigClient {
        AppConfigClient::new(Arc::clone(&self.transport), Arc::clone(&self.tokens), endpoint)
    }

    /// Template resolver over the App Configuration store at `endpoint`.
    pub fn resolver(&self, endpoint: &str, label: Option<&str>) -> Resolver {
        let store: Arc<dyn ConfigStore> = Arc::new(self.app_config(endpoint));
        Resolver::new(store, label)
    }

    pub fn execute_options(&self, policy: FailurePolicy) -> ExecuteOptions {
        ExecuteOptions {
            dry_run: self.dry_run,
            verbose: self.verbose > 0,
            policy,
            target: self.target.clone(),
        }
    }
}

#[cfg(test)]
pub mod testing {
    //! Shared fixtures for command and resource tests.

    use super::*;
    use appconfig::MemoryStore;
    use azrest::{MemoryTransport, StaticToken};

    pub fn session(transport: &Arc<MemoryTransport>) -> Session {
        Session::new(
            Arc::clone(transport) as Arc<dyn Transport>,
            Arc::new(StaticToken::new("test-token")),
        )
        .with_settle(SettleConfig::immediate())
    }

    pub fn resolver(entries: &[(&str, &str)]) -> Resolver {
        let store = MemoryStore::with_entries(Some("infra"), entries.iter().copied());
        Resolver::new(Arc::new(store), Some("infra"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azrest::MemoryTransport;

    #[test]
    fn test_client_endpoints() {
        let transport = Arc::new(MemoryTransport::new());
        let session = testing::session(&transport);

        assert_eq!(session.arm("2021-04-01").endpoint(), ARM_ENDPOINT);
        assert_eq!(
            session.search("srch", "2024-07-01").endpoint(),
            "https://srch.search.windows.net"
        );
        assert_eq!(session.key_vault("kv1").endpoint(), "https://kv1.vault.azure.net");
    }

    #[test]
    fn test_execute_options_follow_session() {
        let transport = Arc::new(MemoryTransport::new());
        let session = testing::session(&transport)
            .with_dry_run(true)
            .with_target(Some("search_index".to_string()));

        let opts = session.execute_options(FailurePolicy::BestEffort);

        assert!(opts.dry_run);
        assert_eq!(opts.policy, FailurePolicy::BestEffort);
        assert_eq!(opts.target.as_deref(), Some("search_index"));
    }
}
