//! Gateway and secret resolution for connections fronted by API Management.
//!
//! Two sources produce the same [`Gateway`]:
//! - [`ApimGateway`] lists the service's subscriptions, picks one by display
//!   name and reads its primary key through the management API.
//! - [`SecretStoreGateway`] reads the key from Key Vault and joins a
//!   separately configured gateway URL with the API path.

use serde_json::Value;

use azrest::ApiClient;

use crate::builder::ApiKey;
use crate::error::{ProvisionError, Result};
use crate::session::Session;

pub const APIM_API_VERSION: &str = "2024-06-01-preview";
pub const APIM_GATEWAY_DOMAIN: &str = "azure-api.net";

/// Resolved gateway endpoint and key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gateway {
    pub base_url: String,
    pub key: ApiKey,
}

/// Anything that can resolve a gateway for a service/subscription pair.
pub trait GatewaySource {
    fn resolve(&self, service: &str, subscription_display_name: &str, api_path: &str)
    -> Result<Gateway>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySubscription {
    /// Subscription id (resource name)
    pub name: String,
    pub display_name: String,
}

/// Pick the subscription whose display name matches; if none does and the
/// service has exactly one subscription, use that one.
pub fn select_subscription<'a>(
    subscriptions: &'a [GatewaySubscription],
    display_name: &str,
) -> Option<&'a GatewaySubscription> {
    subscriptions
        .iter()
        .find(|s| s.display_name == display_name)
        .or(match subscriptions {
            [only] => Some(only),
            _ => None,
        })
}

/// Join a base URL and an API path with exactly one slash.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

/// `https://{service}.azure-api.net/{api_path}`
pub fn gateway_url(service: &str, api_path: &str) -> String {
    join_url(&format!("https://{service}.{APIM_GATEWAY_DOMAIN}"), api_path)
}

/// Gateway keys read through the API Management control plane.
pub struct ApimGateway {
    arm: ApiClient,
    subscription_id: String,
    resource_group: String,
}

impl ApimGateway {
    pub fn new(session: &Session, subscription_id: &str, resource_group: &str) -> Self {
        Self {
            arm: session.arm(APIM_API_VERSION),
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
        }
    }

    fn subscriptions_path(&self, service: &str) -> String {
        format!(
            "subscriptions/{}/resourceGroups/{}/providers/Microsoft.ApiManagement/service/{service}/subscriptions",
            self.subscription_id, self.resource_group
        )
    }

    pub fn subscriptions(&self, service: &str) -> Result<Vec<GatewaySubscription>> {
        let items = self.arm.list(&self.subscriptions_path(service))?;
        Ok(items
            .iter()
            .filter_map(|item| {
                let name = item.get("name")?.as_str()?.to_string();
                let display_name = item
                    .pointer("/properties/displayName")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Some(GatewaySubscription { name, display_name })
            })
            .collect())
    }

    fn primary_key(&self, service: &str, subscription: &str) -> Result<ApiKey> {
        let secrets = self
            .arm
            .action(&self.subscriptions_path(service), subscription, "listSecrets")?;
        secrets
            .get("primaryKey")
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .map(ApiKey::new)
            .ok_or_else(|| {
                ProvisionError::Remote(azrest::Error::InvalidResponse {
                    url: format!("{service}/subscriptions/{subscription}/listSecrets"),
                    message: "no primaryKey in response".to_string(),
                })
            })
    }
}

impl GatewaySource for ApimGateway {
    fn resolve(&self, service: &str, subscription_display_name: &str, api_path: &str) -> Result<Gateway> {
        let subscriptions = self.subscriptions(service)?;
        let chosen = select_subscription(&subscriptions, subscription_display_name).ok_or_else(|| {
            ProvisionError::GatewaySubscriptionNotFound {
                service: service.to_string(),
                wanted: subscription_display_name.to_string(),
                available: subscriptions.iter().map(|s| s.display_name.clone()).collect(),
            }
        })?;

        if chosen.display_name != subscription_display_name {
            log::warn!(
                "No gateway subscription named '{subscription_display_name}' on '{service}'; using the only one, '{}'",
                chosen.display_name
            );
        }

        Ok(Gateway {
            base_url: gateway_url(service, api_path),
            key: self.primary_key(service, &chosen.name)?,
        })
    }
}

/// Key Vault secrets.
pub struct KeyVaultSecrets {
    client: ApiClient,
}

impl KeyVaultSecrets {
    pub fn new(session: &Session, vault: &str) -> Self {
        Self {
            client: session.key_vault(vault),
        }
    }

    pub fn secret(&self, name: &str) -> Result<ApiKey> {
        let found = self.client.get("secrets", name)?;
        found
            .as_ref()
            .and_then(|s| s.get("value"))
            .and_then(Value::as_str)
            .map(ApiKey::new)
            .ok_or_else(|| ProvisionError::validation(name, "secret not found in Key Vault"))
    }
}

/// Gateway with a fixed URL and a key kept in a secret store.
pub struct SecretStoreGateway {
    secrets: KeyVaultSecrets,
    gateway_url: String,
    secret_name: String,
}

impl SecretStoreGateway {
    pub fn new(secrets: KeyVaultSecrets, gateway_url: &str, secret_name: &str) -> Self {
        Self {
            secrets,
            gateway_url: gateway_url.to_string(),
            secret_name: secret_name.to_string(),
        }
    }
}

impl GatewaySource for SecretStoreGateway {
    fn resolve(&self, _service: &str, _subscription_display_name: &str, api_path: &str) -> Result<Gateway> {
        Ok(Gateway {
            base_url: join_url(&self.gateway_url, api_path),
            key: self.secrets.secret(&self.secret_name)?,
        })
    }
}
