//! App Configuration data-plane client.

use std::sync::Arc;

use azrest::{ApiClient, Method, TokenProvider, Transport, scopes};
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::store::{ConfigEntry, ConfigStore};

/// Data-plane API version.
pub const API_VERSION: &str = "1.0";

const KV_CONTENT_TYPE: &str = "application/vnd.microsoft.appconfig.kv+json";

/// Label value the service uses to mean "no label" in list filters.
const NULL_LABEL: &str = "\0";

/// Sovereign cloud hosting the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cloud {
    #[default]
    Public,
    UsGovernment,
    China,
}

impl Cloud {
    /// Parse the `AZURE_CLOUD` naming used by deployment tooling.
    pub fn from_name(name: &str) -> Self {
        match name {
            "AzureUSGovernment" => Self::UsGovernment,
            "AzureChinaCloud" => Self::China,
            _ => Self::Public,
        }
    }

    pub fn app_config_suffix(&self) -> &'static str {
        match self {
            Self::Public => "azconfig.io",
            Self::UsGovernment => "azconfig.azure.us",
            Self::China => "azconfig.cn",
        }
    }
}

/// `https://{name}.{suffix}` for a store name.
pub fn endpoint_for(store_name: &str, cloud: Cloud) -> String {
    format!("https://{}.{}", store_name, cloud.app_config_suffix())
}

#[derive(Debug, Deserialize)]
struct KeyValue {
    key: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

impl From<KeyValue> for ConfigEntry {
    fn from(kv: KeyValue) -> Self {
        Self {
            key: kv.key,
            label: kv.label,
            value: kv.value.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct KeyValuePage {
    #[serde(default)]
    items: Vec<KeyValue>,
}

/// Remote [`ConfigStore`] backed by the App Configuration REST API.
pub struct AppConfigClient {
    api: ApiClient,
}

impl AppConfigClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
        endpoint: impl Into<String>,
    ) -> Self {
        let api = ApiClient::new(transport, tokens, endpoint, API_VERSION, scopes::APP_CONFIG)
            .with_content_type(KV_CONTENT_TYPE);
        Self { api }
    }

    pub fn endpoint(&self) -> &str {
        self.api.endpoint()
    }
}

impl ConfigStore for AppConfigClient {
    fn get(&self, key: &str, label: Option<&str>) -> Result<Option<ConfigEntry>> {
        let url = self.api.resource_url("kv", key);
        let query: Vec<(&str, &str)> = label.map(|l| ("label", l)).into_iter().collect();

        let outcome = self.api.send(Method::Get, &url, &query, None)?;
        if outcome.is_not_found() {
            return Ok(None);
        }
        let body = outcome.error_for_status()?.json()?;
        let kv: KeyValue = serde_json::from_value(body).map_err(|e| {
            Error::Store(azrest::Error::InvalidResponse {
                url,
                message: e.to_string(),
            })
        })?;
        Ok(Some(kv.into()))
    }

    fn set(&self, key: &str, label: Option<&str>, value: &str) -> Result<()> {
        let url = self.api.resource_url("kv", key);
        let query: Vec<(&str, &str)> = label.map(|l| ("label", l)).into_iter().collect();

        self.api
            .send(Method::Put, &url, &query, Some(&json!({ "value": value })))?
            .error_for_status()?;
        Ok(())
    }

    fn list(&self, prefix: Option<&str>, label: Option<&str>) -> Result<Vec<ConfigEntry>> {
        let url = self.api.collection_url("kv");
        let key_filter = prefix.map(|p| format!("{p}*")).unwrap_or_else(|| "*".to_string());
        let query = [
            ("key", key_filter.as_str()),
            ("label", label.unwrap_or(NULL_LABEL)),
        ];

        let body = self
            .api
            .send(Method::Get, &url, &query, None)?
            .error_for_status()?
            .json()?;
        let page: KeyValuePage = serde_json::from_value(body).map_err(|e| {
            Error::Store(azrest::Error::InvalidResponse {
                url,
                message: e.to_string(),
            })
        })?;
        Ok(page.items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azrest::{MemoryTransport, StaticToken};

    fn client(transport: &Arc<MemoryTransport>) -> AppConfigClient {
        AppConfigClient::new(
            Arc::clone(transport) as Arc<dyn Transport>,
            Arc::new(StaticToken::new("tok")),
            "https://cfg.azconfig.io",
        )
    }

    #[test]
    fn test_endpoint_for_clouds() {
        assert_eq!(endpoint_for("cfg", Cloud::Public), "https://cfg.azconfig.io");
        assert_eq!(
            endpoint_for("cfg", Cloud::from_name("AzureUSGovernment")),
            "https://cfg.azconfig.azure.us"
        );
        assert_eq!(endpoint_for("cfg", Cloud::from_name("AzureChinaCloud")), "https://cfg.azconfig.cn");
        assert_eq!(Cloud::from_name("AzureCloud"), Cloud::Public);
    }

    #[test]
    fn test_get_parses_key_value() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert(
            "https://cfg.azconfig.io/kv/AZURE_SUBSCRIPTION_ID",
            json!({"key": "AZURE_SUBSCRIPTION_ID", "label": "infra", "value": "sub-1"}),
        );

        let entry = client(&transport)
            .get("AZURE_SUBSCRIPTION_ID", Some("infra"))
            .unwrap()
            .unwrap();

        assert_eq!(entry.value, "sub-1");
        assert_eq!(entry.label.as_deref(), Some("infra"));
        let request = &transport.requests()[0];
        assert_eq!(request.query_value("label"), Some("infra"));
        assert_eq!(request.query_value("api-version"), Some(API_VERSION));
    }

    #[test]
    fn test_get_missing_is_none() {
        let transport = Arc::new(MemoryTransport::new());
        assert!(client(&transport).get("NOPE", None).unwrap().is_none());
    }

    #[test]
    fn test_set_puts_value_with_kv_content_type() {
        let transport = Arc::new(MemoryTransport::new());
        client(&transport).set("K", None, "v").unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.header_value("Content-Type"), Some(KV_CONTENT_TYPE));
        assert_eq!(
            transport.resource("https://cfg.azconfig.io/kv/K"),
            Some(json!({"value": "v"}))
        );
    }

    #[test]
    fn test_set_failure_is_store_error() {
        let transport = Arc::new(MemoryTransport::new());
        transport.fail(Method::Put, "/kv/", 403, "forbidden");

        let err = client(&transport).set("K", None, "v").unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[test]
    fn test_list_reads_items_page() {
        let transport = Arc::new(MemoryTransport::new());
        transport.respond(
            Method::Get,
            "https://cfg.azconfig.io/kv",
            200,
            json!({"items": [
                {"key": "AZURE_A", "label": "infra", "value": "1"},
                {"key": "AZURE_B", "label": "infra", "value": null}
            ]}),
        );

        let entries = client(&transport).list(Some("AZURE_"), Some("infra")).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].value, "");
        assert_eq!(transport.requests()[0].query_value("key"), Some("AZURE_*"));
    }
}
