//! Workspace connection resources

use serde_json::{Map, Value, json};

use azrest::ApiClient;

use super::RemoteResource;
use crate::builder::{Credential, ResolvedResourceSpec};

pub const CONNECTIONS_API_VERSION: &str = "2024-10-01";
pub const KIND: &str = "connection";

/// ARM path of an AI Foundry hub's connections collection
pub fn connections_path(subscription_id: &str, resource_group: &str, hub: &str) -> String {
    format!(
        "subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.MachineLearningServices/workspaces/{hub}/connections"
    )
}

/// Request body for one connection
pub fn connection_body(spec: &ResolvedResourceSpec) -> Value {
    let mut metadata = Map::new();
    metadata.insert("ApiType".into(), json!("Azure"));
    if let Some(id) = &spec.resource_id {
        metadata.insert("ResourceId".into(), json!(id));
    }
    if let Some(version) = &spec.api_version {
        metadata.insert("ApiVersion".into(), json!(version));
    }

    let mut properties = Map::new();
    properties.insert("category".into(), json!(spec.category.connection_category()));
    properties.insert("target".into(), json!(spec.endpoint));
    match &spec.credential {
        Credential::ApiKey(key) => {
            properties.insert("authType".into(), json!("ApiKey"));
            properties.insert("credentials".into(), json!({ "key": key.expose() }));
        }
        Credential::Identity => {
            properties.insert("authType".into(), json!("AAD"));
        }
    }
    properties.insert("isSharedToAll".into(), json!(spec.is_shared));
    properties.insert("metadata".into(), Value::Object(metadata));

    json!({ "properties": properties })
}

/// Upsert resource registering `spec` under the hub's connections
pub fn connection_resource(arm: &ApiClient, collection: &str, spec: &ResolvedResourceSpec) -> RemoteResource {
    RemoteResource::upsert(arm, KIND, collection, &spec.name, connection_body(spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ApiKey;
    use crate::definition::Category;

    fn spec(category: Category, credential: Credential) -> ResolvedResourceSpec {
        ResolvedResourceSpec {
            name: "c1".into(),
            category,
            endpoint: "https://x.example".into(),
            credential,
            resource_id: None,
            is_shared: false,
            api_version: None,
        }
    }

    #[test]
    fn test_key_connection_body() {
        let mut s = spec(Category::AzureOpenAI, Credential::ApiKey(ApiKey::new("k")));
        s.api_version = Some("2024-10-21".into());
        s.resource_id = Some("/subscriptions/s/accounts/a".into());

        let body = connection_body(&s);

        assert_eq!(body["properties"]["category"], "AzureOpenAI");
        assert_eq!(body["properties"]["authType"], "ApiKey");
        assert_eq!(body["properties"]["credentials"]["key"], "k");
        assert_eq!(body["properties"]["metadata"]["ApiVersion"], "2024-10-21");
        assert_eq!(body["properties"]["metadata"]["ResourceId"], "/subscriptions/s/accounts/a");
    }

    #[test]
    fn test_identity_connection_body() {
        let body = connection_body(&spec(Category::CognitiveSearch, Credential::Identity));

        assert_eq!(body["properties"]["authType"], "AAD");
        assert!(body["properties"].get("credentials").is_none());
        assert!(body["properties"]["metadata"].get("ApiVersion").is_none());
        assert_eq!(body["properties"]["isSharedToAll"], false);
    }

    #[test]
    fn test_serverless_category_name() {
        let body = connection_body(&spec(Category::AIInference, Credential::ApiKey(ApiKey::new("k"))));
        assert_eq!(body["properties"]["category"], "Serverless");
    }

    #[test]
    fn test_connections_path() {
        assert_eq!(
            connections_path("s", "rg", "hub"),
            "subscriptions/s/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/hub/connections"
        );
    }
}
