//! Declarative connection definitions.
//!
//! File format:
//!
//! ```json
//! {
//!   "connections": {
//!     "aoai": {
//!       "name": "aoai-main",
//!       "category": "AzureOpenAI",
//!       "target": "https://{AZURE_OPENAI_SERVICE_NAME}.openai.azure.com",
//!       "resource_id": "{AZURE_OPENAI_RESOURCE.id}",
//!       "use_gateway": true,
//!       "api_path": "openai",
//!       "gateway_service_name": "{AZURE_APIM_SERVICE_NAME}",
//!       "gateway_subscription_display_name": "openai"
//!     }
//!   }
//! }
//! ```
//!
//! `use_apim`, `apim_service_name` and `apim_subscription_display_name` are
//! accepted as aliases.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProvisionError, Result};

/// Kinds of connection the builder knows how to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    AzureOpenAI,
    AIInference,
    CognitiveServices,
    CognitiveSearch,
}

/// What a category needs before it can be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Nothing beyond the target URL
    None,
    /// An API key, either direct or from a gateway
    Credential,
    /// A resource id
    ResourceId,
    /// A key, or failing that a resource id for identity-based access
    CredentialOrResourceId,
}

impl Category {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "AzureOpenAI" => Some(Self::AzureOpenAI),
            "AIInference" => Some(Self::AIInference),
            "CognitiveServices" => Some(Self::CognitiveServices),
            "CognitiveSearch" => Some(Self::CognitiveSearch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AzureOpenAI => "AzureOpenAI",
            Self::AIInference => "AIInference",
            Self::CognitiveServices => "CognitiveServices",
            Self::CognitiveSearch => "CognitiveSearch",
        }
    }

    pub fn requirement(&self) -> Requirement {
        match self {
            Self::AzureOpenAI => Requirement::None,
            Self::AIInference => Requirement::Credential,
            Self::CognitiveServices => Requirement::ResourceId,
            Self::CognitiveSearch => Requirement::CredentialOrResourceId,
        }
    }

    /// Category name used by the workspace connections API.
    pub fn connection_category(&self) -> &'static str {
        match self {
            Self::AzureOpenAI => "AzureOpenAI",
            Self::AIInference => "Serverless",
            Self::CognitiveServices => "AIServices",
            Self::CognitiveSearch => "CognitiveSearch",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One connection as written in the definition file. Every string field may
/// contain `{KEY}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub name: String,
    pub category: String,
    #[serde(default, rename = "target")]
    pub target_template: String,
    #[serde(default, rename = "api_path")]
    pub api_path_template: Option<String>,
    /// `{OUTER.ATTR}` here reads one attribute of a JSON blob setting
    #[serde(default, rename = "resource_id")]
    pub resource_id_template: Option<String>,
    #[serde(default, rename = "api_key")]
    pub api_key_template: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default, alias = "use_apim")]
    pub use_gateway: bool,
    #[serde(default)]
    pub is_shared: bool,
    #[serde(default, alias = "apim_service_name")]
    pub gateway_service_name: Option<String>,
    #[serde(default, alias = "apim_subscription_display_name")]
    pub gateway_subscription_display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectionsFile {
    #[serde(default)]
    connections: Map<String, Value>,
}

/// Expand `~` and read a file.
pub fn read_file(path: &str) -> Result<String> {
    let expanded = PathBuf::from(shellexpand::tilde(path).as_ref());
    fs::read_to_string(&expanded).map_err(|e| ProvisionError::Definition {
        path: expanded.display().to_string(),
        message: e.to_string(),
    })
}

/// Read and parse a JSON definition file.
pub fn load_json<T: DeserializeOwned>(path: &str) -> Result<T> {
    let content = read_file(path)?;
    serde_json::from_str(&content).map_err(|e| ProvisionError::Definition {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Parse a connections document, keeping the file's key order.
pub fn parse_connections(path: &str, content: &str) -> Result<Vec<(String, ResourceDefinition)>> {
    let invalid = |message: String| ProvisionError::Definition {
        path: path.to_string(),
        message,
    };

    let file: ConnectionsFile = serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?;
    file.connections
        .into_iter()
        .map(|(key, value)| {
            serde_json::from_value(value)
                .map(|def| (key.clone(), def))
                .map_err(|e| invalid(format!("connection '{key}': {e}")))
        })
        .collect()
}

pub fn load_connections(path: &str) -> Result<Vec<(String, ResourceDefinition)>> {
    let content = read_file(path)?;
    parse_connections(path, &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "connections": {
            "zeta": {"name": "search", "category": "CognitiveSearch", "target": "https://{S}.search.windows.net"},
            "alpha": {
                "name": "aoai",
                "category": "AzureOpenAI",
                "target": "x",
                "use_apim": true,
                "apim_service_name": "{APIM}",
                "apim_subscription_display_name": "openai",
                "api_path": "openai",
                "is_shared": true
            }
        }
    }"#;

    #[test]
    fn test_parse_keeps_order_and_aliases() {
        let defs = parse_connections("c.json", SAMPLE).unwrap();

        assert_eq!(defs[0].0, "zeta");
        assert_eq!(defs[1].0, "alpha");

        let aoai = &defs[1].1;
        assert!(aoai.use_gateway);
        assert!(aoai.is_shared);
        assert_eq!(aoai.gateway_service_name.as_deref(), Some("{APIM}"));
        assert_eq!(aoai.gateway_subscription_display_name.as_deref(), Some("openai"));
        assert_eq!(aoai.api_path_template.as_deref(), Some("openai"));
        assert_eq!(defs[0].1.resource_id_template, None);
    }

    #[test]
    fn test_parse_reports_bad_entry() {
        let err = parse_connections("c.json", r#"{"connections": {"x": {"category": "AzureOpenAI"}}}"#)
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Definition { .. }));
        assert!(err.to_string().contains("connection 'x'"));
    }

    #[test]
    fn test_missing_connections_key_is_empty() {
        assert!(parse_connections("c.json", "{}").unwrap().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let defs = load_connections(file.path().to_str().unwrap()).unwrap();
        assert_eq!(defs.len(), 2);

        assert!(load_connections("/nonexistent/connections.json").is_err());
    }

    #[test]
    fn test_category_contracts() {
        assert_eq!(Category::parse("AIInference"), Some(Category::AIInference));
        assert_eq!(Category::parse("Serverless"), None);
        assert_eq!(Category::AIInference.requirement(), Requirement::Credential);
        assert_eq!(Category::CognitiveServices.connection_category(), "AIServices");
        assert_eq!(Category::CognitiveSearch.to_string(), "CognitiveSearch");
    }

    #[test]
    fn test_bundled_definitions_parse() {
        let defs = load_connections("config/aifoundry/connections.json").unwrap();
        assert_eq!(defs.len(), 4);
        assert!(defs.iter().all(|(_, d)| Category::parse(&d.category).is_some()));

        let rai: Value = load_json("config/rai/policies.json").unwrap();
        assert!(rai["policies"].is_array());
        assert_eq!(rai["deployments"][0]["policy"], "MainRAIpolicy");
        assert_eq!(rai["policy_assignments"], json!(["MainRAIpolicy", "MainBlockListPolicy"]));
    }
}
