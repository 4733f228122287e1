//! Search asset chains: datasource → index → skillset → indexer
//!
//! Asset names derive from the index name:
//!
//! | Asset      | Name                                   | Policy  |
//! |------------|----------------------------------------|---------|
//! | Datasource | `{index}-datasource`                   | upsert  |
//! | Index      | `{index}`                              | replace |
//! | Skillset   | `{index}-skillset-chunking` / `-embed` | replace |
//! | Indexer    | `{index}-indexer`                      | upsert  |

use serde_json::{Value, json};

use appconfig::Resolver;
use azrest::{ApiClient, SettleConfig};
use declarative::Chain;

use super::{Policy, RemoteResource, resource_id};
use crate::gateway::Gateway;
use crate::error::{ProvisionError, Result};

pub const DEFAULT_ANALYZER: &str = "standard.lucene";
pub const DEFAULT_INTERVAL: &str = "PT2H";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillsetKind {
    /// Custom web skill calling the data-ingest container
    Chunking,
    /// Azure OpenAI embeddings through the gateway
    Embedding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchAsset {
    Datasource,
    Index,
    Skillset(SkillsetKind),
    Indexer,
}

impl SearchAsset {
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Datasource => "datasources",
            Self::Index => "indexes",
            Self::Skillset(_) => "skillsets",
            Self::Indexer => "indexers",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Datasource => "search_datasource",
            Self::Index => "search_index",
            Self::Skillset(_) => "search_skillset",
            Self::Indexer => "search_indexer",
        }
    }

    pub fn name(&self, index: &str) -> String {
        match self {
            Self::Datasource => format!("{index}-datasource"),
            Self::Index => index.to_string(),
            Self::Skillset(SkillsetKind::Chunking) => format!("{index}-skillset-chunking"),
            Self::Skillset(SkillsetKind::Embedding) => format!("{index}-skillset-embed"),
            Self::Indexer => format!("{index}-indexer"),
        }
    }

    pub fn policy(&self) -> Policy {
        match self {
            Self::Datasource | Self::Indexer => Policy::Upsert,
            Self::Index | Self::Skillset(_) => Policy::Replace,
        }
    }

    pub fn id(&self, index: &str) -> String {
        resource_id(self.kind(), &self.name(index))
    }
}

/// Which index schema to create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexProfile {
    Rag,
    Queries,
    Tables,
    Measures,
}

impl IndexProfile {
    pub const NL2SQL: [Self; 3] = [Self::Queries, Self::Tables, Self::Measures];

    pub fn index_name(&self, base: &str) -> String {
        match self {
            Self::Rag => base.to_string(),
            Self::Queries => format!("{base}-queries"),
            Self::Tables => format!("{base}-tables"),
            Self::Measures => format!("{base}-measures"),
        }
    }

    pub fn skillset(&self) -> SkillsetKind {
        match self {
            Self::Rag => SkillsetKind::Chunking,
            _ => SkillsetKind::Embedding,
        }
    }

    pub fn fields(&self, analyzer: &str, dimensions: u32) -> Value {
        let text_field = match self {
            Self::Rag => "content",
            Self::Queries => "question",
            Self::Tables | Self::Measures => "description",
        };
        let key = if *self == Self::Rag {
            json!({"name": "id", "type": "Edm.String", "key": true, "searchable": false})
        } else {
            json!({"name": "id", "type": "Edm.String", "key": true})
        };
        let mut vector = json!({
            "name": "contentVector",
            "type": "Collection(Edm.Single)",
            "searchable": true,
            "dimensions": dimensions
        });
        if *self == Self::Rag {
            vector["retrievable"] = json!(true);
        }

        json!([
            key,
            {"name": text_field, "type": "Edm.String", "searchable": true, "analyzer": analyzer},
            vector
        ])
    }
}

/// Everything the search chains read from the configuration store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    pub subscription_id: String,
    pub resource_group: String,
    pub container_group: String,
    pub service: String,
    pub api_version: String,
    pub base_index: String,
    pub storage_resource_group: String,
    pub storage_account: String,
    pub storage_container: String,
    pub key_vault: String,
    pub gateway_url: String,
    pub openai_api_path: String,
    pub openai_api_version: String,
    pub embedding_deployment: String,
    pub embedding_model: String,
    pub vector_size: u32,
    pub gateway_secret_name: String,
    pub analyzer: String,
    pub interval: String,
}

impl SearchSettings {
    pub fn load(resolver: &Resolver) -> Result<Self> {
        let get = |key: &str| resolver.lookup(key);
        let vector_raw = get("AZURE_EMBEDDINGS_VECTOR_SIZE")?;
        let vector_size = vector_raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| {
                ProvisionError::validation(
                    "AZURE_EMBEDDINGS_VECTOR_SIZE",
                    format!("expected a positive integer, got '{vector_raw}'"),
                )
            })?;

        Ok(Self {
            subscription_id: get("AZURE_SUBSCRIPTION_ID")?,
            resource_group: get("AZURE_RESOURCE_GROUP")?,
            container_group: get("AZURE_DATA_INGEST_CONTAINER_APP_NAME")?,
            service: get("AZURE_SEARCH_SERVICE_NAME")?,
            api_version: get("AZURE_SEARCH_API_VERSION")?,
            base_index: get("AZURE_SEARCH_INDEX_NAME")?,
            storage_resource_group: get("AZURE_STORAGE_ACCOUNT_RG")?,
            storage_account: get("AZURE_STORAGE_ACCOUNT_NAME")?,
            storage_container: get("AZURE_STORAGE_CONTAINER")?,
            key_vault: get("AZURE_KEY_VAULT_NAME")?,
            gateway_url: get("AZURE_APIM_GATEWAY_URL")?,
            openai_api_path: get("AZURE_APIM_OPENAI_API_PATH")?,
            openai_api_version: get("AZURE_OPENAI_API_VERSION")?,
            embedding_deployment: get("AZURE_OPENAI_EMBEDDING_DEPLOYMENT")?,
            embedding_model: get("AZURE_OPENAI_EMBEDDING_MODEL_NAME")?,
            vector_size,
            gateway_secret_name: get("AZURE_APIM_SUBSCRIPTION_SECRET_NAME")?,
            analyzer: resolver
                .lookup_optional("SEARCH_ANALYZER_NAME")?
                .unwrap_or_else(|| DEFAULT_ANALYZER.to_string()),
            interval: resolver
                .lookup_optional("SEARCH_INDEX_INTERVAL")?
                .unwrap_or_else(|| DEFAULT_INTERVAL.to_string()),
        })
    }

    fn storage_resource_id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Storage/storageAccounts/{}",
            self.subscription_id, self.storage_resource_group, self.storage_account
        )
    }
}

pub fn datasource_body(index: &str, settings: &SearchSettings) -> Value {
    json!({
        "name": SearchAsset::Datasource.name(index),
        "description": format!("Blob datastore for {index}"),
        "type": "azureblob",
        "credentials": {"managedIdentityResourceId": settings.storage_resource_id()},
        "container": {"name": settings.storage_container}
    })
}

pub fn index_body(index: &str, fields: Value) -> Value {
    json!({"name": index, "fields": fields})
}

pub fn chunking_skillset_body(index: &str, container_fqdn: &str) -> Value {
    json!({
        "name": SearchAsset::Skillset(SkillsetKind::Chunking).name(index),
        "skills": [{
            "@odata.type": "#Microsoft.Skills.Custom.WebApiSkill",
            "name": "document-chunking",
            "httpMethod": "POST",
            "uri": format!("https://{container_fqdn}/document-chunking"),
            "timeout": "PT230S",
            "batchSize": 1,
            "context": "/document",
            "inputs": [{"name": "documentUrl", "source": "/document/metadata_storage_path"}],
            "outputs": [{"name": "chunks", "targetName": "chunks"}]
        }]
    })
}

pub fn embedding_skillset_body(index: &str, settings: &SearchSettings, gateway: &Gateway) -> Value {
    json!({
        "name": SearchAsset::Skillset(SkillsetKind::Embedding).name(index),
        "skills": [{
            "@odata.type": "#Microsoft.Skills.Text.AzureOpenAIEmbeddingSkill",
            "name": "embedding-skill",
            "description": format!("Generate embeddings for {index} via APIM"),
            "resourceUri": format!("{}?api-version={}", gateway.base_url, settings.openai_api_version),
            "apiKey": gateway.key.expose(),
            "deploymentId": settings.embedding_deployment,
            "modelName": settings.embedding_model,
            "dimensions": settings.vector_size,
            "inputs": [{"name": "text", "source": "/document/content"}],
            "outputs": [{"name": "embedding", "targetName": "contentVector"}]
        }]
    })
}

pub fn indexer_body(index: &str, skillset: SkillsetKind, interval: &str) -> Value {
    json!({
        "name": SearchAsset::Indexer.name(index),
        "dataSourceName": SearchAsset::Datasource.name(index),
        "targetIndexName": index,
        "skillsetName": SearchAsset::Skillset(skillset).name(index),
        "schedule": {"interval": interval}
    })
}

/// Inputs a chain needs beyond the settings
pub enum SkillInput<'a> {
    ContainerFqdn(&'a str),
    Gateway(&'a Gateway),
}

fn search_resource(client: &ApiClient, asset: SearchAsset, index: &str, body: Value, settle: &SettleConfig) -> RemoteResource {
    let resource = RemoteResource::upsert(client, asset.kind(), asset.collection(), asset.name(index), body);
    match asset.policy() {
        Policy::Upsert => resource,
        Policy::Replace => resource.replacing(settle),
    }
}

/// The four-step chain for one index profile
pub fn asset_chain(
    client: &ApiClient,
    settings: &SearchSettings,
    profile: IndexProfile,
    input: &SkillInput<'_>,
    settle: &SettleConfig,
) -> Chain {
    let index = profile.index_name(&settings.base_index);
    let kind = profile.skillset();
    let skillset_body = match input {
        SkillInput::ContainerFqdn(fqdn) => chunking_skillset_body(&index, fqdn),
        SkillInput::Gateway(gateway) => embedding_skillset_body(&index, settings, gateway),
    };
    let fields = profile.fields(&settings.analyzer, settings.vector_size);

    let mut chain = Chain::new(index.clone());
    chain.push(Box::new(search_resource(client, SearchAsset::Datasource, &index, datasource_body(&index, settings), settle)));
    chain.push(Box::new(search_resource(client, SearchAsset::Index, &index, index_body(&index, fields), settle)));
    chain.push(Box::new(search_resource(client, SearchAsset::Skillset(kind), &index, skillset_body, settle)));
    chain.push(Box::new(search_resource(
        client,
        SearchAsset::Indexer,
        &index,
        indexer_body(&index, kind, &settings.interval),
        settle,
    )));
    chain
}

#[cfg(test)]
pub(crate) const TEST_SETTINGS: &[(&str, &str)] = &[
    ("AZURE_SUBSCRIPTION_ID", "sub-1"),
    ("AZURE_RESOURCE_GROUP", "rg-1"),
    ("AZURE_DATA_INGEST_CONTAINER_APP_NAME", "ingest"),
    ("AZURE_SEARCH_SERVICE_NAME", "srch"),
    ("AZURE_SEARCH_API_VERSION", "2024-07-01"),
    ("AZURE_SEARCH_INDEX_NAME", "docs"),
    ("AZURE_STORAGE_ACCOUNT_RG", "rg-st"),
    ("AZURE_STORAGE_ACCOUNT_NAME", "st1"),
    ("AZURE_STORAGE_CONTAINER", "documents"),
    ("AZURE_KEY_VAULT_NAME", "kv1"),
    ("AZURE_APIM_GATEWAY_URL", "https://apim1.azure-api.net/"),
    ("AZURE_APIM_OPENAI_API_PATH", "openai"),
    ("AZURE_OPENAI_API_VERSION", "2024-10-21"),
    ("AZURE_OPENAI_EMBEDDING_DEPLOYMENT", "text-embedding"),
    ("AZURE_OPENAI_EMBEDDING_MODEL_NAME", "text-embedding-3-large"),
    ("AZURE_EMBEDDINGS_VECTOR_SIZE", "3072"),
    ("AZURE_APIM_SUBSCRIPTION_SECRET_NAME", "apim-key"),
];
