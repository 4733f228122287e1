//! Resource Spec Builder: definition + config store → fully resolved spec.

use std::fmt;

use appconfig::Resolver;

use crate::definition::{Category, Requirement, ResourceDefinition};
use crate::error::{ProvisionError, Result};
use crate::gateway::GatewaySource;

/// A secret key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    ApiKey(ApiKey),
    /// Microsoft Entra ID (managed identity / user) auth
    Identity,
}

impl Credential {
    pub fn is_key(&self) -> bool {
        matches!(self, Self::ApiKey(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResourceSpec {
    pub name: String,
    pub category: Category,
    pub endpoint: String,
    pub credential: Credential,
    pub resource_id: Option<String>,
    pub is_shared: bool,
    /// Only set for `AzureOpenAI`
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Ready(ResolvedResourceSpec),
    /// Not buildable but not an error either (unknown category)
    Skipped { name: String, reason: String },
}

pub struct SpecBuilder<'a> {
    resolver: &'a Resolver,
    gateway: &'a dyn GatewaySource,
    default_api_version: String,
}

impl<'a> SpecBuilder<'a> {
    pub fn new(
        resolver: &'a Resolver,
        gateway: &'a dyn GatewaySource,
        default_api_version: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            gateway,
            default_api_version: default_api_version.into(),
        }
    }

    /// Build one spec.
    ///
    /// Template failures come back as fatal [`ProvisionError::Config`];
    /// category violations and gateway lookups only fail this resource.
    pub fn build(&self, def: &ResourceDefinition) -> Result<BuildOutcome> {
        let Some(category) = Category::parse(&def.category) else {
            log::warn!("Unknown category '{}' for '{}'; skipping", def.category, def.name);
            return Ok(BuildOutcome::Skipped {
                name: def.name.clone(),
                reason: format!("unknown category '{}'", def.category),
            });
        };

        let mut endpoint = self.resolver.resolve(&def.target_template)?;
        let api_path = self.resolver.resolve_opt(def.api_path_template.as_deref())?;
        let resource_id = self
            .resolver
            .resolve_opt(def.resource_id_template.as_deref())?
            .filter(|id| !id.is_empty());
        let mut credential = match self.resolver.resolve_opt(def.api_key_template.as_deref())? {
            Some(key) => Credential::ApiKey(ApiKey::new(key)),
            None => Credential::Identity,
        };

        if def.use_gateway {
            let service = self.required(def, def.gateway_service_name.as_deref(), "gateway_service_name")?;
            let display_name = self.required(
                def,
                def.gateway_subscription_display_name.as_deref(),
                "gateway_subscription_display_name",
            )?;
            let gateway = self
                .gateway
                .resolve(&service, &display_name, api_path.as_deref().unwrap_or_default())?;
            log::debug!("'{}' routed through gateway {}", def.name, gateway.base_url);
            endpoint = gateway.base_url;
            credential = Credential::ApiKey(gateway.key);
        }

        match category.requirement() {
            Requirement::None => {}
            Requirement::Credential if !credential.is_key() => {
                return Err(ProvisionError::validation(
                    &def.name,
                    format!("{category} requires api_key or a gateway"),
                ));
            }
            Requirement::Credential => {}
            Requirement::ResourceId if resource_id.is_none() => {
                return Err(ProvisionError::validation(
                    &def.name,
                    format!("{category} requires resource_id"),
                ));
            }
            Requirement::ResourceId => {}
            Requirement::CredentialOrResourceId => {
                if !credential.is_key() {
                    match &resource_id {
                        Some(id) => endpoint = id.clone(),
                        None => {
                            return Err(ProvisionError::validation(
                                &def.name,
                                format!("{category} requires api_key or resource_id"),
                            ));
                        }
                    }
                }
            }
        }

        let api_version = (category == Category::AzureOpenAI)
            .then(|| def.api_version.clone().unwrap_or_else(|| self.default_api_version.clone()));

        Ok(BuildOutcome::Ready(ResolvedResourceSpec {
            name: def.name.clone(),
            category,
            endpoint,
            credential,
            resource_id,
            is_shared: def.is_shared,
            api_version,
        }))
    }

    fn required(&self, def: &ResourceDefinition, template: Option<&str>, field: &str) -> Result<String> {
        match self.resolver.resolve_opt(template)? {
            Some(value) => Ok(value),
            None => Err(ProvisionError::validation(
                &def.name,
                format!("use_gateway requires {field}"),
            )),
        }
    }
}
