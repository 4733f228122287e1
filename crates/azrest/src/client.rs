//! Apply engine: idempotent calls against one REST endpoint.
//!
//! Every target service (search data plane, ARM providers, App Configuration,
//! Key Vault) is driven through the same shape:
//! `{endpoint}/{resource_type}/{name}?api-version={version}` with a bearer
//! token for the client's scope.
//!
//! Two idempotency policies are offered:
//! - [`ApiClient::create_or_update`] (upsert): one `PUT`, naturally idempotent.
//! - [`ApiClient::replace`]: `DELETE` (404 ignored), settle, then `PUT` the full
//!   body. Used where the service cannot patch nested arrays in place.

use std::sync::Arc;

use serde_json::Value;

use crate::auth::TokenProvider;
use crate::error::{Error, Result};
use crate::settle::SettleConfig;
use crate::transport::{ApiRequest, Method, Transport};

const JSON: &str = "application/json";

/// Outcome of a single call, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusOutcome {
    pub method: Method,
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl StatusOutcome {
    /// Status < 400.
    pub fn is_success(&self) -> bool {
        self.status < 400
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// 201 on PUT means the resource did not exist before.
    pub fn is_created(&self) -> bool {
        self.status == 201
    }

    /// Parse the body as JSON; an empty body parses as `null`.
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body).map_err(|e| Error::InvalidResponse {
            url: self.url.clone(),
            message: e.to_string(),
        })
    }

    /// Turn a failure status into [`Error::Remote`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Remote {
                method: self.method,
                url: self.url,
                status: self.status,
                body: self.body,
            })
        }
    }
}

/// Result of a replace: whether something was deleted first, and the `PUT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replaced {
    pub existed: bool,
    pub outcome: StatusOutcome,
}

/// Client for one service endpoint, API version and token scope.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
    endpoint: String,
    api_version: String,
    scope: String,
    content_type: String,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
        endpoint: impl Into<String>,
        api_version: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            transport,
            tokens,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_version: api_version.into(),
            scope: scope.into(),
            content_type: JSON.to_string(),
        }
    }

    /// Override the `Content-Type` sent with request bodies.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// `{endpoint}/{resource_type}`
    pub fn collection_url(&self, resource_type: &str) -> String {
        format!("{}/{}", self.endpoint, resource_type.trim_matches('/'))
    }

    /// `{endpoint}/{resource_type}/{name}`
    pub fn resource_url(&self, resource_type: &str, name: &str) -> String {
        format!("{}/{}", self.collection_url(resource_type), name)
    }

    /// Issue one call and classify the status. Never fails on status alone.
    pub fn apply(
        &self,
        resource_type: &str,
        name: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<StatusOutcome> {
        let url = self.resource_url(resource_type, name);
        self.send(method, &url, &[], body)
    }

    /// Send to an arbitrary URL under this client's credentials and version.
    pub fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<StatusOutcome> {
        let token = self.tokens.token(&self.scope)?;

        let mut request = ApiRequest::new(method, url)
            .query("api-version", self.api_version.as_str())
            .header("Authorization", format!("Bearer {token}"));
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        if let Some(body) = body {
            let text = serde_json::to_string(body).map_err(|e| Error::Other(e.to_string()))?;
            request = request
                .header("Content-Type", self.content_type.as_str())
                .body(text);
        }

        let response = self.transport.send(&request)?;
        let outcome = StatusOutcome {
            method,
            url: url.to_string(),
            status: response.status,
            body: response.body,
        };

        if outcome.is_success() {
            log::info!("{} {} → {}", method, url, outcome.status);
        } else if method == Method::Delete && outcome.is_not_found() {
            log::info!("{} {} → 404 (already absent)", method, url);
        } else {
            log::error!("{} {} → {}: {}", method, url, outcome.status, outcome.body);
        }

        Ok(outcome)
    }

    /// Fetch one resource; `None` on 404.
    pub fn get(&self, resource_type: &str, name: &str) -> Result<Option<Value>> {
        let outcome = self.apply(resource_type, name, Method::Get, None)?;
        if outcome.is_not_found() {
            return Ok(None);
        }
        outcome.error_for_status()?.json().map(Some)
    }

    /// List a collection, following the `value` array convention.
    pub fn list(&self, resource_type: &str) -> Result<Vec<Value>> {
        let url = self.collection_url(resource_type);
        let outcome = self.send(Method::Get, &url, &[], None)?.error_for_status()?;
        match outcome.json()? {
            Value::Object(mut map) => match map.remove("value") {
                Some(Value::Array(items)) => Ok(items),
                Some(_) | None => Err(Error::InvalidResponse {
                    url,
                    message: "missing `value` array".to_string(),
                }),
            },
            Value::Array(items) => Ok(items),
            _ => Err(Error::InvalidResponse {
                url,
                message: "expected a JSON object or array".to_string(),
            }),
        }
    }

    /// Upsert: a single `PUT` keyed by name.
    pub fn create_or_update(
        &self,
        resource_type: &str,
        name: &str,
        body: &Value,
    ) -> Result<StatusOutcome> {
        self.apply(resource_type, name, Method::Put, Some(body))?
            .error_for_status()
    }

    /// Delete, treating 404 as success. Returns whether something was deleted.
    pub fn delete(&self, resource_type: &str, name: &str) -> Result<bool> {
        let outcome = self.apply(resource_type, name, Method::Delete, None)?;
        if outcome.is_not_found() {
            return Ok(false);
        }
        outcome.error_for_status()?;
        Ok(true)
    }

    /// Replace: delete (ignore 404), settle, then `PUT` the full body.
    pub fn replace(
        &self,
        resource_type: &str,
        name: &str,
        body: &Value,
        settle: &SettleConfig,
    ) -> Result<Replaced> {
        let existed = self.delete(resource_type, name)?;
        if existed {
            let url = self.resource_url(resource_type, name);
            settle.wait_until_absent(&url, || {
                let current = self.apply(resource_type, name, Method::Get, None)?;
                Ok(current.is_not_found())
            })?;
        }
        let outcome = self.create_or_update(resource_type, name, body)?;
        Ok(Replaced { existed, outcome })
    }

    /// `POST {endpoint}/{resource_type}/{name}/{action}` and parse the reply.
    pub fn action(&self, resource_type: &str, name: &str, action: &str) -> Result<Value> {
        let url = format!("{}/{}", self.resource_url(resource_type, name), action);
        self.send(Method::Post, &url, &[], None)?
            .error_for_status()?
            .json()
    }
}
