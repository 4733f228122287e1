//! Remote resources applied through the REST apply engine
//!
//! Every resource here is one named object under a REST collection with a
//! desired JSON body. How it converges depends on its [`Policy`].

pub mod connection;
pub mod rai;
pub mod search;

use std::fmt;

use anyhow::Result;
use serde_json::Value;

use azrest::{ApiClient, SettleConfig};
use declarative::{ApplyContext, ApplyResult, Resource};

/// Idempotency policy for a remote resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// One create-or-update call keyed by name
    Upsert,
    /// Delete (404 ignored), wait until gone, then create with the full body
    Replace,
}

/// A named object at `{endpoint}/{collection}/{name}`
pub struct RemoteResource {
    client: ApiClient,
    kind: &'static str,
    collection: String,
    name: String,
    body: Value,
    policy: Policy,
    settle: SettleConfig,
    depends_on: Vec<String>,
}

impl RemoteResource {
    pub fn upsert(
        client: &ApiClient,
        kind: &'static str,
        collection: impl Into<String>,
        name: impl Into<String>,
        body: Value,
    ) -> Self {
        Self {
            client: client.clone(),
            kind,
            collection: collection.into(),
            name: name.into(),
            body,
            policy: Policy::Upsert,
            settle: SettleConfig::default(),
            depends_on: Vec::new(),
        }
    }

    /// Switch to delete-then-create with the given settle behaviour
    pub fn replacing(mut self, settle: &SettleConfig) -> Self {
        self.policy = Policy::Replace;
        self.settle = settle.clone();
        self
    }

    /// Require another resource (by id) to have been applied first
    pub fn after(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }
}

/// Identifier used for dependency edges: `{kind}:{name}`
pub fn resource_id(kind: &str, name: &str) -> String {
    format!("{kind}:{name}")
}

// Bodies can carry keys, so Debug shows the address only.
impl fmt::Debug for RemoteResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteResource")
            .field("kind", &self.kind)
            .field("collection", &self.collection)
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Resource for RemoteResource {
    fn id(&self) -> String {
        resource_id(self.kind, &self.name)
    }

    fn description(&self) -> String {
        let verb = match self.policy {
            Policy::Upsert => "Create or update",
            Policy::Replace => "Recreate",
        };
        format!("{verb} {} '{}'", self.kind.replace('_', " "), self.name)
    }

    fn resource_type(&self) -> &'static str {
        self.kind
    }

    fn depends_on(&self) -> Vec<String> {
        self.depends_on.clone()
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<ApplyResult> {
        if ctx.verbose {
            log::info!(
                "{:?} {}",
                self.policy,
                self.client.resource_url(&self.collection, &self.name)
            );
        }
        match self.policy {
            Policy::Upsert => {
                let outcome = self
                    .client
                    .create_or_update(&self.collection, &self.name, &self.body)?;
                Ok(if outcome.is_created() {
                    ApplyResult::Created
                } else {
                    ApplyResult::Modified
                })
            }
            Policy::Replace => {
                let replaced = self
                    .client
                    .replace(&self.collection, &self.name, &self.body, &self.settle)?;
                Ok(if replaced.existed {
                    ApplyResult::Replaced
                } else {
                    ApplyResult::Created
                })
            }
        }
    }
}
