//! Content-safety resources: blocklists → policies → deployment associations

use std::fmt;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use azrest::ApiClient;
use declarative::{ApplyContext, ApplyResult, Chain, ExecutionPlan, Resource};

use super::{RemoteResource, resource_id};

pub const RAI_API_VERSION: &str = "2024-10-01";
pub const POLICY_ASSIGNMENT_API_VERSION: &str = "2022-06-01";

fn default_base_policy() -> String {
    "Microsoft.DefaultV2".to_string()
}

fn default_mode() -> String {
    "Blocking".to_string()
}

fn default_true() -> bool {
    true
}

fn default_severity() -> String {
    "Medium".to_string()
}

fn default_source() -> String {
    "Prompt".to_string()
}

/// Content-safety definition file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaiFile {
    #[serde(default)]
    pub blocklists: Vec<BlocklistDef>,
    #[serde(default)]
    pub policies: Vec<PolicyDef>,
    #[serde(default)]
    pub deployments: Vec<DeploymentDef>,
    /// Azure Policy definition names to assign at each deployment's scope
    #[serde(default)]
    pub policy_assignments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocklistDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub items: Vec<BlocklistItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocklistItem {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub is_regex: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDef {
    pub name: String,
    #[serde(default = "default_base_policy")]
    pub base_policy: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub content_filters: Vec<ContentFilter>,
    /// Names of blocklists this policy blocks on
    #[serde(default)]
    pub blocklists: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFilter {
    pub name: String,
    #[serde(default = "default_true")]
    pub blocking: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_severity")]
    pub severity_threshold: String,
    #[serde(default = "default_source")]
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDef {
    pub name: String,
    pub policy: String,
}

/// The AI Services account that owns blocklists, policies and deployments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountScope {
    pub subscription_id: String,
    pub resource_group: String,
    pub account: String,
}

impl AccountScope {
    pub fn path(&self) -> String {
        format!(
            "subscriptions/{}/resourceGroups/{}/providers/Microsoft.CognitiveServices/accounts/{}",
            self.subscription_id, self.resource_group, self.account
        )
    }

    fn collection(&self, child: &str) -> String {
        format!("{}/{child}", self.path())
    }
}

pub fn blocklist_body(def: &BlocklistDef) -> Value {
    json!({"properties": {"description": def.description}})
}

pub fn blocklist_item_body(item: &BlocklistItem) -> Value {
    json!({"properties": {"pattern": item.pattern, "isRegex": item.is_regex}})
}

pub fn policy_body(def: &PolicyDef) -> Value {
    let filters: Vec<Value> = def
        .content_filters
        .iter()
        .map(|f| {
            json!({
                "name": f.name,
                "blocking": f.blocking,
                "enabled": f.enabled,
                "severityThreshold": f.severity_threshold,
                "source": f.source
            })
        })
        .collect();
    let blocklists: Vec<Value> = def
        .blocklists
        .iter()
        .map(|name| json!({"blocklistName": name, "blocking": true, "source": "Prompt"}))
        .collect();

    json!({
        "properties": {
            "basePolicyName": def.base_policy,
            "mode": def.mode,
            "contentFilters": filters,
            "customBlocklists": blocklists
        }
    })
}

/// Points a model deployment at a content-safety policy
///
/// Reads the deployment, overwrites `properties.raiPolicyName` and writes it
/// back. The previous policy is replaced, never merged.
pub struct DeploymentPolicy {
    client: ApiClient,
    collection: String,
    deployment: String,
    policy: String,
}

impl DeploymentPolicy {
    pub const KIND: &'static str = "rai_deployment";

    pub fn new(client: &ApiClient, scope: &AccountScope, deployment: &str, policy: &str) -> Self {
        Self {
            client: client.clone(),
            collection: scope.collection("deployments"),
            deployment: deployment.to_string(),
            policy: policy.to_string(),
        }
    }
}

impl fmt::Debug for DeploymentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentPolicy")
            .field("deployment", &self.deployment)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Resource for DeploymentPolicy {
    fn id(&self) -> String {
        resource_id(Self::KIND, &self.deployment)
    }

    fn description(&self) -> String {
        format!("Associate deployment '{}' with policy '{}'", self.deployment, self.policy)
    }

    fn resource_type(&self) -> &'static str {
        Self::KIND
    }

    fn depends_on(&self) -> Vec<String> {
        vec![resource_id(PolicyKind::Policy.kind(), &self.policy)]
    }

    fn apply(&self, _ctx: &ApplyContext) -> Result<ApplyResult> {
        let Some(mut deployment) = self.client.get(&self.collection, &self.deployment)? else {
            bail!("deployment '{}' not found", self.deployment);
        };

        if deployment.pointer("/properties/raiPolicyName").and_then(Value::as_str) == Some(self.policy.as_str()) {
            return Ok(ApplyResult::NoChange);
        }

        let Some(properties) = deployment.get_mut("properties").and_then(Value::as_object_mut) else {
            bail!("deployment '{}' has no properties", self.deployment);
        };
        properties.insert("raiPolicyName".into(), json!(self.policy));

        self.client
            .create_or_update(&self.collection, &self.deployment, &deployment)?;
        Ok(ApplyResult::Modified)
    }
}

/// Resource kinds used for dependency ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Blocklist,
    BlocklistItem,
    Policy,
    Assignment,
}

impl PolicyKind {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Blocklist => "rai_blocklist",
            Self::BlocklistItem => "rai_blocklist_item",
            Self::Policy => "rai_policy",
            Self::Assignment => "rai_policy_assignment",
        }
    }
}

/// Build the full content-safety plan.
///
/// One chain per blocklist (list then its items), then one resource per
/// policy depending on its blocklists, then each deployment association
/// depending on its policy, then policy assignments depending on the
/// association.
pub fn rai_plan(rai: &ApiClient, assignments: &ApiClient, scope: &AccountScope, file: &RaiFile) -> ExecutionPlan {
    let mut plan = ExecutionPlan::new();

    for blocklist in &file.blocklists {
        let items_collection = scope.collection(&format!("raiBlocklists/{}/raiBlocklistItems", blocklist.name));
        let mut chain = Chain::new(format!("blocklist {}", blocklist.name)).then(RemoteResource::upsert(
            rai,
            PolicyKind::Blocklist.kind(),
            scope.collection("raiBlocklists"),
            &blocklist.name,
            blocklist_body(blocklist),
        ));
        for item in &blocklist.items {
            chain.push(Box::new(RemoteResource::upsert(
                rai,
                PolicyKind::BlocklistItem.kind(),
                items_collection.clone(),
                &item.name,
                blocklist_item_body(item),
            )));
        }
        plan.add_chain(chain);
    }

    for policy in &file.policies {
        let resource = policy.blocklists.iter().fold(
            RemoteResource::upsert(
                rai,
                PolicyKind::Policy.kind(),
                scope.collection("raiPolicies"),
                &policy.name,
                policy_body(policy),
            ),
            |r, bl| r.after(resource_id(PolicyKind::Blocklist.kind(), bl)),
        );
        plan.add_resource(Box::new(resource));
    }

    for deployment in &file.deployments {
        let association = DeploymentPolicy::new(rai, scope, &deployment.name, &deployment.policy);
        let association_id = association.id();
        plan.add_resource(Box::new(association));

        for definition in &file.policy_assignments {
            let body = json!({
                "properties": {
                    "policyDefinitionId": format!(
                        "/subscriptions/{}/providers/Microsoft.Authorization/policyDefinitions/{definition}",
                        scope.subscription_id
                    )
                }
            });
            let collection = format!(
                "{}/providers/Microsoft.Authorization/policyAssignments",
                scope.collection(&format!("deployments/{}", deployment.name))
            );
            plan.add_resource(Box::new(
                RemoteResource::upsert(
                    assignments,
                    PolicyKind::Assignment.kind(),
                    collection,
                    format!("{definition}-assignment"),
                    body,
                )
                .after(association_id.clone()),
            ));
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing;
    use azrest::{MemoryTransport, Method};
    use declarative::{ExecuteOptions, execute_simple};
    use std::sync::Arc;

    const ACCOUNT: &str = "https://management.azure.com/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.CognitiveServices/accounts/ais";

    fn scope() -> AccountScope {
        AccountScope {
            subscription_id: "sub-1".into(),
            resource_group: "rg-1".into(),
            account: "ais".into(),
        }
    }

    fn file() -> RaiFile {
        serde_json::from_value(json!({
            "blocklists": [
                {"name": "profanity", "description": "bad words", "items": [
                    {"name": "w1", "pattern": "darn"},
                    {"name": "w2", "pattern": "dang.*", "is_regex": true}
                ]}
            ],
            "policies": [
                {"name": "MainRAIpolicy", "content_filters": [{"name": "Hate", "source": "Completion"}], "blocklists": ["profanity"]}
            ],
            "deployments": [{"name": "chat", "policy": "MainRAIpolicy"}],
            "policy_assignments": ["MainBlockListPolicy"]
        }))
        .unwrap()
    }

    fn run(transport: &Arc<MemoryTransport>, file: &RaiFile) -> declarative::ExecuteSummary {
        let session = testing::session(transport);
        let plan = rai_plan(
            &session.arm(RAI_API_VERSION),
            &session.arm(POLICY_ASSIGNMENT_API_VERSION),
            &scope(),
            file,
        );
        execute_simple(plan, &ExecuteOptions::default().best_effort()).unwrap()
    }

    #[test]
    fn test_file_defaults() {
        let f = file();
        let policy = &f.policies[0];
        assert_eq!(policy.base_policy, "Microsoft.DefaultV2");
        assert_eq!(policy.mode, "Blocking");
        assert!(policy.content_filters[0].blocking);
        assert_eq!(policy.content_filters[0].severity_threshold, "Medium");
        assert_eq!(policy.content_filters[0].source, "Completion");
        assert!(!f.blocklists[0].items[0].is_regex);
    }

    #[test]
    fn test_policy_body() {
        let body = policy_body(&file().policies[0]);
        assert_eq!(body["properties"]["basePolicyName"], "Microsoft.DefaultV2");
        assert_eq!(body["properties"]["customBlocklists"][0]["blocklistName"], "profanity");
        assert_eq!(body["properties"]["contentFilters"][0]["severityThreshold"], "Medium");
    }

    #[test]
    fn test_full_chain_applies_in_order() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert(
            format!("{ACCOUNT}/deployments/chat"),
            json!({"sku": {"name": "Standard"}, "properties": {"model": {"name": "gpt-4o"}, "raiPolicyName": "Microsoft.Default"}}),
        );

        let summary = run(&transport, &file());

        assert!(summary.is_success(), "{:?}", summary.failures);
        let deployment = transport.resource(&format!("{ACCOUNT}/deployments/chat")).unwrap();
        assert_eq!(deployment["properties"]["raiPolicyName"], "MainRAIpolicy");
        assert_eq!(deployment["properties"]["model"]["name"], "gpt-4o");
        assert_eq!(deployment["sku"]["name"], "Standard");
        assert!(
            transport
                .resource(&format!(
                    "{ACCOUNT}/deployments/chat/providers/Microsoft.Authorization/policyAssignments/MainBlockListPolicy-assignment"
                ))
                .is_some()
        );

        let puts: Vec<String> = transport
            .calls()
            .into_iter()
            .filter(|(m, _)| *m == Method::Put)
            .map(|(_, url)| url.trim_start_matches(ACCOUNT).to_string())
            .collect();
        assert_eq!(
            puts,
            vec![
                "/raiBlocklists/profanity",
                "/raiBlocklists/profanity/raiBlocklistItems/w1",
                "/raiBlocklists/profanity/raiBlocklistItems/w2",
                "/raiPolicies/MainRAIpolicy",
                "/deployments/chat",
                "/deployments/chat/providers/Microsoft.Authorization/policyAssignments/MainBlockListPolicy-assignment",
            ]
        );
    }

    #[test]
    fn test_association_is_noop_when_already_set() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert(
            format!("{ACCOUNT}/deployments/chat"),
            json!({"properties": {"raiPolicyName": "MainRAIpolicy"}}),
        );
        let session = testing::session(&transport);
        let association = DeploymentPolicy::new(&session.arm(RAI_API_VERSION), &scope(), "chat", "MainRAIpolicy");

        assert_eq!(association.apply(&ApplyContext::default()).unwrap(), ApplyResult::NoChange);
        assert_eq!(transport.count_matching(Method::Put, "/deployments/chat"), 0);
    }

    #[test]
    fn test_failed_blocklist_blocks_policy_and_deployment() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert(format!("{ACCOUNT}/deployments/chat"), json!({"properties": {}}));
        transport.fail(Method::Put, "/raiBlocklists/profanity", 400, "invalid");

        let summary = run(&transport, &file());

        assert_eq!(summary.failed, 1);
        // two items, the policy, the association, the assignment
        assert_eq!(summary.skipped, 5);
        assert_eq!(transport.count_matching(Method::Put, "/raiPolicies/"), 0);
        assert_eq!(transport.count_matching(Method::Put, "/deployments/chat"), 0);
    }

    #[test]
    fn test_missing_deployment_fails() {
        let transport = Arc::new(MemoryTransport::new());
        let session = testing::session(&transport);
        let association = DeploymentPolicy::new(&session.arm(RAI_API_VERSION), &scope(), "ghost", "p");

        let err = association.apply(&ApplyContext::default()).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }
}
