//! `provision rai` - content-safety blocklists, policies and deployments

use anyhow::Result;
use serde_json::Value;

use appconfig::Resolver;
use declarative::{ExecuteSummary, FailurePolicy};

use crate::Context;
use crate::cli::RaiArgs;
use crate::definition::load_json;
use crate::engine::run_plan;
use crate::error::ProvisionError;
use crate::resource::rai::{AccountScope, POLICY_ASSIGNMENT_API_VERSION, RAI_API_VERSION, RaiFile, rai_plan};
use crate::session::Session;
use crate::ui;

pub fn run(ctx: &Context, args: &RaiArgs) -> Result<()> {
    ui::header("Content safety");
    let resolver = ctx.resolver(Some(args.label.as_str()))?;
    let raw: Value = load_json(&args.file)?;
    ui::kv("File", &args.file);

    let file = resolve_file(&resolver, &args.file, raw)?;
    let summary = apply(&ctx.session, &resolver, &file)?;

    if summary.is_success() {
        ui::success("Content-safety configuration applied");
    } else {
        ui::warn(&format!("{} content-safety resources failed", summary.failed));
    }
    Ok(())
}

/// Resolve placeholders in the file, then parse it.
///
/// Blocklist item patterns are taken verbatim: regex quantifiers such as
/// `\d{3}` share the placeholder syntax.
pub fn resolve_file(resolver: &Resolver, path: &str, mut raw: Value) -> Result<RaiFile> {
    let patterns = take_patterns(&mut raw);
    resolver.resolve_value(&mut raw)?;
    restore_patterns(&mut raw, patterns);
    serde_json::from_value(raw).map_err(|e| {
        ProvisionError::Definition {
            path: path.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

fn item_patterns(raw: &mut Value) -> impl Iterator<Item = &mut Value> {
    raw.get_mut("blocklists")
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
        .filter_map(|list| list.get_mut("items").and_then(Value::as_array_mut))
        .flatten()
        .filter_map(|item| item.get_mut("pattern"))
}

fn take_patterns(raw: &mut Value) -> Vec<Value> {
    item_patterns(raw).map(Value::take).collect()
}

fn restore_patterns(raw: &mut Value, patterns: Vec<Value>) {
    for (slot, pattern) in item_patterns(raw).zip(patterns) {
        *slot = pattern;
    }
}

pub fn account_scope(resolver: &Resolver) -> appconfig::Result<AccountScope> {
    Ok(AccountScope {
        subscription_id: resolver.lookup("AZURE_SUBSCRIPTION_ID")?,
        resource_group: resolver.lookup("AZURE_RESOURCE_GROUP")?,
        account: resolver.lookup("AZURE_AI_SERVICES_NAME")?,
    })
}

pub fn apply(session: &Session, resolver: &Resolver, file: &RaiFile) -> Result<ExecuteSummary> {
    let scope = account_scope(resolver)?;
    ui::kv("Account", &scope.account);

    let plan = rai_plan(
        &session.arm(RAI_API_VERSION),
        &session.arm(POLICY_ASSIGNMENT_API_VERSION),
        &scope,
        file,
    );
    run_plan(plan, &session.execute_options(FailurePolicy::BestEffort))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing;
    use azrest::{MemoryTransport, Method};
    use serde_json::json;
    use std::sync::Arc;

    const CORE: &[(&str, &str)] = &[
        ("AZURE_SUBSCRIPTION_ID", "sub-1"),
        ("AZURE_RESOURCE_GROUP", "rg-1"),
        ("AZURE_AI_SERVICES_NAME", "ais"),
        ("CHAT_DEPLOYMENT", "chat"),
    ];

    #[test]
    fn test_resolve_file_substitutes_strings() {
        let resolver = testing::resolver(CORE);
        let raw = json!({
            "deployments": [{"name": "{CHAT_DEPLOYMENT}", "policy": "Main"}]
        });

        let file = resolve_file(&resolver, "rai.json", raw).unwrap();

        assert_eq!(file.deployments[0].name, "chat");
        assert!(file.blocklists.is_empty());
    }

    #[test]
    fn test_resolve_file_keeps_regex_patterns() {
        let resolver = testing::resolver(CORE);
        let raw = json!({
            "blocklists": [{
                "name": "pii-{CHAT_DEPLOYMENT}",
                "items": [
                    {"name": "phone", "pattern": "\\d{3}-\\d{4}", "is_regex": true},
                    {"name": "plain", "pattern": "{CHAT_DEPLOYMENT}"}
                ]
            }]
        });

        let file = resolve_file(&resolver, "rai.json", raw).unwrap();

        let list = &file.blocklists[0];
        assert_eq!(list.name, "pii-chat");
        assert_eq!(list.items[0].pattern, "\\d{3}-\\d{4}");
        assert!(list.items[0].is_regex);
        assert_eq!(list.items[1].pattern, "{CHAT_DEPLOYMENT}");
    }

    #[test]
    fn test_resolve_file_rejects_bad_shape() {
        let resolver = testing::resolver(CORE);
        let err = resolve_file(&resolver, "rai.json", json!({"policies": "nope"})).unwrap_err();
        assert!(err.to_string().contains("rai.json"));
    }

    #[test]
    fn test_apply_associates_deployment() {
        let transport = Arc::new(MemoryTransport::new());
        let deployment = "https://management.azure.com/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.CognitiveServices/accounts/ais/deployments/chat";
        transport.insert(deployment, json!({"properties": {"raiPolicyName": "Microsoft.Default"}}));
        let session = testing::session(&transport);
        let resolver = testing::resolver(CORE);
        let file = resolve_file(
            &resolver,
            "rai.json",
            json!({
                "policies": [{"name": "Main"}],
                "deployments": [{"name": "{CHAT_DEPLOYMENT}", "policy": "Main"}]
            }),
        )
        .unwrap();

        let summary = apply(&session, &resolver, &file).unwrap();

        assert!(summary.is_success());
        assert_eq!(transport.resource(deployment).unwrap()["properties"]["raiPolicyName"], "Main");
        assert_eq!(transport.count_matching(Method::Put, "/policyAssignments/"), 0);
    }

    #[test]
    fn test_missing_account_is_fatal() {
        let transport = Arc::new(MemoryTransport::new());
        let session = testing::session(&transport);
        let resolver = testing::resolver(&CORE[..2]);

        let err = apply(&session, &resolver, &RaiFile::default()).unwrap_err();
        assert!(err.to_string().contains("AZURE_AI_SERVICES_NAME"));
    }
}
