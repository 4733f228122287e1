//! `provision connections` - register AI Foundry hub connections

use std::time::Instant;

use anyhow::Result;

use appconfig::Resolver;
use declarative::{ApplyResult, ExecuteSummary, ExecutionPlan, FailurePolicy};

use crate::Context;
use crate::builder::{BuildOutcome, SpecBuilder};
use crate::cli::ConnectionsArgs;
use crate::definition::{ResourceDefinition, load_connections};
use crate::engine::run_plan_after;
use crate::gateway::ApimGateway;
use crate::resource::connection::{CONNECTIONS_API_VERSION, connection_resource, connections_path};
use crate::resource::resource_id;
use crate::session::Session;
use crate::ui;

/// Settings every connection run needs before touching any definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubSettings {
    pub subscription_id: String,
    pub resource_group: String,
    pub hub: String,
    pub openai_api_version: String,
}

impl HubSettings {
    pub fn load(resolver: &Resolver) -> appconfig::Result<Self> {
        Ok(Self {
            subscription_id: resolver.lookup("AZURE_SUBSCRIPTION_ID")?,
            resource_group: resolver.lookup("AZURE_RESOURCE_GROUP")?,
            hub: resolver.lookup("AZURE_AI_FOUNDRY_HUB_NAME")?,
            openai_api_version: resolver.lookup("AZURE_AOAI_API_VERSION")?,
        })
    }
}

pub fn run(ctx: &Context, args: &ConnectionsArgs) -> Result<()> {
    ui::header("AI Foundry connections");
    let started = Instant::now();

    let resolver = ctx.resolver(Some(args.label.as_str()))?;
    let definitions = load_connections(&args.file)?;
    ui::kv("File", &args.file);
    ui::kv("Definitions", &definitions.len().to_string());

    let summary = register(&ctx.session, &resolver, &definitions)?;

    ui::success(&format!(
        "Registered {} of {} connections in {}",
        summary.succeeded(),
        definitions.len(),
        ui::format_elapsed(started.elapsed())
    ));
    Ok(())
}

/// Build every definition and register the ready ones.
///
/// Configuration failures abort before anything is written. A definition
/// that fails validation or gateway lookup is reported and skipped.
/// Registration itself is strict: the first failed `PUT` ends the run.
pub fn register(
    session: &Session,
    resolver: &Resolver,
    definitions: &[(String, ResourceDefinition)],
) -> Result<ExecuteSummary> {
    let hub = HubSettings::load(resolver)?;
    log::info!(
        "Registering connections on hub '{}' in {}/{}",
        hub.hub,
        hub.subscription_id,
        hub.resource_group
    );

    let gateway = ApimGateway::new(session, &hub.subscription_id, &hub.resource_group);
    let builder = SpecBuilder::new(resolver, &gateway, &hub.openai_api_version);
    let arm = session.arm(CONNECTIONS_API_VERSION);
    let collection = connections_path(&hub.subscription_id, &hub.resource_group, &hub.hub);

    let mut plan = ExecutionPlan::new();
    let mut not_built = ExecuteSummary::default();

    for (key, def) in definitions {
        let id = resource_id(crate::resource::connection::KIND, &def.name);
        match builder.build(def) {
            Ok(BuildOutcome::Ready(spec)) => {
                log::debug!("'{key}' resolved to {spec:?}");
                plan.add_resource(Box::new(connection_resource(&arm, &collection, &spec)));
            }
            Ok(BuildOutcome::Skipped { name, reason }) => {
                ui::warn(&format!("Skipping '{name}': {reason}"));
                not_built.add_result(&id, &ApplyResult::Skipped { reason });
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                ui::error(&format!("Skipping '{key}': {e}"));
                not_built.add_result(&id, &ApplyResult::Skipped { reason: e.to_string() });
            }
        }
    }

    run_plan_after(plan, &session.execute_options(FailurePolicy::Strict), not_built)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing;
    use azrest::{MemoryTransport, Method};
    use serde_json::json;
    use std::sync::Arc;

    const CONNECTIONS: &str = "https://management.azure.com/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.MachineLearningServices/workspaces/hub1/connections";

    const CORE: &[(&str, &str)] = &[
        ("AZURE_SUBSCRIPTION_ID", "sub-1"),
        ("AZURE_RESOURCE_GROUP", "rg-1"),
        ("AZURE_AI_FOUNDRY_HUB_NAME", "hub1"),
        ("AZURE_AOAI_API_VERSION", "2024-10-21"),
        ("AZURE_SEARCH_SERVICE_NAME", "srch"),
        ("AZURE_SEARCH_RESOURCE", r#"{"id": "/subscriptions/sub-1/search/srch"}"#),
    ];

    fn def(value: serde_json::Value) -> (String, ResourceDefinition) {
        let def: ResourceDefinition = serde_json::from_value(value).unwrap();
        (def.name.clone(), def)
    }

    #[test]
    fn test_registers_and_skips() {
        let transport = Arc::new(MemoryTransport::new());
        let session = testing::session(&transport);
        let resolver = testing::resolver(CORE);
        let defs = vec![
            def(json!({
                "name": "search",
                "category": "CognitiveSearch",
                "target": "https://{AZURE_SEARCH_SERVICE_NAME}.search.windows.net",
                "resource_id": "{AZURE_SEARCH_RESOURCE.id}"
            })),
            def(json!({"name": "phi", "category": "AIInference", "target": "https://phi.example"})),
            def(json!({"name": "odd", "category": "Telepathy", "target": "x"})),
        ];

        let summary = register(&session, &resolver, &defs).unwrap();

        assert_eq!(summary.created, 1);
        assert_eq!(summary.skipped, 2);
        let stored = transport.resource(&format!("{CONNECTIONS}/search")).unwrap();
        assert_eq!(stored["properties"]["target"], "/subscriptions/sub-1/search/srch");
        assert_eq!(stored["properties"]["authType"], "AAD");
        assert_eq!(transport.count_matching(Method::Put, "/connections/phi"), 0);
    }

    #[test]
    fn test_second_run_updates_in_place() {
        let transport = Arc::new(MemoryTransport::new());
        let session = testing::session(&transport);
        let resolver = testing::resolver(CORE);
        let defs = vec![def(json!({
            "name": "aoai",
            "category": "AzureOpenAI",
            "target": "https://aoai.openai.azure.com",
            "api_key": "k"
        }))];

        register(&session, &resolver, &defs).unwrap();
        let first = transport.resource(&format!("{CONNECTIONS}/aoai")).unwrap();
        let summary = register(&session, &resolver, &defs).unwrap();

        assert_eq!(summary.modified, 1);
        assert_eq!(transport.resource(&format!("{CONNECTIONS}/aoai")).unwrap(), first);
        assert_eq!(first["properties"]["metadata"]["ApiVersion"], "2024-10-21");
    }

    #[test]
    fn test_missing_core_setting_is_fatal() {
        let transport = Arc::new(MemoryTransport::new());
        let session = testing::session(&transport);
        let resolver = testing::resolver(&[("AZURE_SUBSCRIPTION_ID", "sub-1")]);

        let err = register(&session, &resolver, &[]).unwrap_err();

        assert!(err.to_string().contains("AZURE_RESOURCE_GROUP"));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_template_error_aborts_before_writes() {
        let transport = Arc::new(MemoryTransport::new());
        let session = testing::session(&transport);
        let resolver = testing::resolver(CORE);
        let defs = vec![
            def(json!({"name": "ok", "category": "AzureOpenAI", "target": "https://a"})),
            def(json!({"name": "bad", "category": "AzureOpenAI", "target": "https://{NOPE}"})),
        ];

        let err = register(&session, &resolver, &defs).unwrap_err();

        assert!(err.to_string().contains("NOPE"));
        assert_eq!(transport.count_matching(Method::Put, "/connections/"), 0);
    }

    #[test]
    fn test_failed_registration_is_strict() {
        let transport = Arc::new(MemoryTransport::new());
        transport.fail(Method::Put, "/connections/first", 400, "bad target");
        let session = testing::session(&transport);
        let resolver = testing::resolver(CORE);
        let defs = vec![
            def(json!({"name": "phi", "category": "AIInference", "target": "https://phi.example"})),
            def(json!({"name": "first", "category": "AzureOpenAI", "target": "https://a"})),
            def(json!({"name": "second", "category": "AzureOpenAI", "target": "https://b"})),
        ];

        let err = register(&session, &resolver, &defs).unwrap_err();

        assert!(err.to_string().contains("bad target"));
        assert_eq!(transport.count_matching(Method::Put, "/connections/second"), 0);
        let aborted = err.downcast_ref::<declarative::Aborted>().unwrap();
        assert_eq!(aborted.summary.failed, 1);
        assert_eq!(aborted.summary.skipped, 1);
    }
}
