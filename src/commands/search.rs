//! `provision search` - RAG and NL2SQL search asset chains

use anyhow::{Context as _, Result, anyhow};
use serde_json::Value;

use appconfig::Resolver;
use declarative::{ExecuteSummary, ExecutionPlan, FailurePolicy};

use crate::Context;
use crate::cli::SearchArgs;
use crate::engine::run_plan;
use crate::gateway::{GatewaySource, KeyVaultSecrets, SecretStoreGateway};
use crate::resource::search::{IndexProfile, SearchSettings, SkillInput, asset_chain};
use crate::session::Session;
use crate::ui;

pub const CONTAINER_API_VERSION: &str = "2023-05-01";

pub fn run(ctx: &Context, args: &SearchArgs) -> Result<()> {
    ui::header("Search assets");
    let resolver = ctx.resolver(Some(args.label.as_str()))?;

    let summary = provision(&ctx.session, &resolver)?;

    if summary.is_success() {
        ui::success(&format!("{} search assets in place", summary.succeeded()));
    } else {
        ui::warn(&format!(
            "{} search assets in place, {} failed",
            summary.succeeded(),
            summary.failed
        ));
    }
    Ok(())
}

/// Public DNS name of the data-ingest container group
pub fn container_fqdn(session: &Session, settings: &SearchSettings) -> Result<String> {
    let arm = session.arm(CONTAINER_API_VERSION);
    let collection = format!(
        "subscriptions/{}/resourceGroups/{}/providers/Microsoft.ContainerInstance/containerGroups",
        settings.subscription_id, settings.resource_group
    );
    let group = arm
        .get(&collection, &settings.container_group)?
        .ok_or_else(|| anyhow!("container group '{}' not found", settings.container_group))?;

    group
        .pointer("/properties/ipAddress/fqdn")
        .and_then(Value::as_str)
        .filter(|fqdn| !fqdn.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("container group '{}' has no public FQDN", settings.container_group))
}

/// Resolve everything up front, then apply the RAG chain and one chain per
/// NL2SQL profile. Chains are independent: a failure only ends its own.
pub fn provision(session: &Session, resolver: &Resolver) -> Result<ExecuteSummary> {
    let settings = SearchSettings::load(resolver)?;
    let fqdn = container_fqdn(session, &settings)?;
    let gateway = SecretStoreGateway::new(
        KeyVaultSecrets::new(session, &settings.key_vault),
        &settings.gateway_url,
        &settings.gateway_secret_name,
    )
    .resolve(&settings.service, "", &settings.openai_api_path)
    .context("Failed to read the gateway key for embedding skillsets")?;

    ui::kv("Service", &settings.service);
    ui::kv("Base index", &settings.base_index);
    ui::kv("Chunking endpoint", &fqdn);

    let client = session.search(&settings.service, &settings.api_version);
    let mut plan = ExecutionPlan::new();
    plan.add_chain(asset_chain(
        &client,
        &settings,
        IndexProfile::Rag,
        &SkillInput::ContainerFqdn(&fqdn),
        &session.settle,
    ));
    for profile in IndexProfile::NL2SQL {
        plan.add_chain(asset_chain(
            &client,
            &settings,
            profile,
            &SkillInput::Gateway(&gateway),
            &session.settle,
        ));
    }

    run_plan(plan, &session.execute_options(FailurePolicy::BestEffort))
}
