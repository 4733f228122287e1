//! `provision seed` - copy ARM deployment outputs into the config store

use anyhow::{Result, anyhow, bail};
use serde_json::{Map, Value};

use appconfig::ConfigStore;

use crate::Context;
use crate::cli::SeedArgs;
use crate::session::Session;
use crate::ui;

pub const DEPLOYMENTS_API_VERSION: &str = "2021-04-01";
pub const PROVISION_CONFIG: &str = "PROVISION_CONFIG";
pub const APP_SETTINGS: &str = "APP_SETTINGS";

/// A resource group deployment whose outputs seed the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRef {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub provision_entries: usize,
    pub app_settings: usize,
}

/// Store form of a JSON value: strings verbatim, everything else as JSON
pub fn setting_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn run(ctx: &Context, args: &SeedArgs) -> Result<()> {
    ui::header("Seed App Configuration");
    let deployment = DeploymentRef {
        subscription_id: args.subscription_id.clone(),
        resource_group: args.resource_group.clone(),
        name: args.deployment.clone(),
    };
    let endpoint = ctx.app_config_endpoint()?;
    ui::kv("Store", &endpoint);
    ui::kv("Deployment", &format!("{}/{}", deployment.resource_group, deployment.name));

    let store = ctx.session.app_config(&endpoint);
    let report = seed(&ctx.session, &store, &deployment, args.label.as_deref())?;

    if ctx.session.dry_run {
        ui::info("Dry run - nothing written");
    } else {
        ui::success(&format!(
            "Seeded {PROVISION_CONFIG} ({} entries) and {} {APP_SETTINGS} entries",
            report.provision_entries, report.app_settings
        ));
    }
    Ok(())
}

/// Outputs of a deployment, keyed by upper-cased output name
pub fn deployment_outputs(session: &Session, deployment: &DeploymentRef) -> Result<Map<String, Value>> {
    let arm = session.arm(DEPLOYMENTS_API_VERSION);
    let collection = format!(
        "subscriptions/{}/resourceGroups/{}/providers/Microsoft.Resources/deployments",
        deployment.subscription_id, deployment.resource_group
    );
    let found = arm
        .get(&collection, &deployment.name)?
        .ok_or_else(|| anyhow!("deployment '{}' not found in '{}'", deployment.name, deployment.resource_group))?;

    let outputs = found
        .pointer("/properties/outputs")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    Ok(outputs.into_iter().map(|(k, v)| (k.to_uppercase(), v)).collect())
}

fn output_object<'a>(outputs: &'a Map<String, Value>, name: &str) -> Result<&'a Map<String, Value>> {
    match outputs.get(name).and_then(|o| o.get("value")) {
        Some(Value::Object(map)) => Ok(map),
        Some(_) => bail!("{name}.value in deployment outputs is not an object"),
        None => bail!("missing {name}.value in deployment outputs"),
    }
}

/// Write `PROVISION_CONFIG` as one JSON setting and every `APP_SETTINGS`
/// entry as its own setting. Both outputs are checked before any write;
/// the first failed write aborts.
pub fn seed(
    session: &Session,
    store: &dyn ConfigStore,
    deployment: &DeploymentRef,
    label: Option<&str>,
) -> Result<SeedReport> {
    let outputs = deployment_outputs(session, deployment)?;
    let provision = output_object(&outputs, PROVISION_CONFIG)?;
    let app_settings = output_object(&outputs, APP_SETTINGS)?;

    let blob = serde_json::to_string(provision)?;
    if session.dry_run {
        ui::dim(&format!("would set {PROVISION_CONFIG} ({} entries)", provision.len()));
    } else {
        store.set(PROVISION_CONFIG, label, &blob)?;
    }
    for (key, value) in provision {
        log::info!("{PROVISION_CONFIG}: {key} = {}", setting_value(value));
    }

    for (key, value) in app_settings {
        let value = setting_value(value);
        if session.dry_run {
            ui::dim(&format!("would set {key}"));
            continue;
        }
        log::info!("Setting {key}");
        store.set(key, label, &value)?;
    }

    Ok(SeedReport {
        provision_entries: provision.len(),
        app_settings: app_settings.len(),
    })
}
