//! `provision load-config` - export PROVISION_CONFIG into the azd environment

use anyhow::{Context as _, Result, anyhow, bail};
use serde_json::{Map, Value};

use appconfig::ConfigStore;

use super::seed::{PROVISION_CONFIG, setting_value};
use crate::Context;
use crate::cli::LoadConfigArgs;
use crate::runner::{AzdEnv, EnvSink};
use crate::ui;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub set: usize,
    pub failed: usize,
}

pub fn run(ctx: &Context, args: &LoadConfigArgs) -> Result<()> {
    ui::header("Load PROVISION_CONFIG into azd");
    let endpoint = ctx.app_config_endpoint()?;
    let store = ctx.session.app_config(&endpoint);

    let report = load(&store, args.label.as_deref(), &AzdEnv, ctx.session.dry_run)?;

    if report.failed > 0 {
        ui::warn(&format!(
            "Set {} azd environment variables, {} failed",
            report.set, report.failed
        ));
    } else {
        ui::success(&format!("Set {} azd environment variables", report.set));
    }
    Ok(())
}

/// The `PROVISION_CONFIG` blob as an object
pub fn provision_config(store: &dyn ConfigStore, label: Option<&str>) -> Result<Map<String, Value>> {
    let entry = store
        .get(PROVISION_CONFIG, label)?
        .ok_or_else(|| anyhow!("{PROVISION_CONFIG} not found in App Configuration"))?;
    let parsed: Value = serde_json::from_str(&entry.value)
        .with_context(|| format!("{PROVISION_CONFIG} is not valid JSON"))?;
    match parsed {
        Value::Object(map) => Ok(map),
        _ => bail!("{PROVISION_CONFIG} is not a JSON object"),
    }
}

/// Export every attribute through `sink`. A failed variable is logged and
/// counted; the rest are still set.
pub fn load(store: &dyn ConfigStore, label: Option<&str>, sink: &dyn EnvSink, dry_run: bool) -> Result<LoadReport> {
    let config = provision_config(store, label)?;
    let mut report = LoadReport::default();

    for (key, value) in &config {
        let value = setting_value(value);
        if dry_run {
            ui::dim(&format!("would set {key}"));
            continue;
        }
        match sink.set(key, &value) {
            Ok(()) => {
                log::info!("Set azd environment {key}");
                report.set += 1;
            }
            Err(e) => {
                log::error!("Failed to set azd environment {key}: {e:#}");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}
