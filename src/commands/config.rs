//! `provision config` - inspect the config store

use anyhow::Result;
use colored::Colorize;

use appconfig::{ConfigEntry, ConfigStore, Resolver};

use crate::Context;
use crate::cli::ConfigCommand;
use crate::ui;

pub fn run(ctx: &Context, cmd: &ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Resolve { template, label } => {
            let resolver = ctx.resolver(Some(label.as_str()))?;
            println!("{}", resolve(&resolver, template)?);
            Ok(())
        }
        ConfigCommand::Show { prefix, reveal, label } => {
            let endpoint = ctx.app_config_endpoint()?;
            let store = ctx.session.app_config(&endpoint);
            let entries = show(&store, prefix.as_deref(), Some(label.as_str()))?;

            ui::header(&format!("{endpoint} ({label})"));
            if entries.is_empty() {
                ui::dim("No settings found");
            }
            for entry in &entries {
                let value = if *reveal { entry.value.clone() } else { ui::mask(&entry.value) };
                println!("  {} = {}", entry.key.bold(), value.dimmed());
            }
            Ok(())
        }
    }
}

/// Resolve one template against the store
pub fn resolve(resolver: &Resolver, template: &str) -> Result<String> {
    Ok(resolver.resolve(template)?)
}

/// Entries under a label, sorted by key
pub fn show(store: &dyn ConfigStore, prefix: Option<&str>, label: Option<&str>) -> Result<Vec<ConfigEntry>> {
    let mut entries = store.list(prefix, label)?;
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(entries)
}
