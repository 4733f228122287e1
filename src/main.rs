mod auth;
mod builder;
mod cli;
mod commands;
mod definition;
mod engine;
mod error;
mod gateway;
mod resource;
mod runner;
mod session;
mod ui;

use std::env;
use std::io;
use std::process;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{CommandFactory, Parser};
use clap_complete::generate;

use appconfig::{Cloud, Resolver, endpoint_for};
use azrest::UreqTransport;
use cli::{Cli, Command};
use error::ProvisionError;
use session::Session;

/// Global context for the application
pub struct Context {
    pub session: Session,
    app_config_endpoint: Option<String>,
}

impl Context {
    /// The App Configuration endpoint, from the flag or derived from
    /// `AZURE_APP_CONFIG_NAME` and `AZURE_CLOUD`.
    pub fn app_config_endpoint(&self) -> Result<String> {
        if let Some(endpoint) = self.app_config_endpoint.as_deref().filter(|e| !e.is_empty()) {
            return Ok(endpoint.trim_end_matches('/').to_string());
        }
        match env::var("AZURE_APP_CONFIG_NAME") {
            Ok(name) if !name.is_empty() => {
                let cloud = Cloud::from_name(&env::var("AZURE_CLOUD").unwrap_or_default());
                Ok(endpoint_for(&name, cloud))
            }
            _ => bail!("App Configuration endpoint not set; use --app-config-endpoint or AZURE_APP_CONFIG_ENDPOINT"),
        }
    }

    pub fn resolver(&self, label: Option<&str>) -> Result<Resolver> {
        let endpoint = self.app_config_endpoint()?;
        log::info!("Resolving settings from {endpoint} (label {})", label.unwrap_or("none"));
        Ok(self.session.resolver(&endpoint, label))
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Err(err) = run(&cli) {
        report(&err);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut session = Session::new(
        Arc::new(UreqTransport::new()),
        auth::token_provider(cli.access_token.as_deref()),
    )
    .with_settle(cli.settle_config())
    .with_dry_run(cli.dry_run)
    .with_target(cli.target.clone());
    session.verbose = cli.verbose;

    let ctx = Context {
        session,
        app_config_endpoint: cli.app_config_endpoint.clone(),
    };

    match &cli.command {
        Command::Connections(args) => commands::connections::run(&ctx, args),
        Command::Search(args) => commands::search::run(&ctx, args),
        Command::Rai(args) => commands::rai::run(&ctx, args),
        Command::Seed(args) => commands::seed::run(&ctx, args),
        Command::LoadConfig(args) => commands::load_config::run(&ctx, args),
        Command::Config(cmd) => commands::config::run(&ctx, cmd),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(*shell, &mut cmd, "provision", &mut io::stdout());
            Ok(())
        }
    }
}

/// The REST failure behind an error, if any
fn rest_error(err: &anyhow::Error) -> Option<&azrest::Error> {
    err.chain().find_map(|cause| {
        cause
            .downcast_ref::<azrest::Error>()
            .or_else(|| match cause.downcast_ref::<ProvisionError>() {
                Some(ProvisionError::Remote(e)) => Some(e),
                _ => None,
            })
    })
}

fn report(err: &anyhow::Error) {
    ui::error(&format!("{err:#}"));
    if let Some(rest) = rest_error(err) {
        let category = rest.category();
        ui::dim(&format!("{category}: {}", category.advice()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azrest::{ErrorCategory, Method};

    fn forbidden() -> azrest::Error {
        azrest::Error::Remote {
            method: Method::Get,
            url: "https://management.azure.com/subscriptions/s1".to_string(),
            status: 403,
            body: "denied".to_string(),
        }
    }

    #[test]
    fn test_rest_error_through_provision_error() {
        let err = anyhow::Error::from(ProvisionError::Remote(forbidden()));
        let rest = rest_error(&err).unwrap();
        assert_eq!(rest.category(), ErrorCategory::Remote);
    }

    #[test]
    fn test_rest_error_through_config_store() {
        let store = appconfig::Error::Store(azrest::Error::Http {
            message: "connection reset".to_string(),
        });
        let err = anyhow::Error::from(ProvisionError::Config(store)).context("resolving settings");
        assert_eq!(rest_error(&err).unwrap().category(), ErrorCategory::Network);
    }

    #[test]
    fn test_plain_errors_have_no_advice() {
        let err = anyhow::anyhow!("App Configuration endpoint not set");
        assert!(rest_error(&err).is_none());
    }
}
