use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use azrest::SettleConfig;

pub const DEFAULT_LABEL: &str = "infra";

#[derive(Parser)]
#[command(name = "provision")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Provision AI Foundry connections, search assets and content-safety policies", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// App Configuration endpoint (https://{name}.azconfig.io)
    #[arg(long, env = "AZURE_APP_CONFIG_ENDPOINT", global = true)]
    pub app_config_endpoint: Option<String>,

    /// Bearer token to use for every call instead of the Azure CLI
    #[arg(long, env = "AZURE_ACCESS_TOKEN", hide_env_values = true, global = true)]
    pub access_token: Option<String>,

    /// Resolve and build everything but write nothing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Only apply resources of a type, or `type.name` (e.g. `search`, `connection.aoai`)
    #[arg(long, global = true)]
    pub target: Option<String>,

    /// How to wait for a delete before recreating
    #[arg(long, value_enum, default_value_t = SettleMode::Poll, global = true)]
    pub settle_mode: SettleMode,

    /// Maximum polls while waiting for a delete
    #[arg(long, global = true)]
    pub settle_attempts: Option<u32>,

    /// First poll delay, or the whole pause with `--settle-mode fixed`
    #[arg(long, global = true)]
    pub settle_delay_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SettleMode {
    /// Sleep once, then recreate
    Fixed,
    /// Poll until the resource is gone
    Poll,
}

impl Cli {
    pub fn settle_config(&self) -> SettleConfig {
        let delay = self.settle_delay_ms.map(Duration::from_millis);
        let mut settle = match self.settle_mode {
            SettleMode::Fixed => SettleConfig::fixed(delay.unwrap_or(Duration::from_secs(5))),
            SettleMode::Poll => SettleConfig::default(),
        };
        if self.settle_mode == SettleMode::Poll
            && let Some(delay) = delay
        {
            settle.base_delay = delay;
        }
        if let Some(attempts) = self.settle_attempts {
            settle.max_attempts = attempts;
        }
        settle
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Register AI Foundry hub connections from a definition file
    Connections(ConnectionsArgs),

    /// Create the RAG and NL2SQL search asset chains
    Search(SearchArgs),

    /// Apply content-safety blocklists, policies and deployment associations
    Rai(RaiArgs),

    /// Seed App Configuration from ARM deployment outputs
    Seed(SeedArgs),

    /// Export PROVISION_CONFIG into the azd environment
    LoadConfig(LoadConfigArgs),

    /// Inspect the config store
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
pub struct ConnectionsArgs {
    /// Connection definitions (JSON)
    #[arg(short, long, default_value = "config/aifoundry/connections.json")]
    pub file: String,

    /// Config store label
    #[arg(long, default_value = DEFAULT_LABEL)]
    pub label: String,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Config store label
    #[arg(long, default_value = DEFAULT_LABEL)]
    pub label: String,
}

#[derive(Debug, Args)]
pub struct RaiArgs {
    /// Content-safety definitions (JSON)
    #[arg(short, long, default_value = "config/rai/policies.json")]
    pub file: String,

    /// Config store label
    #[arg(long, default_value = DEFAULT_LABEL)]
    pub label: String,
}

#[derive(Debug, Args)]
pub struct SeedArgs {
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: String,

    #[arg(long, env = "AZURE_RESOURCE_GROUP")]
    pub resource_group: String,

    /// ARM deployment whose outputs are copied
    #[arg(long, env = "AZURE_DEPLOYMENT_NAME")]
    pub deployment: String,

    /// Label for written settings (none by default)
    #[arg(long)]
    pub label: Option<String>,
}

#[derive(Debug, Args)]
pub struct LoadConfigArgs {
    /// Label PROVISION_CONFIG was seeded under
    #[arg(long)]
    pub label: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Resolve a `{KEY}` / `{KEY.attr}` template against the store
    Resolve {
        template: String,

        #[arg(long, default_value = DEFAULT_LABEL)]
        label: String,
    },

    /// List settings under a label
    Show {
        /// Only keys starting with this prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Print values instead of masking them
        #[arg(long)]
        reveal: bool,

        #[arg(long, default_value = DEFAULT_LABEL)]
        label: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use azrest::SettleMode as Mode;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_connections_defaults() {
        let cli = Cli::try_parse_from(["provision", "connections"]).unwrap();
        match cli.command {
            Command::Connections(args) => {
                assert_eq!(args.file, "config/aifoundry/connections.json");
                assert_eq!(args.label, "infra");
            }
            _ => panic!("expected connections"),
        }
    }

    #[test]
    fn test_settle_config_from_flags() {
        let cli = Cli::try_parse_from([
            "provision",
            "--settle-mode",
            "fixed",
            "--settle-delay-ms",
            "250",
            "search",
        ])
        .unwrap();
        let settle = cli.settle_config();
        assert_eq!(settle.mode, Mode::Fixed);
        assert_eq!(settle.base_delay, Duration::from_millis(250));

        let cli = Cli::try_parse_from(["provision", "search", "--settle-attempts", "3"]).unwrap();
        let settle = cli.settle_config();
        assert_eq!(settle.mode, Mode::Poll);
        assert_eq!(settle.max_attempts, 3);
    }

    #[test]
    fn test_global_dry_run_after_subcommand() {
        let cli = Cli::try_parse_from(["provision", "rai", "--dry-run", "-f", "x.json"]).unwrap();
        assert!(cli.dry_run);
        assert!(cli.target.is_none());

        let cli = Cli::try_parse_from(["provision", "search", "--target", "search_index.rag"]).unwrap();
        assert_eq!(cli.target.as_deref(), Some("search_index.rag"));
    }
}
