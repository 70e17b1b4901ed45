//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::models::{Environment, MigrationRequest, TargetSelection};

#[derive(Parser, Debug)]
#[command(name = "kv-migrator")]
#[command(about = "Migrate a stack's search heads to the external KV store", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .kv-migrator/
    #[arg(short, long, global = true, env = "KVMIGRATOR_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the migration end to end
    Run(RunArgs),

    /// Report eligibility without changing anything
    Check(StackArgs),
}

/// Stack selection shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct StackArgs {
    /// Stack name
    #[arg(short, long)]
    pub stack: String,

    /// Spec store environment: dev, stg, prod (lve is an alias of prod)
    #[arg(short, long, default_value = "prod")]
    pub env: Environment,

    /// Roles to migrate, comma separated; `all` selects every active role
    #[arg(
        short = 'n',
        long = "targets",
        alias = "name",
        value_delimiter = ',',
        default_value = "all"
    )]
    pub targets: Vec<String>,
}

impl StackArgs {
    pub fn stack_name(&self) -> String {
        self.stack.trim().to_lowercase()
    }

    pub fn selection(&self) -> TargetSelection {
        TargetSelection::from_labels(
            self.targets
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty()),
        )
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Change ticket referenced in every proposal
    #[arg(short, long)]
    pub ticket: String,

    /// Do not add or remove monitoring downtime
    #[arg(long, alias = "skip-dt")]
    pub skip_downtime: bool,
}

impl RunArgs {
    pub fn to_request(&self) -> MigrationRequest {
        MigrationRequest {
            stack: self.stack.stack_name(),
            ticket: self.ticket.trim().to_uppercase(),
            environment: self.stack.env,
            targets: self.stack.selection(),
            skip_downtime: self.skip_downtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_normalizes_input() {
        let cli = Cli::try_parse_from([
            "kv-migrator", "run", "-s", "ACME", "-t", "co2-77", "-e", "lve", "-n", "SH1,sh3",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let request = args.to_request();
        assert_eq!(request.stack, "acme");
        assert_eq!(request.ticket, "CO2-77");
        assert_eq!(request.environment, Environment::Prod);
        assert!(request.targets.includes("sh1"));
        assert!(request.targets.includes("sh3"));
        assert!(!request.targets.includes("sh2"));
        assert!(!request.skip_downtime);
    }
}
