//! qosctl - node QoS agent CLI
//!
//! Queries the advertised QoS resources of a node, previews the spec
//! mutations of pod and container configs, and drives sandbox network
//! negotiation for troubleshooting.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{negotiate, resolve, resources, status};
use std::path::PathBuf;

/// Node QoS agent CLI
#[derive(Parser)]
#[command(name = "qosctl")]
#[command(author, version, about = "CLI for the node QoS agent", long_about = None)]
pub struct Cli {
    /// Agent API URL (can also be set via QOS_API_URL env var)
    #[arg(long, env = "QOS_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the QoS resource types and classes the node advertises
    Resources {
        /// Only show one scope
        #[arg(long, value_enum)]
        scope: Option<resources::ScopeArg>,
    },

    /// Preview the spec mutations for a config
    #[command(subcommand)]
    Resolve(ResolveCommands),

    /// Negotiate a sandbox network with the policy agent
    Negotiate {
        /// JSON file with `sandbox_id` and `sandbox` (`-` for stdin)
        #[arg(long, short = 'F')]
        file: PathBuf,
    },

    /// Reload the CNI network configuration
    Reload,

    /// Show agent health
    Health,
}

#[derive(Subcommand)]
pub enum ResolveCommands {
    /// Resolve a pod sandbox config
    Sandbox {
        /// Pod sandbox config JSON file (`-` for stdin)
        #[arg(long, short = 'F')]
        file: PathBuf,
    },

    /// Resolve a container config together with its sandbox
    Container {
        /// JSON file with `container` and `sandbox` (`-` for stdin)
        #[arg(long, short = 'F')]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        output::print_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client = client::ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Resources { scope } => {
            resources::list_resources(&client, scope, cli.format).await?;
        }
        Commands::Resolve(resolve_cmd) => match resolve_cmd {
            ResolveCommands::Sandbox { file } => {
                resolve::resolve_sandbox(&client, &file, cli.format).await?;
            }
            ResolveCommands::Container { file } => {
                resolve::resolve_container(&client, &file, cli.format).await?;
            }
        },
        Commands::Negotiate { file } => {
            negotiate::negotiate(&client, &file, cli.format).await?;
        }
        Commands::Reload => {
            status::reload(&client, cli.format).await?;
        }
        Commands::Health => {
            status::show_health(&client, cli.format).await?;
        }
    }

    Ok(())
}
