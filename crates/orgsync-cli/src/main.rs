mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, org::OrgSubcommand, run::RunExit};
use orgsync_core::paths::CONFIG_ENV;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "orgsync",
    about = "Provision AWS member accounts for course project teams",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: nearest orgsync.yaml upward from the current directory)
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log at debug level
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full reconciliation pipeline
    Run,

    /// Check credentials, permissions and organization setup without changing anything
    Preflight,

    /// Show the course iteration OUs and their member accounts
    Tree,

    /// Show which accounts a run would create
    Diff,

    /// Show the desired state derived from the roster (no AWS access)
    Desired,

    /// Manage the AWS organization itself
    Org {
        #[command(subcommand)]
        subcommand: OrgSubcommand,
    },

    /// Create, show and validate the config file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        match &cli.command {
            Commands::Run | Commands::Preflight => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = root::resolve_config(cli.config.as_deref());

    let result = match cli.command {
        Commands::Run => cmd::run::run(&config_path, cli.json),
        Commands::Preflight => cmd::preflight::run(&config_path, cli.json),
        Commands::Tree => cmd::tree::run(&config_path, cli.json),
        Commands::Diff => cmd::diff::run(&config_path, cli.json),
        Commands::Desired => cmd::desired::run(&config_path, cli.json),
        Commands::Org { subcommand } => cmd::org::run(&config_path, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&config_path, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        let code = e.downcast_ref::<RunExit>().map_or(1, RunExit::exit_code);
        std::process::exit(code);
    }
}
