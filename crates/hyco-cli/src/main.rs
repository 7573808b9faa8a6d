//! hyco: Hybrid Connections relay client.
//!
//! Runs a multiplexing listener that answers relayed HTTP requests and
//! accepts relayed WebSockets, and provides the matching sender side for
//! trying it out.

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use hyco_client::SessionConfig;
use hyco_core::RelayEndpoint;

/// hyco: Hybrid Connections relay client
#[derive(Parser)]
#[command(name = "hyco", version, about = "Hybrid Connections relay listener and sender")]
struct Cli {
    /// Config file path (default ~/.hyco/config.toml)
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Relay namespace host, e.g. contoso.servicebus.windows.net
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Hybrid connection name
    #[arg(short, long, global = true)]
    path: Option<String>,

    /// Shared access policy name
    #[arg(long = "key-rule", global = true)]
    key_rule: Option<String>,

    /// Shared access key
    #[arg(short, long, global = true)]
    key: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Listen on the hybrid connection and echo every request
    Listen {
        /// Ping every 2 s and renew every 60 s
        #[arg(long)]
        bare: bool,
    },

    /// Send HTTP requests through the relay (GET then POST by default)
    Send {
        /// Send a single request with this method
        #[arg(short, long)]
        method: Option<String>,

        /// Request body
        #[arg(short, long)]
        body: Option<String>,
    },

    /// Open a WebSocket through the relay and send a line every interval
    Connect {
        /// Seconds between messages
        #[arg(long, default_value_t = 1)]
        interval: u64,
    },

    /// Print a fresh SAS token for the hybrid connection
    Token,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("hyco=debug,hyco_cli=debug,hyco_client=debug,hyco_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .init();
}

/// Merge the config file with command-line overrides.
fn resolve(cli: &Cli) -> Result<(RelayEndpoint, config::ListenerConfig)> {
    let path = cli.config.clone().unwrap_or_else(config::Config::default_path);
    let mut cfg = config::Config::load(&path)?;

    if let Some(namespace) = &cli.namespace {
        cfg.relay.namespace = namespace.clone();
    }
    if let Some(path) = &cli.path {
        cfg.relay.path = path.clone();
    }
    if let Some(key_rule) = &cli.key_rule {
        cfg.relay.key_rule = key_rule.clone();
    }
    if let Some(key) = &cli.key {
        cfg.relay.key = key.clone();
    }

    let endpoint = cfg.relay.endpoint();
    endpoint.validate()?;
    Ok((endpoint, cfg.listener))
}

async fn run(cli: Cli) -> Result<()> {
    let (endpoint, listener) = resolve(&cli)?;

    match cli.command {
        Command::Listen { bare } => {
            let session = if bare {
                SessionConfig::bare()
            } else {
                listener.validate()?;
                listener.session_config()
            };
            commands::listen::run(endpoint, session).await
        }
        Command::Send { method, body } => {
            commands::send::run(endpoint, method.as_deref(), body.as_deref()).await
        }
        Command::Connect { interval } => commands::connect::run(endpoint, interval).await,
        Command::Token => commands::token::run(endpoint),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("hyco: {e:#}");
        std::process::exit(1);
    }
}
