//! fixmux CLI binary.
//!
//! # Commands
//!
//! - `agent` - Run the session agent in the foreground
//! - `shutdown` - Ask a running agent to close every session and exit

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fixmux::{config::Config, control::Controller, Agent, VERSION};

#[derive(Parser)]
#[command(name = "fixmux")]
#[command(version = VERSION)]
#[command(about = "FIX session agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the session agent in the foreground
    Agent {
        /// Control listener host
        #[arg(long)]
        host: Option<String>,

        /// Control listener port
        #[arg(short, long)]
        port: Option<u16>,

        /// TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Ask a running agent to shut down
    Shutdown {
        /// Agent control host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Agent control port
        #[arg(short, long, default_value_t = fixmux::config::DEFAULT_CONTROL_PORT)]
        port: u16,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Agent {
            host,
            port,
            config,
            verbose,
        } => cmd_agent(host, port, config, verbose),
        Commands::Shutdown { host, port } => cmd_shutdown(&host, port),
    }
}

fn cmd_agent(
    host: Option<String>,
    port: Option<u16>,
    config_file: Option<PathBuf>,
    verbose: bool,
) -> anyhow::Result<()> {
    // Initialize logging
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    // File config under env config under CLI flags.
    let mut config = match config_file {
        Some(path) => Config::from_file(path).map_err(|e| anyhow::anyhow!("{e}"))?,
        None => Config::default(),
    };
    config = config.merge(Config::from_env());

    if let Some(host) = host {
        config.control.host = host;
    }
    if let Some(port) = port {
        config.control.port = port;
    }

    tracing::info!("Starting fixmux agent on {}", config.control_addr());

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let agent = Agent::bind(config).await.map_err(|e| anyhow::anyhow!("{e}"))?;
        agent.run().await.map_err(|e| anyhow::anyhow!("{e}"))
    })
}

fn cmd_shutdown(host: &str, port: u16) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let mut controller = Controller::connect((host, port))
            .await
            .map_err(|e| anyhow::anyhow!("Could not reach agent at {host}:{port}: {e}"))?;
        controller
            .shutdown()
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        println!("Agent at {host}:{port} shut down");
        Ok(())
    })
}
