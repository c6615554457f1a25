//! `odonet` binary: run a relay node or the root.

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::{Parser, Subcommand};
use odonet_server::{
    BuiltinDevices, EventStore, RelayNode, RootNode, ServerError, SystemEnv, SystemHost, TcpTransport, bridge,
    load_config,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "odonet", version, about = "OdoNet tree mesh node")]
struct Cli {
    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a relay node
    Node {
        /// Node config document
        #[arg(long)]
        config: PathBuf,

        /// Where undeliverable events are kept
        #[arg(long, default_value = "events")]
        backup_dir: PathBuf,
    },
    /// Run the root
    Root {
        /// Root config document
        #[arg(long)]
        config: PathBuf,

        /// Where received events are stored
        #[arg(long, default_value = "events")]
        events_dir: PathBuf,

        /// Bridge endpoint, defaults to `networking.this.web_ipv4:web_port`
        #[arg(long)]
        bridge: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Fatal");
            ExitCode::FAILURE
        },
    }
}

async fn run(command: Command) -> Result<(), ServerError> {
    match command {
        Command::Node { config: path, backup_dir } => {
            let config = load_config(&path)?;
            let store = EventStore::open(backup_dir)?;
            let node = RelayNode::new(
                config,
                TcpTransport,
                SystemEnv,
                SystemHost::new(path),
                Box::new(BuiltinDevices),
                store,
            )?;
            Arc::new(node).run().await
        },
        Command::Root { config: path, events_dir, bridge: bridge_endpoint } => {
            let config = load_config(&path)?;
            let this = &config.networking.this;
            let bridge_endpoint = bridge_endpoint.or_else(|| {
                this.web_port.map(|port| format!("{}:{port}", this.web_ipv4.as_deref().unwrap_or("127.0.0.1")))
            });

            let root = Arc::new(RootNode::new(config, TcpTransport, SystemEnv, EventStore::open(events_dir)?));

            if let Some(endpoint) = bridge_endpoint {
                let handle = root.handle();
                tokio::spawn(async move {
                    if let Err(err) = bridge::serve(&TcpTransport, &endpoint, handle).await {
                        error!(error = %err, "Bridge stopped");
                    }
                });
            } else {
                info!("No bridge endpoint configured");
            }

            root.run().await
        },
    }
}
