//! taskbridge - Todoist tool server
//!
//! Reads NUL-delimited JSON-RPC requests on stdin and writes responses to
//! stdout. Logs go to stderr.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use taskbridge_server::{builtin_registry, Config, Server, ServerConfig};
use taskbridge_todoist::{api_token_from_env, TodoistClient};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taskbridge")]
#[command(about = "Stdio tool server that creates tasks in Todoist")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "TASKBRIDGE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // stdout carries the protocol, so logs must not go there
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::load_from(cli.config.as_deref()) {
        Ok(c) => {
            if let Some(ref path) = cli.config {
                tracing::info!("Loaded config from {}", path.display());
            }
            c
        }
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    let api_token = match api_token_from_env() {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("{}", e);
            return Err(e.into());
        }
    };

    tracing::info!("Starting taskbridge");
    tracing::info!("  Todoist endpoint: {}", config.todoist.base_url);
    tracing::info!("  Tool timeout: {}s", config.server.tool_timeout_secs);
    tracing::info!("  Shutdown grace: {}s", config.server.shutdown_grace_secs);

    let backend = TodoistClient::new(config.todoist_config(api_token))?;
    let registry = builtin_registry(Arc::new(backend));
    let server = Server::new(ServerConfig::from_settings(&config.server), registry);

    server.run().await?;

    tracing::info!("Input closed, exiting");
    Ok(())
}
