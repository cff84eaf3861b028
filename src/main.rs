//! Todo server
//!
//! Multi-user task list over HTTP with bearer-token auth, an API-key
//! integration surface and optional calendar sync.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use todo_server::cli::{Cli, Command};
use todo_server::config::Config;
use todo_server::db::Database;
use todo_server::logging::{self, LogSink};
use todo_server::server::{AppState, start_server};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogSink::parse(&cli.log), cli.verbose)?;

    let mut config = Config::load_with_env(cli.config.as_deref().map(Path::new))?;
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.into();
    }
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    config.ensure_db_dir()?;
    let db = Arc::new(Database::open(&config.server.db_path)?);
    info!("Database opened at {:?}", config.server.db_path);

    match cli.command {
        Some(Command::CreateUser { username, password }) => {
            let user = db.register_user(&username, &password)?;
            println!("Created user {} ({})", user.username, user.id);
            Ok(())
        }
        Some(Command::Serve) | None => serve(config, db).await,
    }
}

async fn serve(config: Config, db: Arc<Database>) -> Result<()> {
    if config.uses_dev_secret() {
        warn!("JWT_SECRET is not set; using the built-in development secret");
    }
    if config.integration.api_key.is_none() {
        info!("No integration API key configured; /appian routes disabled");
    }
    if config.calendar.is_none() {
        info!("No calendar client configured; /calendar routes disabled");
    }

    let addr: SocketAddr = tokio::net::lookup_host((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| format!("resolving listen address {}", config.server.host))?
        .next()
        .with_context(|| format!("no address for host {}", config.server.host))?;

    let state = AppState::from_config(&config, db);
    let handle = start_server(state, addr).await?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown signal received");
    handle.shutdown().await;

    Ok(())
}
