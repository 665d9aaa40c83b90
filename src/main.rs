//! Strictly Bulls - Unified CLI
//!
//! Bulls and Cows game server.

#![warn(missing_docs)]

mod cli;

use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::http::Request;
use clap::Parser;
use cli::{Cli, Command};
use strictly_bulls::{
    AppState, ConnectionHub, Coordinator, GameRepository, ServerConfig, SoloService, router,
    run_migrations,
};
use tower::ServiceBuilder;
use tracing::{debug, info, instrument};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();
    initialize_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            host,
            db_path,
        } => run_server(config, host, port, db_path).await,
        Command::Migrate { db_path } => {
            run_migrations(&db_path)?;
            info!(db_path = %db_path, "Database is up to date");
            Ok(())
        }
    }
}

/// Run the game server
#[instrument(skip_all)]
async fn run_server(
    config_path: Option<std::path::PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    db_path: Option<String>,
) -> Result<()> {
    let mut config = ServerConfig::load(config_path.as_deref())?;
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }
    if let Some(db_path) = db_path {
        config = config.with_database_path(db_path);
    }
    debug!(?config, "Effective configuration");

    run_migrations(config.database_path())?;
    let repository = GameRepository::new(config.database_path().clone())?;

    let hub = Arc::new(ConnectionHub::new());
    let coordinator = Coordinator::new(Arc::new(repository.clone()), hub.clone())
        .with_id_policy(*config.session_id_length(), *config.session_id_attempts());
    let state = AppState::new(coordinator, hub, SoloService::new(repository));

    let app = router(state).layer(ServiceBuilder::new().map_request(|req: Request<Body>| {
        debug!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
        req
    }));

    let listener = tokio::net::TcpListener::bind((config.host().as_str(), *config.port())).await?;
    info!(
        "Server ready at http://{}:{}/ (WebSocket on /ws)",
        config.host(),
        config.port()
    );

    axum::serve(listener, app).await?;
    Ok(())
}

fn initialize_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,strictly_bulls=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
