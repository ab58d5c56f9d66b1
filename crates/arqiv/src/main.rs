use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arqiv::api::{self, AppState};
use arqiv::auth::{AuthState, KeycloakProvider};
use arqiv::config::AppConfig;
use arqiv_files::FilesState;

#[derive(Parser, Debug)]
#[command(name = "arqiv")]
#[command(about = "Document store backend with identity-provider gated access")]
#[command(version)]
struct Cli {
    /// Config file path (optional)
    #[arg(short, long, env = "ARQIV_CONFIG")]
    config: Option<PathBuf>,

    /// Override the address to bind to
    #[arg(long, env = "ARQIV_BIND")]
    host: Option<String>,

    /// Override the port to listen on
    #[arg(short, long, env = "ARQIV_PORT")]
    port: Option<u16>,

    /// Override the storage directory
    #[arg(short, long, env = "ARQIV_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, env = "ARQIV_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "arqiv=debug,tower_http=debug"
    } else {
        "arqiv=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir.display().to_string();
    }

    // Fail startup on unusable provider configuration; the secret itself
    // stays out of the config struct and the logs.
    let client_secret = config
        .auth
        .resolve_client_secret()
        .context("validating identity provider configuration")?;

    let provider = KeycloakProvider::new(&config.auth, client_secret)?;
    let auth_state = AuthState::new(Arc::new(provider), config.auth.frontend_client.clone());

    let files_state = FilesState::new(&config.storage.data_dir);
    files_state
        .ensure_directories()
        .context("creating storage directories")?;
    info!("serving documents from {}", config.storage.data_dir);

    let state = AppState::new(auth_state, files_state);
    let app = api::create_router(state, &config.server);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("parsing bind address")?;
    info!(
        "starting arqiv on {} (realm {} at {})",
        addr, config.auth.realm, config.auth.server_url
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
