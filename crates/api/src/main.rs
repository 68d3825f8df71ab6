//! conduit API server binary.
//!
//! Usage:
//!   conduit-api --config config.toml
//!   conduit-api --port 8080
//!   conduit-api --port 8080 --bind 0.0.0.0
//!
//! # Environment Variables
//!
//! - `CONDUIT_BIND_ADDR` - Server bind address (default: 127.0.0.1)
//! - `CONDUIT_CORS_ORIGINS` - CORS allowed origins (comma-separated)
//! - `OPENAI_API_KEY` - API key for the decision service and LLM phrasing

use clap::Parser;
use conduit_api::{serve, AppState};
use conduit_coordinator::CoordinatorConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "conduit-api", version, about = "Routing and streaming server for conduit")]
struct Args {
    /// Path to config.toml file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Bind address
    #[arg(short, long, env = "CONDUIT_BIND_ADDR", default_value = "127.0.0.1")]
    bind: String,

    /// CORS allowed origins (comma-separated, `*` for any)
    #[arg(long, env = "CONDUIT_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,conduit_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.bind == "0.0.0.0" {
        tracing::warn!(
            "Server binding to 0.0.0.0. This exposes the API to all network interfaces \
             and the API has no authentication."
        );
    }

    let cors_origins: Option<Vec<String>> = {
        let origins: Vec<String> = args
            .cors_origins
            .iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        (!origins.is_empty()).then_some(origins)
    };

    let config = if let Some(path) = &args.config {
        tracing::info!(path = %path.display(), "Loading configuration");
        CoordinatorConfig::from_file(path)?
    } else {
        tracing::info!("Using default configuration");
        CoordinatorConfig::default()
    };

    let state = AppState::new(&config)?;
    tracing::info!(
        decision_service = state.engine.router().has_decision_service(),
        capabilities = state.engine.registry().len(),
        "Engine ready"
    );

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    serve(Arc::new(state), addr, cors_origins).await?;

    Ok(())
}
