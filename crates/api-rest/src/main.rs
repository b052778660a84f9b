//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! This binary is useful for development and debugging when you only want the REST server (with
//! OpenAPI/Swagger UI). The workspace's main `ezn-run` binary runs both gRPC and REST concurrently.

use api_rest::{router, AppState};
use ezn_core::{ConfigInputs, CoreConfig, Services};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the EZ Narratives REST API server
///
/// # Environment Variables
/// - `EZN_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `SUPABASE_URL`, `SUPABASE_ANON_KEY`: hosted auth/database project
/// - `LLM_PROVIDER`, `OPENAI_API_KEY` / `OPENROUTER_API_KEY`, `LLM_MODEL`,
///   `OPENAI_EMBEDDING_MODEL`: language model
/// - `EZN_CACHE_DIR`: offline cache root (default: `~/.eznarratives_cache`)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is incomplete,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("ezn_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("EZN_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let cfg = CoreConfig::try_from(ConfigInputs::from_env())?;
    let services = Services::from_config(&cfg)?;

    tracing::info!("-- Starting EZ Narratives REST API on {}", addr);

    let app = router(AppState::new(services));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
