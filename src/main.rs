use std::net::SocketAddr;
use tonic::transport::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_grpc::{ApiKeyInterceptor, NarrativesService, pb::narratives_server::NarrativesServer};
use api_rest::{AppState, router};
use api_shared::FILE_DESCRIPTOR_SET;
use ezn_core::{ConfigInputs, CoreConfig, Services};

/// Main entry point for EZ Narratives
///
/// Starts both gRPC and REST servers concurrently over one set of core services:
/// - gRPC server on port 50051 (configurable via EZN_GRPC_ADDR)
/// - REST server on port 3000 (configurable via EZN_REST_ADDR)
///
/// gRPC calls need the `x-api-key` header and both servers need an
/// `authorization: Bearer` access token for per-user operations.
///
/// # Environment Variables
/// - `EZN_GRPC_ADDR`: gRPC server address (default: "0.0.0.0:50051")
/// - `EZN_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `API_KEY`: API key for gRPC authentication
/// - `EZN_ENABLE_REFLECTION`: "true" registers gRPC server reflection
/// - `SUPABASE_URL`, `SUPABASE_ANON_KEY`, `LLM_PROVIDER`, `OPENAI_API_KEY`,
///   `OPENROUTER_API_KEY`, `LLM_MODEL`, `OPENAI_EMBEDDING_MODEL`, `EZN_CACHE_DIR`:
///   see `ezn_core::ConfigInputs`
///
/// # Returns
/// * `Ok(())` - If servers start and run successfully
/// * `Err(anyhow::Error)` - If configuration, startup or either server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ezn_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("api_grpc=info".parse()?)
                .add_directive("ezn_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let grpc_addr: SocketAddr = std::env::var("EZN_GRPC_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:50051".into())
        .parse()?;
    let rest_addr = std::env::var("EZN_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let api_key = std::env::var("API_KEY").unwrap_or_default();
    if api_key.is_empty() {
        tracing::warn!("API_KEY is not set; every gRPC call will be rejected");
    }

    let cfg = CoreConfig::try_from(ConfigInputs::from_env())?;
    let services = Services::from_config(&cfg)?;

    tracing::info!("++ Starting EZ Narratives gRPC on {}", grpc_addr);
    tracing::info!("++ Starting EZ Narratives REST on {}", rest_addr);

    let rest_app = router(AppState::new(services.clone()));
    let rest_server = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
        axum::serve(listener, rest_app).await?;
        Ok::<_, anyhow::Error>(())
    });

    let mut grpc_builder = Server::builder().add_service(NarrativesServer::with_interceptor(
        NarrativesService::new(services),
        ApiKeyInterceptor::new(api_key),
    ));
    if std::env::var("EZN_ENABLE_REFLECTION").is_ok_and(|v| v == "true") {
        let reflection = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
            .build_v1()?;
        grpc_builder = grpc_builder.add_service(reflection);
        tracing::info!("gRPC server reflection enabled");
    }
    let grpc_server = grpc_builder.serve(grpc_addr);

    let (rest_result, grpc_result) = tokio::join!(rest_server, grpc_server);
    rest_result??;
    grpc_result?;

    Ok(())
}
