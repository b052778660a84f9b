use std::net::SocketAddr;
use tonic::transport::Server;
use tonic_reflection::server::Builder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_grpc::{pb::narratives_server::NarrativesServer, ApiKeyInterceptor, NarrativesService};
use api_shared::FILE_DESCRIPTOR_SET;
use ezn_core::{ConfigInputs, CoreConfig, Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_grpc=info".parse()?)
                .add_directive("ezn_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr: SocketAddr = std::env::var("EZN_GRPC_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:50051".into())
        .parse()?;
    let api_key = std::env::var("API_KEY").unwrap_or_default();
    if api_key.is_empty() {
        tracing::warn!("API_KEY is not set; every gRPC call will be rejected");
    }

    let cfg = CoreConfig::try_from(ConfigInputs::from_env())?;
    let services = Services::from_config(&cfg)?;

    tracing::info!("-- Starting EZ Narratives gRPC on {}", addr);

    let mut server_builder = Server::builder().add_service(NarrativesServer::with_interceptor(
        NarrativesService::new(services),
        ApiKeyInterceptor::new(api_key),
    ));

    if std::env::var("EZN_ENABLE_REFLECTION").unwrap_or_else(|_| "false".to_string()) == "true" {
        let reflection_service = Builder::configure()
            .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
            .build_v1()?;
        server_builder = server_builder.add_service(reflection_service);
        tracing::info!("gRPC server reflection enabled");
    } else {
        tracing::info!("gRPC server reflection disabled");
    }

    server_builder.serve(addr).await?;

    Ok(())
}
