//! # API REST
//!
//! REST API implementation for EZ Narratives.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, bearer-token extraction)
//!
//! Uses `api-shared` for common types and `ezn-core` for every operation.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod extract;
pub mod handlers;

use api_shared::pb;
use axum::routing::{get, post, put};
use axum::Router;
use ezn_core::Services;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use error::ApiError;

/// Application state for the REST API server
///
/// Holds the core services shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::accounts::signup,
        handlers::accounts::login,
        handlers::accounts::logout,
        handlers::accounts::me,
        handlers::accounts::update_password,
        handlers::accounts::get_settings,
        handlers::accounts::update_settings,
        handlers::forms::ems_defaults,
        handlers::forms::ems_prefill,
        handlers::forms::ems_options,
        handlers::forms::fire_prefill,
        handlers::forms::fire_options,
        handlers::narratives::generate_ems,
        handlers::narratives::generate_fire,
        handlers::narratives::list,
        handlers::narratives::get,
        handlers::narratives::delete,
        handlers::narratives::sync,
        handlers::sessions::list,
        handlers::sessions::create,
        handlers::sessions::rename,
        handlers::sessions::delete,
        handlers::sessions::add_message,
        handlers::sessions::chat,
        handlers::knowledge::sources,
        handlers::knowledge::get_preferences,
        handlers::knowledge::save_preferences,
        handlers::knowledge::query_protocol,
    ),
    components(schemas(
        pb::HealthRes,
        pb::SuccessRes,
        pb::SignUpReq,
        pb::LoginReq,
        pb::User,
        pb::AuthRes,
        pb::UpdatePasswordReq,
        pb::NarrativeSettings,
        pb::UserSettings,
        pb::EmsForm,
        pb::FireForm,
        pb::EmsFormOptions,
        pb::FireFormOptions,
        pb::GenerateEmsNarrativeReq,
        pb::GenerateFireNarrativeReq,
        pb::GenerateNarrativeRes,
        pb::Narrative,
        pb::ListNarrativesRes,
        pb::SyncOfflineCacheRes,
        pb::ChatMessage,
        pb::ChatMessagesRes,
        pb::Session,
        pb::ListSessionsRes,
        pb::RenameSessionReq,
        pb::DeleteSessionRes,
        pb::AddMessageReq,
        pb::SendChatMessageReq,
        pb::KnowledgeSource,
        pb::ListKnowledgeSourcesRes,
        pb::KbPreferences,
        pb::ProtocolQueryReq,
        pb::ProtocolSnippet,
        pb::ProtocolQueryRes,
    ))
)]
pub struct ApiDoc;

/// Build the REST router with Swagger UI at `/swagger-ui` and the OpenAPI document at
/// `/api-docs/openapi.json`.
pub fn router(state: AppState) -> Router {
    use handlers::{accounts, forms, knowledge, narratives, sessions};

    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/signup", post(accounts::signup))
        .route("/auth/login", post(accounts::login))
        .route("/auth/logout", post(accounts::logout))
        .route("/auth/me", get(accounts::me))
        .route("/auth/password", put(accounts::update_password))
        .route(
            "/settings",
            get(accounts::get_settings).put(accounts::update_settings),
        )
        .route("/forms/ems/defaults", get(forms::ems_defaults))
        .route("/forms/ems/prefill", get(forms::ems_prefill))
        .route("/forms/ems/options", get(forms::ems_options))
        .route("/forms/fire/prefill", get(forms::fire_prefill))
        .route("/forms/fire/options", get(forms::fire_options))
        .route("/narratives", get(narratives::list))
        .route("/narratives/ems", post(narratives::generate_ems))
        .route("/narratives/fire", post(narratives::generate_fire))
        .route("/narratives/sync", post(narratives::sync))
        .route(
            "/narratives/:id",
            get(narratives::get).delete(narratives::delete),
        )
        .route("/sessions", get(sessions::list).post(sessions::create))
        .route(
            "/sessions/:id",
            put(sessions::rename).delete(sessions::delete),
        )
        .route("/sessions/:id/messages", post(sessions::add_message))
        .route("/sessions/:id/chat", post(sessions::chat))
        .route("/knowledge/sources", get(knowledge::sources))
        .route(
            "/knowledge/preferences",
            get(knowledge::get_preferences).put(knowledge::save_preferences),
        )
        .route("/protocols/query", post(knowledge::query_protocol))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
