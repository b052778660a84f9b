//! Knowledge-base sources, preferences and protocol search.

use crate::error::ApiError;
use crate::extract::Authenticated;
use crate::AppState;
use api_shared::pb;
use axum::extract::State;
use axum::response::Json;

#[utoipa::path(
    get,
    path = "/knowledge/sources",
    responses(
        (status = 200, description = "Enabled sources, by name", body = pb::ListKnowledgeSourcesRes),
        (status = 401, description = "Not authenticated")
    )
)]
#[axum::debug_handler]
pub async fn sources(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Result<Json<pb::ListKnowledgeSourcesRes>, ApiError> {
    let sources = state.services.knowledge.sources(&user).await?;
    Ok(Json(pb::ListKnowledgeSourcesRes {
        sources: sources.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/knowledge/preferences",
    responses(
        (status = 200, description = "Sources searched during EMS generation", body = pb::KbPreferences),
        (status = 401, description = "Not authenticated")
    )
)]
#[axum::debug_handler]
pub async fn get_preferences(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Result<Json<pb::KbPreferences>, ApiError> {
    let preferences = state.services.knowledge.preferences(&user).await?;
    Ok(Json(preferences.into()))
}

#[utoipa::path(
    put,
    path = "/knowledge/preferences",
    request_body = pb::KbPreferences,
    responses(
        (status = 200, description = "Saved preferences", body = pb::KbPreferences),
        (status = 401, description = "Not authenticated")
    )
)]
#[axum::debug_handler]
pub async fn save_preferences(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Json(req): Json<pb::KbPreferences>,
) -> Result<Json<pb::KbPreferences>, ApiError> {
    let saved = state
        .services
        .knowledge
        .save_preferences(&user, req.into())
        .await?;
    Ok(Json(saved.into()))
}

#[utoipa::path(
    post,
    path = "/protocols/query",
    request_body = pb::ProtocolQueryReq,
    responses(
        (status = 200, description = "Matching protocol snippets", body = pb::ProtocolQueryRes),
        (status = 400, description = "Question or sources missing"),
        (status = 401, description = "Not authenticated")
    )
)]
/// Search the selected protocol sources. `top_k` of 0 means the default of 5.
#[axum::debug_handler]
pub async fn query_protocol(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Json(req): Json<pb::ProtocolQueryReq>,
) -> Result<Json<pb::ProtocolQueryRes>, ApiError> {
    let answer = state
        .services
        .knowledge
        .query_protocol(&user, &req.question, &req.sources, Some(req.top_k))
        .await?;
    Ok(Json(answer.into()))
}
