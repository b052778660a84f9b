//! Chat sessions and their messages.

use crate::error::ApiError;
use crate::extract::Authenticated;
use crate::AppState;
use api_shared::pb;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use ezn_core::session::MessageRole;
use serde::Deserialize;
use utoipa::IntoParams;

#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "The user's sessions", body = pb::ListSessionsRes),
        (status = 401, description = "Not authenticated")
    )
)]
#[axum::debug_handler]
pub async fn list(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Result<Json<pb::ListSessionsRes>, ApiError> {
    let sessions = state.services.sessions.list(&user).await?;
    Ok(Json(pb::ListSessionsRes {
        sessions: sessions.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/sessions",
    responses(
        (status = 201, description = "New empty session", body = pb::Session),
        (status = 401, description = "Not authenticated")
    )
)]
#[axum::debug_handler]
pub async fn create(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Result<(StatusCode, Json<pb::Session>), ApiError> {
    let session = state.services.sessions.create(&user).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

#[utoipa::path(
    put,
    path = "/sessions/{id}",
    request_body = pb::RenameSessionReq,
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "`success` is false when the new name was blank", body = pb::SuccessRes),
        (status = 401, description = "Not authenticated")
    )
)]
/// Rename a session. The `session_id` in the body is ignored in favour of the path.
#[axum::debug_handler]
pub async fn rename(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
    Json(req): Json<pb::RenameSessionReq>,
) -> Result<Json<pb::SuccessRes>, ApiError> {
    let renamed = state.services.sessions.rename(&user, &id, &req.name).await?;
    Ok(Json(pb::SuccessRes { success: renamed }))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DeleteSessionQuery {
    /// The session the client currently shows.
    #[serde(default)]
    pub active_session_id: Option<String>,
}

#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = String, Path, description = "Session id"), DeleteSessionQuery),
    responses(
        (status = 200, description = "Deleted; names the session to show next", body = pb::DeleteSessionRes),
        (status = 401, description = "Not authenticated")
    )
)]
#[axum::debug_handler]
pub async fn delete(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
    Query(query): Query<DeleteSessionQuery>,
) -> Result<Json<pb::DeleteSessionRes>, ApiError> {
    let outcome = state
        .services
        .sessions
        .delete(&user, &id, query.active_session_id.as_deref())
        .await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/messages",
    request_body = pb::AddMessageReq,
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "All messages after the append", body = pb::ChatMessagesRes),
        (status = 400, description = "Unknown role or empty content"),
        (status = 404, description = "No such session")
    )
)]
#[axum::debug_handler]
pub async fn add_message(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
    Json(req): Json<pb::AddMessageReq>,
) -> Result<Json<pb::ChatMessagesRes>, ApiError> {
    let role: MessageRole = req.role.parse()?;
    let messages = state
        .services
        .sessions
        .add_message(&user, &id, role, &req.content)
        .await?;
    Ok(Json(pb::ChatMessagesRes {
        messages: messages.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/chat",
    request_body = pb::SendChatMessageReq,
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "The assistant's reply", body = pb::ChatMessage),
        (status = 400, description = "Empty message"),
        (status = 404, description = "No such session"),
        (status = 502, description = "Language model error")
    )
)]
/// Send a chat message and get the assistant's reply. Both are stored in the session.
#[axum::debug_handler]
pub async fn chat(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
    Json(req): Json<pb::SendChatMessageReq>,
) -> Result<Json<pb::ChatMessage>, ApiError> {
    let reply = state
        .services
        .chat
        .send(&user, &id, &req.content, Some(&req.system_message))
        .await?;
    Ok(Json(reply.into()))
}
