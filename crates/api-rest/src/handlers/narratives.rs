//! Narrative generation and history.

use crate::error::ApiError;
use crate::extract::Authenticated;
use crate::AppState;
use api_shared::pb;
use axum::extract::{Path, State};
use axum::response::Json;
use ezn_core::forms::{EmsForm, FireForm};

#[utoipa::path(
    post,
    path = "/narratives/ems",
    request_body = pb::GenerateEmsNarrativeReq,
    responses(
        (status = 200, description = "Narrative generated and saved or cached", body = pb::GenerateNarrativeRes),
        (status = 400, description = "A required form field is missing"),
        (status = 401, description = "Not authenticated"),
        (status = 502, description = "Language model error")
    )
)]
/// Generate an EMS narrative from a patient care form.
///
/// When `session_id` is set the narrative is also added to that chat session.
#[axum::debug_handler]
pub async fn generate_ems(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Json(req): Json<pb::GenerateEmsNarrativeReq>,
) -> Result<Json<pb::GenerateNarrativeRes>, ApiError> {
    let form = EmsForm::from(req.form.unwrap_or_default());
    let generated = state
        .services
        .narratives
        .generate_ems(&user, &form, Some(&req.session_id))
        .await?;
    Ok(Json(generated.into()))
}

#[utoipa::path(
    post,
    path = "/narratives/fire",
    request_body = pb::GenerateFireNarrativeReq,
    responses(
        (status = 200, description = "Narrative generated and saved or cached", body = pb::GenerateNarrativeRes),
        (status = 400, description = "A required form field is missing"),
        (status = 401, description = "Not authenticated"),
        (status = 502, description = "Language model error")
    )
)]
#[axum::debug_handler]
pub async fn generate_fire(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Json(req): Json<pb::GenerateFireNarrativeReq>,
) -> Result<Json<pb::GenerateNarrativeRes>, ApiError> {
    let form = FireForm::from(req.form.unwrap_or_default());
    let generated = state
        .services
        .narratives
        .generate_fire(&user, &form, Some(&req.session_id))
        .await?;
    Ok(Json(generated.into()))
}

#[utoipa::path(
    get,
    path = "/narratives",
    responses(
        (status = 200, description = "The user's narratives, newest first", body = pb::ListNarrativesRes),
        (status = 401, description = "Not authenticated")
    )
)]
#[axum::debug_handler]
pub async fn list(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Result<Json<pb::ListNarrativesRes>, ApiError> {
    let narratives = state.services.narratives.list(&user).await?;
    Ok(Json(pb::ListNarrativesRes {
        narratives: narratives.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/narratives/{id}",
    params(("id" = String, Path, description = "Narrative id")),
    responses(
        (status = 200, description = "The narrative", body = pb::Narrative),
        (status = 404, description = "No such narrative for this user")
    )
)]
#[axum::debug_handler]
pub async fn get(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<pb::Narrative>, ApiError> {
    let narrative = state.services.narratives.get(&user, &id).await?;
    Ok(Json(narrative.into()))
}

#[utoipa::path(
    delete,
    path = "/narratives/{id}",
    params(("id" = String, Path, description = "Narrative id")),
    responses(
        (status = 200, description = "Deleted", body = pb::SuccessRes),
        (status = 401, description = "Not authenticated")
    )
)]
#[axum::debug_handler]
pub async fn delete(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<pb::SuccessRes>, ApiError> {
    state.services.narratives.delete(&user, &id).await?;
    Ok(Json(pb::SuccessRes { success: true }))
}

#[utoipa::path(
    post,
    path = "/narratives/sync",
    responses(
        (status = 200, description = "Offline cache replay counts", body = pb::SyncOfflineCacheRes),
        (status = 401, description = "Not authenticated")
    )
)]
/// Upload narratives cached while the database was unreachable.
#[axum::debug_handler]
pub async fn sync(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Result<Json<pb::SyncOfflineCacheRes>, ApiError> {
    let report = state.services.narratives.sync_offline(&user).await?;
    Ok(Json(report.into()))
}
