//! Form defaults, sample data and option lists.

use crate::error::ApiError;
use crate::extract::Authenticated;
use crate::AppState;
use api_shared::pb;
use axum::extract::State;
use axum::response::Json;
use ezn_core::forms::{EmsForm, FireForm};

#[utoipa::path(
    get,
    path = "/forms/ems/defaults",
    responses(
        (status = 200, description = "Blank EMS form with the user's defaults applied", body = pb::EmsForm),
        (status = 401, description = "Not authenticated")
    )
)]
#[axum::debug_handler]
pub async fn ems_defaults(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Result<Json<pb::EmsForm>, ApiError> {
    let settings = state.services.accounts.settings(&user).await?;
    Ok(Json(EmsForm::with_settings(&settings.narrative).into()))
}

#[utoipa::path(
    get,
    path = "/forms/ems/prefill",
    responses(
        (status = 200, description = "Sample chest-pain call", body = pb::EmsForm),
        (status = 401, description = "Not authenticated")
    )
)]
#[axum::debug_handler]
pub async fn ems_prefill(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Result<Json<pb::EmsForm>, ApiError> {
    let settings = state.services.accounts.settings(&user).await?;
    Ok(Json(EmsForm::prefill(&settings.narrative).into()))
}

#[utoipa::path(
    get,
    path = "/forms/ems/options",
    responses((status = 200, description = "Choices for the EMS form's select fields", body = pb::EmsFormOptions))
)]
pub async fn ems_options() -> Json<pb::EmsFormOptions> {
    Json(EmsForm::options())
}

#[utoipa::path(
    get,
    path = "/forms/fire/prefill",
    responses(
        (status = 200, description = "Sample structure fire", body = pb::FireForm),
        (status = 401, description = "Not authenticated")
    )
)]
#[axum::debug_handler]
pub async fn fire_prefill(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Result<Json<pb::FireForm>, ApiError> {
    let settings = state.services.accounts.settings(&user).await?;
    Ok(Json(FireForm::prefill(&settings.narrative).into()))
}

#[utoipa::path(
    get,
    path = "/forms/fire/options",
    responses((status = 200, description = "NFIRS emergency types", body = pb::FireFormOptions))
)]
pub async fn fire_options() -> Json<pb::FireFormOptions> {
    Json(FireForm::options())
}
