//! Sign-up, login, logout, current user, password and settings endpoints.

use crate::error::ApiError;
use crate::extract::Authenticated;
use crate::AppState;
use api_shared::pb;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = pb::SignUpReq,
    responses(
        (status = 201, description = "Account created", body = pb::AuthRes),
        (status = 400, description = "Missing fields or passwords differ"),
        (status = 502, description = "Auth provider error")
    )
)]
/// Register a new account.
#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<pb::SignUpReq>,
) -> Result<(StatusCode, Json<pb::AuthRes>), ApiError> {
    let signed_in = state.services.accounts.sign_up(&req).await?;
    Ok((StatusCode::CREATED, Json(signed_in.into())))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = pb::LoginReq,
    responses(
        (status = 200, description = "Signed in", body = pb::AuthRes),
        (status = 400, description = "Missing or invalid credentials")
    )
)]
/// Sign in with email and password.
///
/// The returned access token is the bearer credential for every other endpoint.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<pb::LoginReq>,
) -> Result<Json<pb::AuthRes>, ApiError> {
    let signed_in = state.services.accounts.login(&req).await?;
    Ok(Json(signed_in.into()))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Signed out", body = pb::SuccessRes),
        (status = 401, description = "Not authenticated")
    )
)]
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Result<Json<pb::SuccessRes>, ApiError> {
    state.services.accounts.logout(&user).await?;
    Ok(Json(pb::SuccessRes { success: true }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = pb::User),
        (status = 401, description = "Not authenticated")
    )
)]
/// The signed-in user, including whether they hold the admin role.
#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Result<Json<pb::User>, ApiError> {
    let account = state.services.accounts.current_user(&user).await?;
    Ok(Json(account.into()))
}

#[utoipa::path(
    put,
    path = "/auth/password",
    request_body = pb::UpdatePasswordReq,
    responses(
        (status = 200, description = "Password changed", body = pb::SuccessRes),
        (status = 400, description = "Validation failed or current password wrong"),
        (status = 401, description = "Not authenticated")
    )
)]
#[axum::debug_handler]
pub async fn update_password(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Json(req): Json<pb::UpdatePasswordReq>,
) -> Result<Json<pb::SuccessRes>, ApiError> {
    state.services.accounts.update_password(&user, &req).await?;
    Ok(Json(pb::SuccessRes { success: true }))
}

#[utoipa::path(
    get,
    path = "/settings",
    responses(
        (status = 200, description = "Saved settings with defaults filled in", body = pb::UserSettings),
        (status = 401, description = "Not authenticated")
    )
)]
#[axum::debug_handler]
pub async fn get_settings(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Result<Json<pb::UserSettings>, ApiError> {
    let settings = state.services.accounts.settings(&user).await?;
    Ok(Json(settings.into()))
}

#[utoipa::path(
    put,
    path = "/settings",
    request_body = pb::UserSettings,
    responses(
        (status = 200, description = "Settings after the merge", body = pb::UserSettings),
        (status = 401, description = "Not authenticated")
    )
)]
/// Merge the provided fields into the saved settings. Omitted fields keep their value.
#[axum::debug_handler]
pub async fn update_settings(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Json(patch): Json<pb::UserSettings>,
) -> Result<Json<pb::UserSettings>, ApiError> {
    let settings = state.services.accounts.update_settings(&user, &patch).await?;
    Ok(Json(settings.into()))
}
