use crate::error::ApiError;
use crate::AppState;
use api_shared::auth::bearer_token;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use ezn_core::UserContext;

/// The caller identified by the `Authorization: Bearer` access token.
pub struct Authenticated(pub UserContext);

#[axum::async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = bearer_token(header)?;
        let user = state.services.accounts.authenticate(token).await?;
        Ok(Authenticated(user))
    }
}
