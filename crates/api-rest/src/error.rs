use api_shared::auth::AuthError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ezn_core::NarrativeError;

/// Error returned by REST handlers.
///
/// The body is the user-facing message; the status follows the error kind.
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    Core(NarrativeError),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<NarrativeError> for ApiError {
    fn from(err: NarrativeError) -> Self {
        ApiError::Core(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Core(err) => match err {
                NarrativeError::Validation(_) => StatusCode::BAD_REQUEST,
                NarrativeError::Unauthorized => StatusCode::UNAUTHORIZED,
                NarrativeError::NotFound(_) => StatusCode::NOT_FOUND,
                NarrativeError::Backend { .. }
                | NarrativeError::LlmAuth
                | NarrativeError::LlmApi { .. }
                | NarrativeError::LlmInvalidResponse(_)
                | NarrativeError::Http(_) => StatusCode::BAD_GATEWAY,
                NarrativeError::Config(_)
                | NarrativeError::Io(_)
                | NarrativeError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Auth(err) => err.to_string(),
            ApiError::Core(err) => err.user_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {:?}", self);
        } else {
            tracing::debug!("request rejected: {:?}", self);
        }
        (status, self.message()).into_response()
    }
}
