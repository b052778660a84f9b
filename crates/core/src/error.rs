/// Errors raised by the narrative, session, knowledge and account services.
#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    /// A form or request failed a required-field check. The message is shown to the user as-is.
    #[error("{0}")]
    Validation(String),
    #[error("not authenticated")]
    Unauthorized,
    #[error("{0} not found")]
    NotFound(String),
    #[error("backend request failed with status {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("language model rejected the API key")]
    LlmAuth,
    #[error("language model API error (status {status}): {body}")]
    LlmApi { status: u16, body: String },
    #[error("invalid response from language model: {0}")]
    LlmInvalidResponse(String),

    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to (de)serialize JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type NarrativeResult<T> = std::result::Result<T, NarrativeError>;

impl NarrativeError {
    pub fn validation(message: impl Into<String>) -> Self {
        NarrativeError::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, NarrativeError::Validation(_))
    }

    /// Transport failures and 5xx answers: the backend could not be reached, as opposed to
    /// rejecting the request.
    pub fn is_unreachable(&self) -> bool {
        match self {
            NarrativeError::Http(_) => true,
            NarrativeError::Backend { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The string shown to the user in a toast or alert.
    ///
    /// Validation messages pass through verbatim; language-model failures are prefixed the
    /// same way the generate buttons report them.
    pub fn user_message(&self) -> String {
        match self {
            NarrativeError::Validation(message) => message.clone(),
            NarrativeError::Unauthorized => "Please log in to continue.".to_string(),
            NarrativeError::NotFound(what) => format!("{what} not found."),
            NarrativeError::LlmAuth
            | NarrativeError::LlmApi { .. }
            | NarrativeError::LlmInvalidResponse(_) => {
                format!("Error generating narrative: {self}")
            }
            other => format!("Request failed: {other}"),
        }
    }
}

impl From<NarrativeError> for tonic::Status {
    fn from(err: NarrativeError) -> Self {
        let message = err.user_message();
        match err {
            NarrativeError::Validation(_) => tonic::Status::invalid_argument(message),
            NarrativeError::Unauthorized => tonic::Status::unauthenticated(message),
            NarrativeError::NotFound(_) => tonic::Status::not_found(message),
            NarrativeError::Backend { .. }
            | NarrativeError::LlmAuth
            | NarrativeError::LlmApi { .. }
            | NarrativeError::LlmInvalidResponse(_)
            | NarrativeError::Http(_) => tonic::Status::unavailable(message),
            NarrativeError::Config(_)
            | NarrativeError::Io(_)
            | NarrativeError::Serialization(_) => tonic::Status::internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_passed_through() {
        let err = NarrativeError::validation("Please enter a unit.");
        assert!(err.is_validation());
        assert_eq!(err.user_message(), "Please enter a unit.");
    }

    #[test]
    fn llm_failures_are_prefixed() {
        let err = NarrativeError::LlmApi {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(
            err.user_message(),
            "Error generating narrative: language model API error (status 500): boom"
        );
    }

    #[test]
    fn maps_to_grpc_status_codes() {
        let status: tonic::Status = NarrativeError::validation("x").into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: tonic::Status = NarrativeError::Unauthorized.into();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);

        let status: tonic::Status = NarrativeError::NotFound("Narrative".into()).into();
        assert_eq!(status.code(), tonic::Code::NotFound);
        assert_eq!(status.message(), "Narrative not found.");
    }

    #[test]
    fn only_server_errors_count_as_unreachable() {
        let down = NarrativeError::Backend {
            status: 503,
            body: String::new(),
        };
        assert!(down.is_unreachable());

        let forbidden = NarrativeError::Backend {
            status: 403,
            body: String::new(),
        };
        assert!(!forbidden.is_unreachable());
        assert!(!NarrativeError::Unauthorized.is_unreachable());
    }
}
