//! Caller authentication helpers shared by the REST and gRPC front ends.
//!
//! Two credentials are in play:
//! - the service API key (`x-api-key`), checked for gRPC callers;
//! - the Supabase access token (`Authorization: Bearer ...`), which identifies the user and is
//!   forwarded to Supabase so row-level security applies.

/// Errors raised while checking caller credentials.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing x-api-key header")]
    MissingApiKey,
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("Missing authorization header")]
    MissingBearer,
    #[error("Authorization header must use the Bearer scheme")]
    MalformedBearer,
}

impl From<AuthError> for tonic::Status {
    fn from(err: AuthError) -> Self {
        tonic::Status::unauthenticated(err.to_string())
    }
}

/// Validates the provided API key against the key resolved at startup.
///
/// Returns `Ok(())` if the key is valid, or an error if missing or invalid.
pub fn validate_api_key(provided_key: Option<&str>, expected_key: &str) -> Result<(), AuthError> {
    let provided_key = provided_key.ok_or(AuthError::MissingApiKey)?;

    if !expected_key.is_empty() && provided_key == expected_key {
        Ok(())
    } else {
        Err(AuthError::InvalidApiKey)
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively; the token must be non-empty.
pub fn bearer_token(header_value: Option<&str>) -> Result<&str, AuthError> {
    let value = header_value.ok_or(AuthError::MissingBearer)?.trim();
    let (scheme, token) = value
        .split_once(' ')
        .ok_or(AuthError::MalformedBearer)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedBearer);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedBearer);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_api_key_accepts_matching_key() {
        assert_eq!(validate_api_key(Some("secret"), "secret"), Ok(()));
    }

    #[test]
    fn test_validate_api_key_rejects_missing_and_wrong_keys() {
        assert_eq!(
            validate_api_key(None, "secret"),
            Err(AuthError::MissingApiKey)
        );
        assert_eq!(
            validate_api_key(Some("nope"), "secret"),
            Err(AuthError::InvalidApiKey)
        );
    }

    #[test]
    fn test_validate_api_key_rejects_everything_when_unconfigured() {
        assert_eq!(validate_api_key(Some(""), ""), Err(AuthError::InvalidApiKey));
    }

    #[test]
    fn test_bearer_token_parses_scheme_case_insensitively() {
        assert_eq!(bearer_token(Some("Bearer abc.def")), Ok("abc.def"));
        assert_eq!(bearer_token(Some("bearer   abc")), Ok("abc"));
    }

    #[test]
    fn test_bearer_token_rejects_bad_headers() {
        assert_eq!(bearer_token(None), Err(AuthError::MissingBearer));
        assert_eq!(bearer_token(Some("Basic abc")), Err(AuthError::MalformedBearer));
        assert_eq!(bearer_token(Some("Bearer")), Err(AuthError::MalformedBearer));
        assert_eq!(bearer_token(Some("Bearer   ")), Err(AuthError::MalformedBearer));
    }
}
