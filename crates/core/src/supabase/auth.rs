//! GoTrue auth endpoints.

use super::{check_status, read_json, SupabaseClient};
use crate::NarrativeResult;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A user as returned by the auth service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl AuthUser {
    pub fn full_name(&self) -> String {
        self.user_metadata
            .get("full_name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }
}

/// Tokens issued on sign-in. Tokens are empty after a sign-up that awaits email confirmation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    pub user: AuthUser,
}

impl SupabaseClient {
    /// Register a user, storing the full name in user metadata.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> NarrativeResult<AuthSession> {
        let body = json!({
            "email": email,
            "password": password,
            "data": { "full_name": full_name },
        });
        let resp = self
            .request(Method::POST, &self.auth_url("signup"), None)
            .json(&body)
            .send()
            .await?;
        let value: serde_json::Value = read_json(resp).await?;

        // With email confirmation enabled the response is the bare user, not a session.
        if value.get("user").is_some() {
            Ok(serde_json::from_value(value)?)
        } else {
            Ok(AuthSession {
                user: serde_json::from_value(value)?,
                ..AuthSession::default()
            })
        }
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> NarrativeResult<AuthSession> {
        let resp = self
            .request(
                Method::POST,
                &self.auth_url("token?grant_type=password"),
                None,
            )
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn sign_out(&self, access_token: &str) -> NarrativeResult<()> {
        let resp = self
            .request(Method::POST, &self.auth_url("logout"), Some(access_token))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    /// The user owning `access_token`.
    pub async fn get_user(&self, access_token: &str) -> NarrativeResult<AuthUser> {
        let resp = self
            .request(Method::GET, &self.auth_url("user"), Some(access_token))
            .send()
            .await?;
        read_json(resp).await
    }

    /// Update the current user, e.g. `{"password": ...}` or `{"data": {...}}`.
    pub async fn update_user(
        &self,
        access_token: &str,
        update: &serde_json::Value,
    ) -> NarrativeResult<AuthUser> {
        let resp = self
            .request(Method::PUT, &self.auth_url("user"), Some(access_token))
            .json(update)
            .send()
            .await?;
        read_json(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupabaseConfig;
    use crate::NarrativeError;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SupabaseClient {
        let config = SupabaseConfig::new(server.uri(), "anon".into()).unwrap();
        SupabaseClient::new(reqwest::Client::new(), &config)
    }

    #[tokio::test]
    async fn sign_in_posts_password_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon"))
            .and(body_json(json!({ "email": "a@b.co", "password": "pw" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "jwt",
                "refresh_token": "refresh",
                "user": { "id": "u1", "email": "a@b.co", "user_metadata": { "full_name": "Ann" } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = client(&server)
            .sign_in_with_password("a@b.co", "pw")
            .await
            .unwrap();
        assert_eq!(session.access_token, "jwt");
        assert_eq!(session.user.id, "u1");
        assert_eq!(session.user.full_name(), "Ann");
    }

    #[tokio::test]
    async fn sign_up_accepts_bare_user_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u2", "email": "new@b.co", "user_metadata": { "full_name": "New" }
            })))
            .mount(&server)
            .await;

        let session = client(&server).sign_up("new@b.co", "pw", "New").await.unwrap();
        assert_eq!(session.user.id, "u2");
        assert!(session.access_token.is_empty());
    }

    #[tokio::test]
    async fn get_user_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer user-jwt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "u1" })))
            .expect(1)
            .mount(&server)
            .await;

        let user = client(&server).get_user("user-jwt").await.unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.full_name(), "");
    }

    #[tokio::test]
    async fn expired_token_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
            .mount(&server)
            .await;

        let err = client(&server).get_user("old").await.unwrap_err();
        assert!(matches!(err, NarrativeError::Unauthorized));
    }
}
