use crate::constants::{ADMIN_ROLE, USER_ROLES_TABLE};
use crate::supabase::{AuthSession, AuthUser, SupabaseClient, TableQuery};
use crate::user::UserContext;
use crate::NarrativeResult;
use async_trait::async_trait;
use serde::Deserialize;

/// Identity operations owned by the hosted auth provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, full_name: &str)
        -> NarrativeResult<AuthSession>;
    async fn sign_in(&self, email: &str, password: &str) -> NarrativeResult<AuthSession>;
    async fn sign_out(&self, access_token: &str) -> NarrativeResult<()>;
    async fn user(&self, access_token: &str) -> NarrativeResult<AuthUser>;
    async fn update_user(
        &self,
        access_token: &str,
        update: &serde_json::Value,
    ) -> NarrativeResult<AuthUser>;
    /// True when `user_roles` grants the user the admin role.
    async fn is_admin(&self, user: &UserContext) -> NarrativeResult<bool>;
}

pub struct SupabaseAuthProvider {
    client: SupabaseClient,
}

impl SupabaseAuthProvider {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct RoleRow {
    role: Option<String>,
}

#[async_trait]
impl AuthProvider for SupabaseAuthProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> NarrativeResult<AuthSession> {
        self.client.sign_up(email, password, full_name).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> NarrativeResult<AuthSession> {
        self.client.sign_in_with_password(email, password).await
    }

    async fn sign_out(&self, access_token: &str) -> NarrativeResult<()> {
        self.client.sign_out(access_token).await
    }

    async fn user(&self, access_token: &str) -> NarrativeResult<AuthUser> {
        self.client.get_user(access_token).await
    }

    async fn update_user(
        &self,
        access_token: &str,
        update: &serde_json::Value,
    ) -> NarrativeResult<AuthUser> {
        self.client.update_user(access_token, update).await
    }

    async fn is_admin(&self, user: &UserContext) -> NarrativeResult<bool> {
        let query = TableQuery::new(USER_ROLES_TABLE)
            .select("role")
            .eq("user_id", user.user_id());
        let rows: Vec<RoleRow> = self.client.select(user.access_token(), &query).await?;
        Ok(rows
            .iter()
            .any(|row| row.role.as_deref() == Some(ADMIN_ROLE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupabaseConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn provider_with_roles(roles: serde_json::Value) -> (MockServer, SupabaseAuthProvider) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/user_roles"))
            .and(query_param("user_id", "eq.u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(roles))
            .mount(&server)
            .await;
        let config = SupabaseConfig::new(server.uri(), "anon".into()).unwrap();
        let provider =
            SupabaseAuthProvider::new(SupabaseClient::new(reqwest::Client::new(), &config));
        (server, provider)
    }

    #[tokio::test]
    async fn admin_role_is_detected() {
        let (_server, provider) = provider_with_roles(json!([{ "role": "admin" }])).await;
        let user = UserContext::new("u1", "jwt");
        assert!(provider.is_admin(&user).await.unwrap());
    }

    #[tokio::test]
    async fn other_roles_are_not_admin() {
        let (_server, provider) =
            provider_with_roles(json!([{ "role": "medic" }, { "role": null }])).await;
        let user = UserContext::new("u1", "jwt");
        assert!(!provider.is_admin(&user).await.unwrap());
    }
}
