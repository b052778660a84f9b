//! Sign-up, sign-in, password changes and saved settings.

use crate::constants::{MAX_REMEMBERED_TOKENS, SETTINGS_METADATA_KEY};
use crate::repositories::AuthProvider;
use crate::settings::UserSettings;
use crate::supabase::{AuthSession, AuthUser};
use crate::user::UserContext;
use crate::{pb, NarrativeError, NarrativeResult};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// The signed-in user as shown in the app header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub is_admin: bool,
}

impl From<Account> for pb::User {
    fn from(a: Account) -> Self {
        pb::User {
            id: a.id,
            email: a.email,
            full_name: a.full_name,
            is_admin: a.is_admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub account: Account,
    pub access_token: String,
    pub refresh_token: String,
}

impl From<SignedIn> for pb::AuthRes {
    fn from(s: SignedIn) -> Self {
        pb::AuthRes {
            user: Some(s.account.into()),
            access_token: s.access_token,
            refresh_token: s.refresh_token,
        }
    }
}

fn all_present(values: &[&str]) -> bool {
    values.iter().all(|v| !v.trim().is_empty())
}

pub fn validate_sign_up(req: &pb::SignUpReq) -> NarrativeResult<()> {
    if !all_present(&[&req.name, &req.email, &req.password, &req.confirm_password]) {
        return Err(NarrativeError::validation("Please fill in all fields."));
    }
    if req.password != req.confirm_password {
        return Err(NarrativeError::validation("Passwords do not match."));
    }
    Ok(())
}

pub fn validate_login(req: &pb::LoginReq) -> NarrativeResult<()> {
    if !all_present(&[&req.email, &req.password]) {
        return Err(NarrativeError::validation(
            "Please enter both email and password.",
        ));
    }
    Ok(())
}

pub fn validate_password_update(req: &pb::UpdatePasswordReq) -> NarrativeResult<()> {
    if !all_present(&[
        &req.current_password,
        &req.new_password,
        &req.confirm_new_password,
    ]) {
        return Err(NarrativeError::validation(
            "Please fill in all password fields.",
        ));
    }
    if req.new_password != req.confirm_new_password {
        return Err(NarrativeError::validation("New passwords do not match."));
    }
    Ok(())
}

#[derive(Clone)]
pub struct AccountService {
    auth: Arc<dyn AuthProvider>,
    /// Access token to user id, for tokens the auth server has accepted.
    verified: Arc<Mutex<HashMap<String, String>>>,
}

impl AccountService {
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            auth,
            verified: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolve a bearer token to the user it belongs to.
    ///
    /// When the auth server cannot be reached, a token it accepted earlier still resolves to
    /// the same user so narratives can be generated and cached offline.
    pub async fn authenticate(&self, access_token: &str) -> NarrativeResult<UserContext> {
        match self.auth.user(access_token).await {
            Ok(user) => {
                self.remember(access_token, &user.id);
                Ok(UserContext::new(user.id, access_token))
            }
            Err(e) if e.is_unreachable() => match self.remembered(access_token) {
                Some(user_id) => {
                    tracing::warn!(user_id = %user_id, "auth server unreachable, using verified token: {e}");
                    Ok(UserContext::new(user_id, access_token))
                }
                None => Err(e),
            },
            Err(e) => {
                self.forget(access_token);
                Err(e)
            }
        }
    }

    pub async fn sign_up(&self, req: &pb::SignUpReq) -> NarrativeResult<SignedIn> {
        validate_sign_up(req)?;
        let session = self
            .auth
            .sign_up(req.email.trim(), &req.password, req.name.trim())
            .await?;
        tracing::info!(user_id = %session.user.id, "signed up");
        self.remember(&session.access_token, &session.user.id);
        Ok(self.signed_in(session, false))
    }

    pub async fn login(&self, req: &pb::LoginReq) -> NarrativeResult<SignedIn> {
        validate_login(req)?;
        let session = self
            .auth
            .sign_in(req.email.trim(), &req.password)
            .await
            .map_err(|e| match e {
                NarrativeError::Backend { status: 400, .. } | NarrativeError::Unauthorized => {
                    NarrativeError::validation("Invalid email or password.")
                }
                other => other,
            })?;

        self.remember(&session.access_token, &session.user.id);
        let context = UserContext::new(session.user.id.clone(), session.access_token.clone());
        let is_admin = self.admin_flag(&context).await;
        Ok(self.signed_in(session, is_admin))
    }

    pub async fn logout(&self, user: &UserContext) -> NarrativeResult<()> {
        self.forget(user.access_token());
        self.auth.sign_out(user.access_token()).await
    }

    pub async fn current_user(&self, user: &UserContext) -> NarrativeResult<Account> {
        let auth_user = self.auth.user(user.access_token()).await?;
        let is_admin = self.admin_flag(user).await;
        Ok(account(&auth_user, is_admin))
    }

    /// Change the password after re-checking the current one.
    pub async fn update_password(
        &self,
        user: &UserContext,
        req: &pb::UpdatePasswordReq,
    ) -> NarrativeResult<()> {
        validate_password_update(req)?;

        let auth_user = self.auth.user(user.access_token()).await?;
        let email = auth_user.email.unwrap_or_default();
        self.auth
            .sign_in(&email, &req.current_password)
            .await
            .map_err(|e| match e {
                NarrativeError::Backend { status: 400, .. } | NarrativeError::Unauthorized => {
                    NarrativeError::validation("Current password is incorrect.")
                }
                other => other,
            })?;

        self.auth
            .update_user(user.access_token(), &json!({ "password": req.new_password }))
            .await?;
        tracing::info!(user_id = %user.user_id(), "password updated");
        Ok(())
    }

    pub async fn settings(&self, user: &UserContext) -> NarrativeResult<UserSettings> {
        let auth_user = self.auth.user(user.access_token()).await?;
        Ok(UserSettings::from_metadata(&auth_user.user_metadata))
    }

    /// Merge `patch` into the saved settings and store the result.
    pub async fn update_settings(
        &self,
        user: &UserContext,
        patch: &pb::UserSettings,
    ) -> NarrativeResult<UserSettings> {
        let mut settings = self.settings(user).await?;
        settings.merge(patch);

        let update = json!({ "data": { SETTINGS_METADATA_KEY: settings } });
        self.auth.update_user(user.access_token(), &update).await?;
        Ok(settings)
    }

    fn remember(&self, access_token: &str, user_id: &str) {
        let mut verified = self.verified.lock().unwrap_or_else(|p| p.into_inner());
        if verified.len() >= MAX_REMEMBERED_TOKENS && !verified.contains_key(access_token) {
            verified.clear();
        }
        verified.insert(access_token.to_string(), user_id.to_string());
    }

    fn remembered(&self, access_token: &str) -> Option<String> {
        let verified = self.verified.lock().unwrap_or_else(|p| p.into_inner());
        verified.get(access_token).cloned()
    }

    fn forget(&self, access_token: &str) {
        let mut verified = self.verified.lock().unwrap_or_else(|p| p.into_inner());
        verified.remove(access_token);
    }

    /// Admin lookups never fail a request; errors count as "not admin".
    async fn admin_flag(&self, user: &UserContext) -> bool {
        match self.auth.is_admin(user).await {
            Ok(flag) => flag,
            Err(e) => {
                tracing::warn!(user_id = %user.user_id(), "admin check failed: {e}");
                false
            }
        }
    }

    fn signed_in(&self, session: AuthSession, is_admin: bool) -> SignedIn {
        SignedIn {
            account: account(&session.user, is_admin),
            access_token: session.access_token,
            refresh_token: session.refresh_token,
        }
    }
}

fn account(user: &AuthUser, is_admin: bool) -> Account {
    Account {
        id: user.id.clone(),
        email: user.email.clone().unwrap_or_default(),
        full_name: user.full_name(),
        is_admin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryAuthProvider;

    fn sign_up_req(name: &str, pw: &str, confirm: &str) -> pb::SignUpReq {
        pb::SignUpReq {
            name: name.into(),
            email: "medic@example.com".into(),
            password: pw.into(),
            confirm_password: confirm.into(),
        }
    }

    #[test]
    fn sign_up_validation() {
        let msg = |r: pb::SignUpReq| validate_sign_up(&r).unwrap_err().user_message();
        assert_eq!(msg(sign_up_req("", "a", "a")), "Please fill in all fields.");
        assert_eq!(msg(sign_up_req("Pat", "a", "b")), "Passwords do not match.");
        assert!(validate_sign_up(&sign_up_req("Pat", "a", "a")).is_ok());
    }

    #[test]
    fn login_and_password_validation() {
        let err = validate_login(&pb::LoginReq {
            email: "x@y.z".into(),
            password: String::new(),
        })
        .unwrap_err();
        assert_eq!(err.user_message(), "Please enter both email and password.");

        let req = |c: &str, n: &str, k: &str| pb::UpdatePasswordReq {
            current_password: c.into(),
            new_password: n.into(),
            confirm_new_password: k.into(),
        };
        assert_eq!(
            validate_password_update(&req("old", "", "")).unwrap_err().user_message(),
            "Please fill in all password fields."
        );
        assert_eq!(
            validate_password_update(&req("old", "new1", "new2")).unwrap_err().user_message(),
            "New passwords do not match."
        );
    }

    #[tokio::test]
    async fn login_reports_admin_flag() {
        let auth = Arc::new(InMemoryAuthProvider::default());
        auth.add_user("u1", "boss@example.com", "pw", "Chief", true);
        let svc = AccountService::new(auth);

        let signed_in = svc
            .login(&pb::LoginReq {
                email: "boss@example.com".into(),
                password: "pw".into(),
            })
            .await
            .unwrap();
        assert!(signed_in.account.is_admin);
        assert_eq!(signed_in.account.full_name, "Chief");
        assert!(!signed_in.access_token.is_empty());
    }

    #[tokio::test]
    async fn wrong_password_is_a_user_facing_error() {
        let auth = Arc::new(InMemoryAuthProvider::default());
        auth.add_user("u1", "pat@example.com", "pw", "Pat", false);
        let svc = AccountService::new(auth);

        let err = svc
            .login(&pb::LoginReq {
                email: "pat@example.com".into(),
                password: "nope".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Invalid email or password.");
    }

    #[tokio::test]
    async fn update_password_checks_current_password() {
        let auth = Arc::new(InMemoryAuthProvider::default());
        let token = auth.add_user("u1", "pat@example.com", "pw", "Pat", false);
        let svc = AccountService::new(auth.clone());
        let user = svc.authenticate(&token).await.unwrap();

        let err = svc
            .update_password(
                &user,
                &pb::UpdatePasswordReq {
                    current_password: "wrong".into(),
                    new_password: "next".into(),
                    confirm_new_password: "next".into(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Current password is incorrect.");

        svc.update_password(
            &user,
            &pb::UpdatePasswordReq {
                current_password: "pw".into(),
                new_password: "next".into(),
                confirm_new_password: "next".into(),
            },
        )
        .await
        .unwrap();
        assert!(auth.sign_in("pat@example.com", "next").await.is_ok());
    }

    #[tokio::test]
    async fn settings_round_trip_through_metadata() {
        let auth = Arc::new(InMemoryAuthProvider::default());
        let token = auth.add_user("u1", "pat@example.com", "pw", "Pat", false);
        let svc = AccountService::new(auth);
        let user = svc.authenticate(&token).await.unwrap();

        assert_eq!(svc.settings(&user).await.unwrap(), UserSettings::default());

        svc.update_settings(
            &user,
            &pb::UserSettings {
                dark_mode: Some(true),
                narrative: Some(pb::NarrativeSettings {
                    default_unit: Some("Medic 4".into()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let stored = svc.settings(&user).await.unwrap();
        assert!(stored.dark_mode);
        assert_eq!(stored.narrative.default_unit, "Medic 4");
        assert_eq!(stored.narrative.format_type, "D.R.A.T.T.");
        assert_eq!(svc.current_user(&user).await.unwrap().full_name, "Pat");
    }

    #[tokio::test]
    async fn verified_token_resolves_while_auth_is_unreachable() {
        let auth = Arc::new(InMemoryAuthProvider::default());
        let token = auth.add_user("u1", "pat@example.com", "pw", "Pat", false);
        let svc = AccountService::new(auth.clone());
        svc.authenticate(&token).await.unwrap();

        auth.set_online(false);
        let user = svc.authenticate(&token).await.unwrap();
        assert_eq!(user.user_id(), "u1");
        assert_eq!(user.access_token(), token);

        let err = svc.authenticate("token-stranger").await.unwrap_err();
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn rejected_or_logged_out_tokens_are_not_remembered() {
        let auth = Arc::new(InMemoryAuthProvider::default());
        let token = auth.add_user("u1", "pat@example.com", "pw", "Pat", false);
        let svc = AccountService::new(auth.clone());
        let user = svc.authenticate(&token).await.unwrap();
        svc.logout(&user).await.unwrap();

        auth.set_online(false);
        assert!(svc.authenticate(&token).await.is_err());
    }

    #[tokio::test]
    async fn password_check_outage_is_not_reported_as_wrong_password() {
        use crate::config::SupabaseConfig;
        use crate::repositories::accounts::SupabaseAuthProvider;
        use crate::supabase::SupabaseClient;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u1", "email": "pat@example.com", "user_metadata": {}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = SupabaseConfig::new(server.uri(), "anon".into()).unwrap();
        let client = SupabaseClient::new(reqwest::Client::new(), &config);
        let svc = AccountService::new(Arc::new(SupabaseAuthProvider::new(client)));

        let err = svc
            .update_password(
                &UserContext::new("u1", "jwt"),
                &pb::UpdatePasswordReq {
                    current_password: "pw".into(),
                    new_password: "next".into(),
                    confirm_new_password: "next".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NarrativeError::Backend { status: 503, .. }));
        assert_ne!(err.user_message(), "Current password is incorrect.");
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let svc = AccountService::new(Arc::new(InMemoryAuthProvider::default()));
        let err = svc.authenticate("bogus").await.unwrap_err();
        assert!(matches!(err, NarrativeError::Unauthorized));
    }
}
