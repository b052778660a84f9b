//! HTTP client for the hosted Supabase project.
//!
//! Auth calls go to GoTrue under `/auth/v1`, table and RPC calls to PostgREST under
//! `/rest/v1`. Every request carries the project's anon key in `apikey` and the caller's
//! access token as the bearer credential, so row-level security applies per user.

pub mod auth;
pub mod rest;

pub use auth::{AuthSession, AuthUser};
pub use rest::TableQuery;

use crate::config::SupabaseConfig;
use crate::{NarrativeError, NarrativeResult};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(http: reqwest::Client, config: &SupabaseConfig) -> Self {
        Self {
            http,
            url: config.url().to_string(),
            anon_key: config.anon_key().to_string(),
        }
    }

    /// Build a request with the project key and bearer credential attached.
    ///
    /// Without an access token the anon key doubles as the bearer, which is how
    /// unauthenticated auth calls (sign-up, sign-in) are made.
    fn request(&self, method: Method, url: &str, access_token: Option<&str>) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token.unwrap_or(&self.anon_key))
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.url, path)
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.url, path)
    }
}

/// Turn a non-success response into a backend error carrying status and body.
async fn check_status(resp: Response) -> NarrativeResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), "supabase request failed: {body}");

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(NarrativeError::Unauthorized);
    }
    Err(NarrativeError::Backend {
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> NarrativeResult<T> {
    let resp = check_status(resp).await?;
    Ok(resp.json().await?)
}
