//! PostgREST table and RPC calls.

use super::{check_status, read_json, SupabaseClient};
use crate::NarrativeResult;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

const RETURN_REPRESENTATION: &str = "return=representation";
const UPSERT_PREFERENCE: &str = "resolution=merge-duplicates,return=representation";

/// Table name plus PostgREST query parameters (`select`, filters, `order`, `limit`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    table: String,
    params: Vec<(String, String)>,
}

impl TableQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            params: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".into(), columns.into()));
        self
    }

    /// `column=eq.value`
    pub fn eq(mut self, column: &str, value: impl AsRef<str>) -> Self {
        self.params
            .push((column.into(), format!("eq.{}", value.as_ref())));
        self
    }

    /// `column=in.("a","b")`. Values are quoted so commas inside them survive.
    pub fn in_list<I, S>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let quoted: Vec<String> = values
            .into_iter()
            .map(|v| format!("\"{}\"", v.as_ref().replace('\\', "\\\\").replace('"', "\\\"")))
            .collect();
        self.params
            .push((column.into(), format!("in.({})", quoted.join(","))));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let dir = if ascending { "asc" } else { "desc" };
        self.params.push(("order".into(), format!("{column}.{dir}")));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.params.push(("limit".into(), limit.to_string()));
        self
    }
}

impl SupabaseClient {
    pub async fn select<T: DeserializeOwned>(
        &self,
        access_token: &str,
        query: &TableQuery,
    ) -> NarrativeResult<Vec<T>> {
        let resp = self
            .request(Method::GET, &self.rest_url(query.table()), Some(access_token))
            .query(query.params())
            .send()
            .await?;
        read_json(resp).await
    }

    /// Insert one row and return the stored representation.
    pub async fn insert<B, T>(&self, access_token: &str, table: &str, row: &B) -> NarrativeResult<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .request(Method::POST, &self.rest_url(table), Some(access_token))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(row)
            .send()
            .await?;
        read_json(resp).await
    }

    /// Insert or merge on `on_conflict`.
    pub async fn upsert<B, T>(
        &self,
        access_token: &str,
        table: &str,
        on_conflict: &str,
        row: &B,
    ) -> NarrativeResult<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .request(Method::POST, &self.rest_url(table), Some(access_token))
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", UPSERT_PREFERENCE)
            .json(row)
            .send()
            .await?;
        read_json(resp).await
    }

    /// Patch the rows matched by the query's filters.
    pub async fn update<B, T>(
        &self,
        access_token: &str,
        query: &TableQuery,
        patch: &B,
    ) -> NarrativeResult<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .request(Method::PATCH, &self.rest_url(query.table()), Some(access_token))
            .query(query.params())
            .header("Prefer", RETURN_REPRESENTATION)
            .json(patch)
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn delete(&self, access_token: &str, query: &TableQuery) -> NarrativeResult<()> {
        let resp = self
            .request(Method::DELETE, &self.rest_url(query.table()), Some(access_token))
            .query(query.params())
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    /// Call a Postgres function exposed at `/rest/v1/rpc/{function}`.
    pub async fn rpc<A, T>(&self, access_token: &str, function: &str, args: &A) -> NarrativeResult<T>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .request(
                Method::POST,
                &self.rest_url(&format!("rpc/{function}")),
                Some(access_token),
            )
            .json(args)
            .send()
            .await?;
        read_json(resp).await
    }

    /// Cheap reachability check: select at most one id from `table`.
    pub async fn probe(&self, access_token: &str, table: &str) -> NarrativeResult<()> {
        let query = TableQuery::new(table).select("id").limit(1);
        let resp = self
            .request(Method::GET, &self.rest_url(table), Some(access_token))
            .query(query.params())
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupabaseConfig;
    use crate::NarrativeError;
    use serde_json::{json, Value};
    use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    /// Compares the whole header value; wiremock's `header` splits values on commas.
    struct RawHeader(&'static str, &'static str);

    impl Match for RawHeader {
        fn matches(&self, request: &Request) -> bool {
            request.headers.get(self.0).and_then(|v| v.to_str().ok()) == Some(self.1)
        }
    }

    fn client(server: &MockServer) -> SupabaseClient {
        let config = SupabaseConfig::new(server.uri(), "anon".into()).unwrap();
        SupabaseClient::new(reqwest::Client::new(), &config)
    }

    #[test]
    fn query_builder_renders_postgrest_filters() {
        let q = TableQuery::new("sessions")
            .select("*")
            .eq("user_id", "u1")
            .in_list("id", ["a", "b,c", "say \"hi\""])
            .order("created_at", false)
            .limit(10);

        assert_eq!(q.table(), "sessions");
        assert_eq!(
            q.params(),
            &[
                ("select".to_string(), "*".to_string()),
                ("user_id".to_string(), "eq.u1".to_string()),
                ("id".to_string(), r#"in.("a","b,c","say \"hi\"")"#.to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn select_sends_filters_and_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/narratives"))
            .and(query_param("user_id", "eq.u1"))
            .and(query_param("order", "created_at.desc"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer jwt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
            .expect(1)
            .mount(&server)
            .await;

        let q = TableQuery::new("narratives")
            .select("*")
            .eq("user_id", "u1")
            .order("created_at", false);
        let rows: Vec<Value> = client(&server).select("jwt", &q).await.unwrap();
        assert_eq!(rows, vec![json!({ "id": 1 })]);
    }

    #[tokio::test]
    async fn insert_asks_for_representation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/sessions"))
            .and(header("prefer", "return=representation"))
            .and(body_json(json!({ "id": "session-1" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "id": "session-1" }])))
            .expect(1)
            .mount(&server)
            .await;

        let rows: Vec<Value> = client(&server)
            .insert("jwt", "sessions", &json!({ "id": "session-1" }))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn upsert_sets_conflict_target() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/user_kb_preferences"))
            .and(query_param("on_conflict", "user_id"))
            .and(header_exists("prefer"))
            .and(RawHeader(
                "prefer",
                "resolution=merge-duplicates,return=representation",
            ))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let rows: Vec<Value> = client(&server)
            .upsert("jwt", "user_kb_preferences", "user_id", &json!({ "user_id": "u1" }))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_use_filters() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/sessions"))
            .and(query_param("id", "eq.s1"))
            .and(body_json(json!({ "name": "Night shift" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/sessions"))
            .and(query_param("id", "eq.s1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let c = client(&server);
        let q = TableQuery::new("sessions").eq("id", "s1");
        let _: Vec<Value> = c
            .update("jwt", &q, &json!({ "name": "Night shift" }))
            .await
            .unwrap();
        c.delete("jwt", &q).await.unwrap();
    }

    #[tokio::test]
    async fn rpc_posts_arguments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/match_embeddings"))
            .and(body_json(json!({ "match_count": 5 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let rows: Vec<Value> = client(&server)
            .rpc("jwt", "match_embeddings", &json!({ "match_count": 5 }))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn failures_carry_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/narratives"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client(&server).probe("jwt", "narratives").await.unwrap_err();
        match err {
            NarrativeError::Backend { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
