use super::deserialize_id;
use crate::constants::NARRATIVES_TABLE;
use crate::supabase::{SupabaseClient, TableQuery};
use crate::user::UserContext;
use crate::{pb, NarrativeError, NarrativeResult};
use async_trait::async_trait;
use ezn_types::NarrativeKind;
use serde::{Deserialize, Serialize};

/// A generated narrative before it has a database id. This is also the offline cache format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNarrative {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NarrativeKind,
    pub title: String,
    pub content: String,
    pub form_data: serde_json::Value,
    pub created_at: String,
}

/// A row of the `narratives` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NarrativeKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub form_data: serde_json::Value,
    #[serde(default)]
    pub created_at: String,
}

impl NarrativeRecord {
    pub fn from_new(id: impl Into<String>, n: NewNarrative) -> Self {
        Self {
            id: id.into(),
            user_id: n.user_id,
            kind: n.kind,
            title: n.title,
            content: n.content,
            form_data: n.form_data,
            created_at: n.created_at,
        }
    }
}

impl From<NarrativeRecord> for pb::Narrative {
    fn from(r: NarrativeRecord) -> Self {
        pb::Narrative {
            id: r.id,
            user_id: r.user_id,
            kind: r.kind.to_string(),
            title: r.title,
            content: r.content,
            form_data_json: r.form_data.to_string(),
            created_at: r.created_at,
        }
    }
}

#[async_trait]
pub trait NarrativeStore: Send + Sync {
    /// Succeeds when the narratives table is reachable for this user.
    async fn probe(&self, user: &UserContext) -> NarrativeResult<()>;
    async fn insert(&self, user: &UserContext, narrative: &NewNarrative)
        -> NarrativeResult<NarrativeRecord>;
    /// The user's narratives, newest first.
    async fn list(&self, user: &UserContext) -> NarrativeResult<Vec<NarrativeRecord>>;
    async fn get(&self, user: &UserContext, id: &str) -> NarrativeResult<Option<NarrativeRecord>>;
    async fn delete(&self, user: &UserContext, id: &str) -> NarrativeResult<()>;
}

pub struct SupabaseNarrativeStore {
    client: SupabaseClient,
}

impl SupabaseNarrativeStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NarrativeStore for SupabaseNarrativeStore {
    async fn probe(&self, user: &UserContext) -> NarrativeResult<()> {
        self.client
            .probe(user.access_token(), NARRATIVES_TABLE)
            .await
    }

    async fn insert(
        &self,
        user: &UserContext,
        narrative: &NewNarrative,
    ) -> NarrativeResult<NarrativeRecord> {
        let rows: Vec<NarrativeRecord> = self
            .client
            .insert(user.access_token(), NARRATIVES_TABLE, narrative)
            .await?;
        rows.into_iter().next().ok_or_else(|| NarrativeError::Backend {
            status: 200,
            body: "insert returned no rows".into(),
        })
    }

    async fn list(&self, user: &UserContext) -> NarrativeResult<Vec<NarrativeRecord>> {
        let query = TableQuery::new(NARRATIVES_TABLE)
            .select("*")
            .eq("user_id", user.user_id())
            .order("created_at", false);
        self.client.select(user.access_token(), &query).await
    }

    async fn get(&self, user: &UserContext, id: &str) -> NarrativeResult<Option<NarrativeRecord>> {
        let query = TableQuery::new(NARRATIVES_TABLE)
            .select("*")
            .eq("id", id)
            .eq("user_id", user.user_id())
            .limit(1);
        let rows: Vec<NarrativeRecord> = self.client.select(user.access_token(), &query).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, user: &UserContext, id: &str) -> NarrativeResult<()> {
        let query = TableQuery::new(NARRATIVES_TABLE)
            .eq("id", id)
            .eq("user_id", user.user_id());
        self.client.delete(user.access_token(), &query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupabaseConfig;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> SupabaseNarrativeStore {
        let config = SupabaseConfig::new(server.uri(), "anon".into()).unwrap();
        SupabaseNarrativeStore::new(SupabaseClient::new(reqwest::Client::new(), &config))
    }

    fn new_narrative() -> NewNarrative {
        NewNarrative {
            user_id: "u1".into(),
            kind: NarrativeKind::Fire,
            title: "Fire Narrative - Gas Leak - 2025-01-01 10:00".into(),
            content: "Engine 4 arrived...".into(),
            form_data: json!({ "unit": "Engine 4" }),
            created_at: "2025-01-01T10:00:00+00:00".into(),
        }
    }

    #[test]
    fn new_narrative_serialises_kind_as_type_column() {
        let value = serde_json::to_value(new_narrative()).unwrap();
        assert_eq!(value["type"], "fire");
        assert!(value.get("kind").is_none());
    }

    #[tokio::test]
    async fn insert_returns_stored_row_with_numeric_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/narratives"))
            .and(body_partial_json(json!({ "type": "fire", "user_id": "u1" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
                "id": 17,
                "user_id": "u1",
                "type": "fire",
                "title": "t",
                "content": "c",
                "form_data": {},
                "created_at": "2025-01-01T10:00:00+00:00"
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let user = UserContext::new("u1", "jwt");
        let record = store(&server).insert(&user, &new_narrative()).await.unwrap();
        assert_eq!(record.id, "17");
        assert_eq!(record.kind, NarrativeKind::Fire);
    }

    #[tokio::test]
    async fn get_filters_by_id_and_owner() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/narratives"))
            .and(query_param("id", "eq.n1"))
            .and(query_param("user_id", "eq.u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let user = UserContext::new("u1", "jwt");
        assert!(store(&server).get(&user, "n1").await.unwrap().is_none());
    }

    #[test]
    fn record_converts_to_pb_with_json_form_data() {
        let record = NarrativeRecord::from_new("n1", new_narrative());
        let pb: pb::Narrative = record.into();
        assert_eq!(pb.kind, "fire");
        assert_eq!(pb.form_data_json, r#"{"unit":"Engine 4"}"#);
    }
}
