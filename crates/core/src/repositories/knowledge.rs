use crate::constants::{
    KB_PREFERENCES_TABLE, KB_SOURCES_TABLE, MATCH_EMBEDDINGS_RPC, MATCH_THRESHOLD,
};
use crate::knowledge::{KbPreferences, KnowledgeSource, ProtocolSnippet};
use crate::supabase::{SupabaseClient, TableQuery};
use crate::user::UserContext;
use crate::NarrativeResult;
use async_trait::async_trait;
use serde_json::json;

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn enabled_sources(&self, user: &UserContext) -> NarrativeResult<Vec<KnowledgeSource>>;
    async fn preferences(&self, user: &UserContext) -> NarrativeResult<Option<KbPreferences>>;
    async fn save_preferences(
        &self,
        user: &UserContext,
        preferences: &KbPreferences,
    ) -> NarrativeResult<()>;
    /// Snippets above the similarity threshold, best match first.
    async fn match_embeddings(
        &self,
        user: &UserContext,
        embedding: &[f32],
        sources: &[String],
        limit: u32,
    ) -> NarrativeResult<Vec<ProtocolSnippet>>;
}

pub struct SupabaseKnowledgeStore {
    client: SupabaseClient,
}

impl SupabaseKnowledgeStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KnowledgeStore for SupabaseKnowledgeStore {
    async fn enabled_sources(&self, user: &UserContext) -> NarrativeResult<Vec<KnowledgeSource>> {
        let query = TableQuery::new(KB_SOURCES_TABLE)
            .select("*")
            .eq("is_enabled", "true")
            .order("name", true);
        self.client.select(user.access_token(), &query).await
    }

    async fn preferences(&self, user: &UserContext) -> NarrativeResult<Option<KbPreferences>> {
        let query = TableQuery::new(KB_PREFERENCES_TABLE)
            .select("selected_sources,use_web_search")
            .eq("user_id", user.user_id())
            .limit(1);
        let rows: Vec<KbPreferences> = self.client.select(user.access_token(), &query).await?;
        Ok(rows.into_iter().next())
    }

    async fn save_preferences(
        &self,
        user: &UserContext,
        preferences: &KbPreferences,
    ) -> NarrativeResult<()> {
        let row = json!({
            "user_id": user.user_id(),
            "selected_sources": preferences.selected_sources,
            "use_web_search": preferences.use_web_search,
            "updated_at": chrono::Utc::now().to_rfc3339(),
        });
        let _: Vec<serde_json::Value> = self
            .client
            .upsert(user.access_token(), KB_PREFERENCES_TABLE, "user_id", &row)
            .await?;
        Ok(())
    }

    async fn match_embeddings(
        &self,
        user: &UserContext,
        embedding: &[f32],
        sources: &[String],
        limit: u32,
    ) -> NarrativeResult<Vec<ProtocolSnippet>> {
        let args = json!({
            "query_embedding": embedding,
            "match_threshold": MATCH_THRESHOLD,
            "match_count": limit,
            "source_filter": sources,
        });
        self.client
            .rpc(user.access_token(), MATCH_EMBEDDINGS_RPC, &args)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupabaseConfig;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> SupabaseKnowledgeStore {
        let config = SupabaseConfig::new(server.uri(), "anon".into()).unwrap();
        SupabaseKnowledgeStore::new(SupabaseClient::new(reqwest::Client::new(), &config))
    }

    #[tokio::test]
    async fn match_embeddings_passes_threshold_and_sources() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/match_embeddings"))
            .and(body_partial_json(json!({
                "match_threshold": 0.7,
                "match_count": 3,
                "source_filter": ["nremt"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 9,
                "content_id": "c9",
                "title": "Chest Pain",
                "content": "Give aspirin.",
                "source": "nremt",
                "similarity": 0.91
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let user = UserContext::new("u1", "jwt");
        let snippets = store(&server)
            .match_embeddings(&user, &[0.1, 0.2], &["nremt".to_string()], 3)
            .await
            .unwrap();
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].id, "9");
        assert_eq!(snippets[0].title.as_deref(), Some("Chest Pain"));
    }

    #[tokio::test]
    async fn enabled_sources_filters_on_flag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/knowledge_base_sources"))
            .and(query_param("is_enabled", "eq.true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": "s1", "name": "State protocols", "description": null, "is_enabled": true
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let user = UserContext::new("u1", "jwt");
        let sources = store(&server).enabled_sources(&user).await.unwrap();
        assert_eq!(sources[0].name, "State protocols");
        assert_eq!(sources[0].description, None);
    }
}
