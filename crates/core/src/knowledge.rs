//! Knowledge-base sources, per-user source preferences and protocol search.

use crate::constants::DEFAULT_TOP_K;
use crate::llm::CompletionClient;
use crate::repositories::deserialize_id;
use crate::repositories::KnowledgeStore;
use crate::user::UserContext;
use crate::{pb, NarrativeError, NarrativeResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSource {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub is_enabled: bool,
}

/// Which sources a user searches during EMS narrative generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KbPreferences {
    pub selected_sources: Vec<String>,
    pub use_web_search: bool,
}

/// A knowledge-base chunk returned by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolSnippet {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_id")]
    pub content_id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolAnswer {
    pub question: String,
    pub snippets: Vec<ProtocolSnippet>,
    pub formatted: String,
}

/// Render snippets as a numbered list: `[1] Title (91% match):\ncontent\n`.
pub fn format_snippets(snippets: &[ProtocolSnippet]) -> String {
    if snippets.is_empty() {
        return "No relevant protocol information found.".to_string();
    }

    snippets
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let title = s
                .title
                .as_deref()
                .filter(|t| !t.is_empty())
                .unwrap_or("Protocol");
            let similarity = (s.similarity * 100.0).round() as i64;
            format!("[{}] {} ({}% match):\n{}\n", i + 1, title, similarity, s.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Clone)]
pub struct KnowledgeService {
    store: Arc<dyn KnowledgeStore>,
    llm: Arc<dyn CompletionClient>,
}

impl KnowledgeService {
    pub fn new(store: Arc<dyn KnowledgeStore>, llm: Arc<dyn CompletionClient>) -> Self {
        Self { store, llm }
    }

    pub async fn sources(&self, user: &UserContext) -> NarrativeResult<Vec<KnowledgeSource>> {
        self.store.enabled_sources(user).await
    }

    /// Saved preferences, or the empty default when the user never saved any.
    pub async fn preferences(&self, user: &UserContext) -> NarrativeResult<KbPreferences> {
        Ok(self.store.preferences(user).await?.unwrap_or_default())
    }

    pub async fn save_preferences(
        &self,
        user: &UserContext,
        preferences: KbPreferences,
    ) -> NarrativeResult<KbPreferences> {
        self.store.save_preferences(user, &preferences).await?;
        Ok(preferences)
    }

    /// Embed `query` and return the best-matching snippets from `sources`.
    pub async fn search(
        &self,
        user: &UserContext,
        query: &str,
        sources: &[String],
        limit: u32,
    ) -> NarrativeResult<Vec<ProtocolSnippet>> {
        let embedding = self.llm.embed(query).await?;
        self.store
            .match_embeddings(user, &embedding, sources, limit)
            .await
    }

    /// Answer a protocol question with formatted snippets.
    pub async fn query_protocol(
        &self,
        user: &UserContext,
        question: &str,
        sources: &[String],
        top_k: Option<u32>,
    ) -> NarrativeResult<ProtocolAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(NarrativeError::validation("Question is required"));
        }
        if sources.is_empty() {
            return Err(NarrativeError::validation(
                "At least one source must be selected",
            ));
        }

        let top_k = top_k.filter(|k| *k > 0).unwrap_or(DEFAULT_TOP_K);
        let snippets = self.search(user, question, sources, top_k).await?;
        let formatted = format_snippets(&snippets);

        Ok(ProtocolAnswer {
            question: question.to_string(),
            snippets,
            formatted,
        })
    }
}

impl From<KnowledgeSource> for pb::KnowledgeSource {
    fn from(s: KnowledgeSource) -> Self {
        pb::KnowledgeSource {
            id: s.id,
            name: s.name,
            description: s.description.unwrap_or_default(),
            is_enabled: s.is_enabled,
        }
    }
}

impl From<KbPreferences> for pb::KbPreferences {
    fn from(p: KbPreferences) -> Self {
        pb::KbPreferences {
            selected_sources: p.selected_sources,
            use_web_search: p.use_web_search,
        }
    }
}

impl From<pb::KbPreferences> for KbPreferences {
    fn from(p: pb::KbPreferences) -> Self {
        KbPreferences {
            selected_sources: p.selected_sources,
            use_web_search: p.use_web_search,
        }
    }
}

impl From<ProtocolSnippet> for pb::ProtocolSnippet {
    fn from(s: ProtocolSnippet) -> Self {
        pb::ProtocolSnippet {
            id: s.id,
            content_id: s.content_id,
            title: s.title.unwrap_or_default(),
            content: s.content,
            source: s.source.unwrap_or_default(),
            similarity: s.similarity,
        }
    }
}

impl From<ProtocolAnswer> for pb::ProtocolQueryRes {
    fn from(a: ProtocolAnswer) -> Self {
        pb::ProtocolQueryRes {
            question: a.question,
            snippets: a.snippets.into_iter().map(Into::into).collect(),
            formatted: a.formatted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryKnowledgeStore, ScriptedCompletionClient};

    fn snippet(title: Option<&str>, content: &str, similarity: f64) -> ProtocolSnippet {
        ProtocolSnippet {
            id: "1".into(),
            content_id: String::new(),
            title: title.map(str::to_string),
            content: content.into(),
            source: Some("state".into()),
            similarity,
        }
    }

    fn service(store: Arc<InMemoryKnowledgeStore>) -> KnowledgeService {
        KnowledgeService::new(store, Arc::new(ScriptedCompletionClient::replying("")))
    }

    #[test]
    fn format_snippets_numbers_and_rounds() {
        let text = format_snippets(&[
            snippet(Some("Chest Pain"), "Aspirin 324mg.", 0.876),
            snippet(None, "Obtain 12-lead.", 0.71),
        ]);
        assert_eq!(
            text,
            "[1] Chest Pain (88% match):\nAspirin 324mg.\n\n[2] Protocol (71% match):\nObtain 12-lead.\n"
        );
    }

    #[test]
    fn format_snippets_empty() {
        assert_eq!(format_snippets(&[]), "No relevant protocol information found.");
    }

    #[tokio::test]
    async fn query_protocol_validates_inputs() {
        let svc = service(Arc::new(InMemoryKnowledgeStore::default()));
        let user = UserContext::new("u1", "jwt");

        let err = svc.query_protocol(&user, " ", &["s".into()], None).await.unwrap_err();
        assert_eq!(err.user_message(), "Question is required");

        let err = svc.query_protocol(&user, "dose?", &[], None).await.unwrap_err();
        assert_eq!(err.user_message(), "At least one source must be selected");
    }

    #[tokio::test]
    async fn query_protocol_defaults_top_k_and_formats() {
        let store = Arc::new(InMemoryKnowledgeStore::default());
        store.set_snippets(vec![snippet(Some("Stroke"), "Cincinnati scale.", 0.8)]);
        let svc = service(store.clone());
        let user = UserContext::new("u1", "jwt");

        let answer = svc
            .query_protocol(&user, "stroke scale", &["state".into()], Some(0))
            .await
            .unwrap();
        assert_eq!(answer.question, "stroke scale");
        assert_eq!(answer.snippets.len(), 1);
        assert!(answer.formatted.starts_with("[1] Stroke (80% match):"));
        assert_eq!(store.last_match_limit(), Some(5));
    }

    #[tokio::test]
    async fn preferences_default_when_never_saved() {
        let store = Arc::new(InMemoryKnowledgeStore::default());
        let svc = service(store);
        let user = UserContext::new("u1", "jwt");

        assert_eq!(svc.preferences(&user).await.unwrap(), KbPreferences::default());

        let saved = KbPreferences {
            selected_sources: vec!["state".into()],
            use_web_search: false,
        };
        svc.save_preferences(&user, saved.clone()).await.unwrap();
        assert_eq!(svc.preferences(&user).await.unwrap(), saved);
    }
}
