//! Narrative generation, storage and the offline fallback.

use crate::constants::DEFAULT_TOP_K;
use crate::forms::{EmsForm, FireForm, NarrativeForm};
use crate::knowledge::KnowledgeService;
use crate::llm::CompletionClient;
use crate::offline::{OfflineCache, ReplayReport};
use crate::prompt::{ems_prompt, fire_prompt};
use crate::repositories::narratives::{NarrativeRecord, NewNarrative};
use crate::repositories::NarrativeStore;
use crate::session::{MessageRole, SessionService, StoredMessage};
use crate::user::UserContext;
use crate::{pb, NarrativeError, NarrativeResult};
use chrono::{DateTime, Local};
use ezn_types::NarrativeKind;
use std::sync::Arc;

pub const OFFLINE_MESSAGE: &str =
    "You are offline. Narrative saved locally and will be uploaded when connection is restored.";

/// What a generate call produced and where it ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedNarrative {
    pub text: String,
    pub title: String,
    /// Database id, absent when the narrative was cached locally.
    pub id: Option<String>,
    pub cached: bool,
    pub message: String,
}

impl From<GeneratedNarrative> for pb::GenerateNarrativeRes {
    fn from(g: GeneratedNarrative) -> Self {
        pb::GenerateNarrativeRes {
            narrative_text: g.text,
            title: g.title,
            narrative_id: g.id.unwrap_or_default(),
            cached_offline: g.cached,
            message: g.message,
        }
    }
}

/// Generated text plus what is stored alongside it.
struct Draft {
    kind: NarrativeKind,
    title: String,
    text: String,
    form_data: serde_json::Value,
}

fn success_message(kind: NarrativeKind) -> String {
    format!("{} narrative generated successfully", kind.label())
}

#[derive(Clone)]
pub struct NarrativeService {
    store: Arc<dyn NarrativeStore>,
    sessions: SessionService,
    knowledge: KnowledgeService,
    llm: Arc<dyn CompletionClient>,
    cache: OfflineCache,
}

impl NarrativeService {
    pub fn new(
        store: Arc<dyn NarrativeStore>,
        sessions: SessionService,
        knowledge: KnowledgeService,
        llm: Arc<dyn CompletionClient>,
        cache: OfflineCache,
    ) -> Self {
        Self {
            store,
            sessions,
            knowledge,
            llm,
            cache,
        }
    }

    pub async fn generate_ems(
        &self,
        user: &UserContext,
        form: &EmsForm,
        session_id: Option<&str>,
    ) -> NarrativeResult<GeneratedNarrative> {
        form.validate()?;
        let now = Local::now();
        let online = self.go_online(user).await?;

        let reference = self.reference_materials(user, form).await;
        let form_data = form.form_data(now.naive_local());
        let request = ems_prompt(&form_data, &form.narrative_settings(), reference.as_deref())?;
        let text = self.llm.complete(&request).await.map_err(|e| {
            tracing::error!("EMS narrative generation failed: {e}");
            e
        })?;

        let draft = Draft {
            kind: EmsForm::KIND,
            title: form.title(now.naive_local()),
            text,
            form_data,
        };
        self.finish(user, draft, session_id, online, now).await
    }

    pub async fn generate_fire(
        &self,
        user: &UserContext,
        form: &FireForm,
        session_id: Option<&str>,
    ) -> NarrativeResult<GeneratedNarrative> {
        form.validate()?;
        let now = Local::now();
        let online = self.go_online(user).await?;

        let request = fire_prompt(&form.incident_data())?;
        let text = self.llm.complete(&request).await.map_err(|e| {
            tracing::error!("fire narrative generation failed: {e}");
            e
        })?;

        let draft = Draft {
            kind: FireForm::KIND,
            title: form.title(now.naive_local()),
            text,
            form_data: form.form_data(now.naive_local()),
        };
        self.finish(user, draft, session_id, online, now).await
    }

    pub async fn list(&self, user: &UserContext) -> NarrativeResult<Vec<NarrativeRecord>> {
        self.store.list(user).await
    }

    pub async fn get(&self, user: &UserContext, id: &str) -> NarrativeResult<NarrativeRecord> {
        self.store
            .get(user, id)
            .await?
            .ok_or_else(|| NarrativeError::NotFound("Narrative".into()))
    }

    pub async fn delete(&self, user: &UserContext, id: &str) -> NarrativeResult<()> {
        self.store.delete(user, id).await?;
        tracing::info!(narrative_id = %id, "deleted narrative");
        Ok(())
    }

    /// Upload whatever is waiting in the user's offline cache.
    pub async fn sync_offline(&self, user: &UserContext) -> NarrativeResult<ReplayReport> {
        self.cache.replay(self.store.as_ref(), user).await
    }

    /// Probe the database; when reachable, flush the user's offline cache first.
    ///
    /// Only an unreachable database means offline. A probe the database rejects is an error.
    async fn go_online(&self, user: &UserContext) -> NarrativeResult<bool> {
        if let Err(e) = self.store.probe(user).await {
            if !e.is_unreachable() {
                return Err(e);
            }
            tracing::warn!(user_id = %user.user_id(), "database unreachable, working offline: {e}");
            return Ok(false);
        }

        match self.cache.replay(self.store.as_ref(), user).await {
            Ok(report) if report.uploaded > 0 || report.failed > 0 => {
                tracing::info!(
                    uploaded = report.uploaded,
                    failed = report.failed,
                    "replayed offline narratives"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("offline cache replay failed: {e}"),
        }
        Ok(true)
    }

    /// Snippets from the user's selected knowledge-base sources.
    ///
    /// `None` selects the general-knowledge prompt: no sources selected, or the lookup failed.
    async fn reference_materials(&self, user: &UserContext, form: &EmsForm) -> Option<Vec<String>> {
        let preferences = match self.knowledge.preferences(user).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("could not load knowledge-base preferences: {e}");
                return None;
            }
        };
        if preferences.selected_sources.is_empty() {
            return None;
        }

        match self
            .knowledge
            .search(
                user,
                &form.knowledge_query(),
                &preferences.selected_sources,
                DEFAULT_TOP_K,
            )
            .await
        {
            Ok(snippets) => Some(snippets.into_iter().map(|s| s.content).collect()),
            Err(e) => {
                tracing::warn!("knowledge-base search failed, using general prompt: {e}");
                None
            }
        }
    }

    /// Record the narrative in the session, then save it or cache it locally.
    async fn finish(
        &self,
        user: &UserContext,
        draft: Draft,
        session_id: Option<&str>,
        online: bool,
        now: DateTime<Local>,
    ) -> NarrativeResult<GeneratedNarrative> {
        let Draft {
            kind,
            title,
            text,
            form_data,
        } = draft;

        if let Some(session_id) = session_id.filter(|id| !id.is_empty()) {
            let message = StoredMessage::at(MessageRole::Assistant, text.clone(), now);
            if let Err(e) = self.sessions.append_message(user, session_id, message).await {
                tracing::warn!(session_id = %session_id, "could not add narrative to session: {e}");
            }
        }

        let narrative = NewNarrative {
            user_id: user.user_id().to_string(),
            kind,
            title: title.clone(),
            content: text.clone(),
            form_data,
            created_at: now.to_rfc3339(),
        };

        if online {
            match self.store.insert(user, &narrative).await {
                Ok(record) => {
                    tracing::info!(narrative_id = %record.id, %kind, "saved narrative");
                    return Ok(GeneratedNarrative {
                        text,
                        title,
                        id: Some(record.id),
                        cached: false,
                        message: success_message(kind),
                    });
                }
                Err(e) => tracing::error!("saving narrative failed, caching locally: {e}"),
            }
        }

        self.cache.store(&narrative, now.naive_local()).await?;
        Ok(GeneratedNarrative {
            text,
            title,
            id: None,
            cached: true,
            message: OFFLINE_MESSAGE.to_string(),
        })
    }
}
