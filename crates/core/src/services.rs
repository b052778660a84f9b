//! Wiring of the services shared by the REST, gRPC and CLI front ends.

use crate::account::AccountService;
use crate::chat::ChatService;
use crate::config::CoreConfig;
use crate::knowledge::KnowledgeService;
use crate::llm::{CompletionClient, OpenAiCompatibleClient};
use crate::narrative::NarrativeService;
use crate::offline::OfflineCache;
use crate::repositories::{
    AuthProvider, KnowledgeStore, NarrativeStore, SessionStore, SupabaseAuthProvider,
    SupabaseKnowledgeStore, SupabaseNarrativeStore, SupabaseSessionStore,
};
use crate::session::SessionService;
use crate::supabase::SupabaseClient;
use crate::NarrativeResult;
use std::sync::Arc;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// The storage and model backends a [`Services`] is built from.
#[derive(Clone)]
pub struct Backends {
    pub auth: Arc<dyn AuthProvider>,
    pub narratives: Arc<dyn NarrativeStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub knowledge: Arc<dyn KnowledgeStore>,
    pub llm: Arc<dyn CompletionClient>,
    pub cache: OfflineCache,
}

#[derive(Clone)]
pub struct Services {
    pub accounts: AccountService,
    pub narratives: NarrativeService,
    pub sessions: SessionService,
    pub chat: ChatService,
    pub knowledge: KnowledgeService,
}

impl Services {
    pub fn new(backends: Backends) -> Self {
        let sessions = SessionService::new(backends.sessions);
        let knowledge = KnowledgeService::new(backends.knowledge, backends.llm.clone());
        let narratives = NarrativeService::new(
            backends.narratives,
            sessions.clone(),
            knowledge.clone(),
            backends.llm.clone(),
            backends.cache,
        );
        Self {
            accounts: AccountService::new(backends.auth),
            chat: ChatService::new(sessions.clone(), backends.llm),
            narratives,
            sessions,
            knowledge,
        }
    }

    /// Supabase-backed stores and the configured completion API.
    ///
    /// One HTTP client is built per external service.
    pub fn from_config(config: &CoreConfig) -> NarrativeResult<Self> {
        let supabase_http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let llm_http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        let supabase = SupabaseClient::new(supabase_http, config.supabase());
        let llm = OpenAiCompatibleClient::new(llm_http, config.llm());
        tracing::info!(
            provider = ?config.llm().provider(),
            model = %llm.chat_model(),
            cache_dir = %config.cache_dir().display(),
            "narrative services configured"
        );

        Ok(Self::new(Backends {
            auth: Arc::new(SupabaseAuthProvider::new(supabase.clone())),
            narratives: Arc::new(SupabaseNarrativeStore::new(supabase.clone())),
            sessions: Arc::new(SupabaseSessionStore::new(supabase.clone())),
            knowledge: Arc::new(SupabaseKnowledgeStore::new(supabase)),
            llm: Arc::new(llm),
            cache: OfflineCache::new(config.cache_dir()),
        }))
    }
}
