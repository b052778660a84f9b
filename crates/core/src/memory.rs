//! In-memory stand-ins for the remote stores and the completion API.
//!
//! Enabled for unit tests and, through the `test-util` feature, for the API crates' tests.

use crate::knowledge::{KbPreferences, KnowledgeSource, ProtocolSnippet};
use crate::llm::CompletionClient;
use crate::prompt::CompletionRequest;
use crate::repositories::narratives::{NarrativeRecord, NewNarrative};
use crate::repositories::{AuthProvider, KnowledgeStore, NarrativeStore, SessionStore};
use crate::session::{SessionRecord, StoredMessage};
use crate::supabase::{AuthSession, AuthUser};
use crate::user::UserContext;
use crate::{NarrativeError, NarrativeResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn offline_error() -> NarrativeError {
    NarrativeError::Backend {
        status: 503,
        body: "offline".into(),
    }
}

/// Narratives kept in insertion order. `set_online(false)` makes every call fail.
pub struct InMemoryNarrativeStore {
    rows: Mutex<Vec<NarrativeRecord>>,
    online: AtomicBool,
    probe_status: Mutex<Option<u16>>,
    next_id: Mutex<u64>,
}

impl Default for InMemoryNarrativeStore {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            online: AtomicBool::new(true),
            probe_status: Mutex::new(None),
            next_id: Mutex::new(1),
        }
    }
}

impl InMemoryNarrativeStore {
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Make `probe` answer with this HTTP status, e.g. 403 for an expired session.
    pub fn reject_probe(&self, status: u16) {
        *lock(&self.probe_status) = Some(status);
    }

    pub fn rows(&self) -> Vec<NarrativeRecord> {
        lock(&self.rows).clone()
    }

    fn check_online(&self) -> NarrativeResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(offline_error())
        }
    }
}

#[async_trait]
impl NarrativeStore for InMemoryNarrativeStore {
    async fn probe(&self, _user: &UserContext) -> NarrativeResult<()> {
        self.check_online()?;
        match *lock(&self.probe_status) {
            Some(status) => Err(NarrativeError::Backend {
                status,
                body: "rejected".into(),
            }),
            None => Ok(()),
        }
    }

    async fn insert(
        &self,
        _user: &UserContext,
        narrative: &NewNarrative,
    ) -> NarrativeResult<NarrativeRecord> {
        self.check_online()?;
        let id = {
            let mut next = lock(&self.next_id);
            let id = *next;
            *next += 1;
            id
        };
        let record = NarrativeRecord::from_new(id.to_string(), narrative.clone());
        lock(&self.rows).push(record.clone());
        Ok(record)
    }

    async fn list(&self, user: &UserContext) -> NarrativeResult<Vec<NarrativeRecord>> {
        self.check_online()?;
        let mut rows: Vec<_> = lock(&self.rows)
            .iter()
            .filter(|r| r.user_id == user.user_id())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn get(&self, user: &UserContext, id: &str) -> NarrativeResult<Option<NarrativeRecord>> {
        self.check_online()?;
        Ok(lock(&self.rows)
            .iter()
            .find(|r| r.id == id && r.user_id == user.user_id())
            .cloned())
    }

    async fn delete(&self, user: &UserContext, id: &str) -> NarrativeResult<()> {
        self.check_online()?;
        lock(&self.rows).retain(|r| !(r.id == id && r.user_id == user.user_id()));
        Ok(())
    }
}

/// Sessions kept in insertion order, which is the order `list` returns.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<Vec<SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn seed(&self, session: SessionRecord) {
        lock(&self.sessions).push(session);
    }

    pub fn get(&self, id: &str) -> Option<SessionRecord> {
        lock(&self.sessions).iter().find(|s| s.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn list(&self, user: &UserContext) -> NarrativeResult<Vec<SessionRecord>> {
        Ok(lock(&self.sessions)
            .iter()
            .filter(|s| s.user_id == user.user_id())
            .cloned()
            .collect())
    }

    async fn insert(&self, _user: &UserContext, session: &SessionRecord) -> NarrativeResult<()> {
        lock(&self.sessions).push(session.clone());
        Ok(())
    }

    async fn rename(
        &self,
        user: &UserContext,
        session_id: &str,
        name: &str,
    ) -> NarrativeResult<()> {
        let mut sessions = lock(&self.sessions);
        let session = sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.user_id == user.user_id())
            .ok_or_else(|| NarrativeError::NotFound("Session".into()))?;
        session.name = name.to_string();
        Ok(())
    }

    async fn delete(&self, user: &UserContext, session_id: &str) -> NarrativeResult<()> {
        lock(&self.sessions).retain(|s| !(s.id == session_id && s.user_id == user.user_id()));
        Ok(())
    }

    async fn messages(
        &self,
        user: &UserContext,
        session_id: &str,
    ) -> NarrativeResult<Option<Vec<StoredMessage>>> {
        Ok(lock(&self.sessions)
            .iter()
            .find(|s| s.id == session_id && s.user_id == user.user_id())
            .map(|s| s.messages.clone()))
    }

    async fn set_messages(
        &self,
        user: &UserContext,
        session_id: &str,
        messages: &[StoredMessage],
    ) -> NarrativeResult<()> {
        let mut sessions = lock(&self.sessions);
        if let Some(s) = sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.user_id == user.user_id())
        {
            s.messages = messages.to_vec();
        }
        Ok(())
    }
}

/// Knowledge base with fixed sources and snippets; `match_embeddings` ignores the vector.
#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    sources: Mutex<Vec<KnowledgeSource>>,
    snippets: Mutex<Vec<ProtocolSnippet>>,
    preferences: Mutex<HashMap<String, KbPreferences>>,
    last_limit: Mutex<Option<u32>>,
    fail_search: AtomicBool,
}

impl InMemoryKnowledgeStore {
    pub fn set_sources(&self, sources: Vec<KnowledgeSource>) {
        *lock(&self.sources) = sources;
    }

    pub fn set_snippets(&self, snippets: Vec<ProtocolSnippet>) {
        *lock(&self.snippets) = snippets;
    }

    pub fn fail_search(&self, fail: bool) {
        self.fail_search.store(fail, Ordering::SeqCst);
    }

    /// The `limit` of the most recent search.
    pub fn last_match_limit(&self) -> Option<u32> {
        *lock(&self.last_limit)
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn enabled_sources(&self, _user: &UserContext) -> NarrativeResult<Vec<KnowledgeSource>> {
        Ok(lock(&self.sources)
            .iter()
            .filter(|s| s.is_enabled)
            .cloned()
            .collect())
    }

    async fn preferences(&self, user: &UserContext) -> NarrativeResult<Option<KbPreferences>> {
        Ok(lock(&self.preferences).get(user.user_id()).cloned())
    }

    async fn save_preferences(
        &self,
        user: &UserContext,
        preferences: &KbPreferences,
    ) -> NarrativeResult<()> {
        lock(&self.preferences).insert(user.user_id().to_string(), preferences.clone());
        Ok(())
    }

    async fn match_embeddings(
        &self,
        _user: &UserContext,
        _embedding: &[f32],
        sources: &[String],
        limit: u32,
    ) -> NarrativeResult<Vec<ProtocolSnippet>> {
        *lock(&self.last_limit) = Some(limit);
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(offline_error());
        }
        Ok(lock(&self.snippets)
            .iter()
            .filter(|s| match &s.source {
                Some(source) => sources.contains(source),
                None => true,
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

struct StoredUser {
    user: AuthUser,
    password: String,
    admin: bool,
}

/// Users keyed by access token. Tokens are fixed per user: `token-{id}`.
#[derive(Default)]
pub struct InMemoryAuthProvider {
    users: Mutex<Vec<StoredUser>>,
    unreachable: AtomicBool,
}

impl InMemoryAuthProvider {
    /// Register a user and return their access token.
    pub fn add_user(
        &self,
        id: &str,
        email: &str,
        password: &str,
        full_name: &str,
        admin: bool,
    ) -> String {
        lock(&self.users).push(StoredUser {
            user: AuthUser {
                id: id.to_string(),
                email: Some(email.to_string()),
                user_metadata: json!({ "full_name": full_name }),
            },
            password: password.to_string(),
            admin,
        });
        token_for(id)
    }

    /// While offline every call fails with a 503, like an unreachable auth server.
    pub fn set_online(&self, online: bool) {
        self.unreachable.store(!online, Ordering::SeqCst);
    }

    fn check_online(&self) -> NarrativeResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(offline_error())
        } else {
            Ok(())
        }
    }
}

fn token_for(id: &str) -> String {
    format!("token-{id}")
}

fn session_for(user: &AuthUser) -> AuthSession {
    AuthSession {
        access_token: token_for(&user.id),
        refresh_token: format!("refresh-{}", user.id),
        user: user.clone(),
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> NarrativeResult<AuthSession> {
        self.check_online()?;
        let mut users = lock(&self.users);
        if users.iter().any(|u| u.user.email.as_deref() == Some(email)) {
            return Err(NarrativeError::Backend {
                status: 422,
                body: "User already registered".into(),
            });
        }
        let user = AuthUser {
            id: uuid::Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
            user_metadata: json!({ "full_name": full_name }),
        };
        let session = session_for(&user);
        users.push(StoredUser {
            user,
            password: password.to_string(),
            admin: false,
        });
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> NarrativeResult<AuthSession> {
        self.check_online()?;
        lock(&self.users)
            .iter()
            .find(|u| u.user.email.as_deref() == Some(email) && u.password == password)
            .map(|u| session_for(&u.user))
            .ok_or(NarrativeError::Backend {
                status: 400,
                body: "Invalid login credentials".into(),
            })
    }

    async fn sign_out(&self, access_token: &str) -> NarrativeResult<()> {
        self.check_online()?;
        self.user(access_token).await.map(|_| ())
    }

    async fn user(&self, access_token: &str) -> NarrativeResult<AuthUser> {
        self.check_online()?;
        lock(&self.users)
            .iter()
            .find(|u| token_for(&u.user.id) == access_token)
            .map(|u| u.user.clone())
            .ok_or(NarrativeError::Unauthorized)
    }

    async fn update_user(&self, access_token: &str, update: &Value) -> NarrativeResult<AuthUser> {
        self.check_online()?;
        let mut users = lock(&self.users);
        let stored = users
            .iter_mut()
            .find(|u| token_for(&u.user.id) == access_token)
            .ok_or(NarrativeError::Unauthorized)?;

        if let Some(password) = update.get("password").and_then(Value::as_str) {
            stored.password = password.to_string();
        }
        if let Some(Value::Object(data)) = update.get("data") {
            if !stored.user.user_metadata.is_object() {
                stored.user.user_metadata = json!({});
            }
            if let Value::Object(meta) = &mut stored.user.user_metadata {
                for (k, v) in data {
                    meta.insert(k.clone(), v.clone());
                }
            }
        }
        Ok(stored.user.clone())
    }

    async fn is_admin(&self, user: &UserContext) -> NarrativeResult<bool> {
        self.check_online()?;
        Ok(lock(&self.users)
            .iter()
            .any(|u| u.user.id == user.user_id() && u.admin))
    }
}

/// Completion client that returns a fixed reply and records what it was asked.
pub struct ScriptedCompletionClient {
    reply: Result<String, u16>,
    requests: Mutex<Vec<CompletionRequest>>,
    embeddings: Mutex<Vec<String>>,
}

impl ScriptedCompletionClient {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            requests: Mutex::new(Vec::new()),
            embeddings: Mutex::new(Vec::new()),
        }
    }

    /// Every completion fails with an API error of `status`.
    pub fn failing(status: u16) -> Self {
        Self {
            reply: Err(status),
            requests: Mutex::new(Vec::new()),
            embeddings: Mutex::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        lock(&self.requests).last().cloned()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Texts passed to `embed`, in call order.
    pub fn embedded_texts(&self) -> Vec<String> {
        lock(&self.embeddings).clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> NarrativeResult<String> {
        lock(&self.requests).push(request.clone());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(401) => Err(NarrativeError::LlmAuth),
            Err(status) => Err(NarrativeError::LlmApi {
                status: *status,
                body: "scripted failure".into(),
            }),
        }
    }

    async fn embed(&self, text: &str) -> NarrativeResult<Vec<f32>> {
        lock(&self.embeddings).push(text.to_string());
        Ok(vec![0.0; 8])
    }
}
