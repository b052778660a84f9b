//! Chat sessions: named, per-user message histories.

use crate::constants::{MESSAGE_TIME_FORMAT, SESSION_DATE_FORMAT, SESSION_NAME_FORMAT};
use crate::repositories::SessionStore;
use crate::user::UserContext;
use crate::{pb, NarrativeError, NarrativeResult};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = NarrativeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(NarrativeError::validation(format!(
                "Unknown message role: {other}"
            ))),
        }
    }
}

/// One entry of a session's `messages` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(rename = "type")]
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
}

impl StoredMessage {
    pub fn new(role: MessageRole, content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: timestamp.into(),
        }
    }

    /// A message stamped with the clock time of `now`, e.g. `02:15 PM`.
    pub fn at(role: MessageRole, content: impl Into<String>, now: DateTime<Local>) -> Self {
        Self::new(role, content, now.format(MESSAGE_TIME_FORMAT).to_string())
    }
}

/// A row of the `sessions` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub messages: Vec<StoredMessage>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<StoredMessage>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<StoredMessage>>::deserialize(deserializer)?.unwrap_or_default())
}

impl SessionRecord {
    /// A fresh, empty session: id `session-{millis}`, name `Session {Mon DD, YYYY HH:MM AM}`.
    pub fn new_at(user_id: &str, now: DateTime<Local>) -> Self {
        Self {
            id: format!("session-{}", now.timestamp_millis()),
            name: format!("Session {}", now.format(SESSION_NAME_FORMAT)),
            date: now.format(SESSION_DATE_FORMAT).to_string(),
            user_id: user_id.to_string(),
            messages: Vec::new(),
        }
    }
}

impl From<StoredMessage> for pb::ChatMessage {
    fn from(m: StoredMessage) -> Self {
        pb::ChatMessage {
            role: m.role.to_string(),
            content: m.content,
            timestamp: m.timestamp,
        }
    }
}

impl From<SessionRecord> for pb::Session {
    fn from(s: SessionRecord) -> Self {
        pb::Session {
            id: s.id,
            name: s.name,
            date: s.date,
            messages: s.messages.into_iter().map(Into::into).collect(),
        }
    }
}

/// Result of deleting a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeleteOutcome {
    /// The session that should be active afterwards, if any.
    pub next_active_session_id: Option<String>,
    /// Set when the last session was deleted and a replacement was created.
    pub created_session: Option<SessionRecord>,
}

impl From<DeleteOutcome> for pb::DeleteSessionRes {
    fn from(o: DeleteOutcome) -> Self {
        pb::DeleteSessionRes {
            success: true,
            next_active_session_id: o.next_active_session_id.unwrap_or_default(),
            created_session: o.created_session.map(Into::into),
        }
    }
}

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
}

impl SessionService {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, user: &UserContext) -> NarrativeResult<Vec<SessionRecord>> {
        self.store.list(user).await
    }

    pub async fn create(&self, user: &UserContext) -> NarrativeResult<SessionRecord> {
        let session = SessionRecord::new_at(user.user_id(), Local::now());
        self.store.insert(user, &session).await?;
        tracing::info!(session_id = %session.id, "created session");
        Ok(session)
    }

    /// Rename a session. Blank names are ignored and `Ok(false)` is returned.
    pub async fn rename(
        &self,
        user: &UserContext,
        session_id: &str,
        name: &str,
    ) -> NarrativeResult<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(false);
        }
        self.store.rename(user, session_id, name).await?;
        Ok(true)
    }

    /// Delete a session.
    ///
    /// When the deleted session was the active one the first remaining session becomes active;
    /// when none remain a new session is created and becomes active.
    pub async fn delete(
        &self,
        user: &UserContext,
        session_id: &str,
        active_session_id: Option<&str>,
    ) -> NarrativeResult<DeleteOutcome> {
        self.store.delete(user, session_id).await?;

        let active = active_session_id.filter(|id| !id.is_empty());
        if active.is_some() && active != Some(session_id) {
            return Ok(DeleteOutcome {
                next_active_session_id: active.map(str::to_string),
                created_session: None,
            });
        }

        let remaining = self.store.list(user).await?;
        if let Some(first) = remaining.into_iter().next() {
            return Ok(DeleteOutcome {
                next_active_session_id: Some(first.id),
                created_session: None,
            });
        }

        let created = self.create(user).await?;
        Ok(DeleteOutcome {
            next_active_session_id: Some(created.id.clone()),
            created_session: Some(created),
        })
    }

    /// Append a message stamped with the current time.
    pub async fn add_message(
        &self,
        user: &UserContext,
        session_id: &str,
        role: MessageRole,
        content: &str,
    ) -> NarrativeResult<Vec<StoredMessage>> {
        if content.trim().is_empty() {
            return Err(NarrativeError::validation("Please enter a message."));
        }
        let message = StoredMessage::at(role, content, Local::now());
        self.append_message(user, session_id, message).await
    }

    /// Append a message: read the current list, append, write it back.
    ///
    /// Returns the full message list after the append.
    pub async fn append_message(
        &self,
        user: &UserContext,
        session_id: &str,
        message: StoredMessage,
    ) -> NarrativeResult<Vec<StoredMessage>> {
        let mut messages = self
            .store
            .messages(user, session_id)
            .await?
            .ok_or_else(|| NarrativeError::NotFound("Session".into()))?;
        messages.push(message);
        self.store.set_messages(user, session_id, &messages).await?;
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySessionStore;
    use chrono::TimeZone;

    fn service() -> (Arc<InMemorySessionStore>, SessionService) {
        let store = Arc::new(InMemorySessionStore::default());
        (store.clone(), SessionService::new(store))
    }

    fn user() -> UserContext {
        UserContext::new("u1", "jwt")
    }

    fn record(id: &str) -> SessionRecord {
        SessionRecord {
            id: id.into(),
            name: format!("Session {id}"),
            date: "Mar 04, 2025".into(),
            user_id: "u1".into(),
            messages: vec![],
        }
    }

    #[test]
    fn new_session_naming() {
        let now = Local.with_ymd_and_hms(2025, 3, 4, 14, 5, 0).unwrap();
        let s = SessionRecord::new_at("u1", now);
        assert_eq!(s.id, format!("session-{}", now.timestamp_millis()));
        assert_eq!(s.name, "Session Mar 04, 2025 02:05 PM");
        assert_eq!(s.date, "Mar 04, 2025");
        assert!(s.messages.is_empty());
    }

    #[test]
    fn message_timestamp_is_twelve_hour_clock() {
        let now = Local.with_ymd_and_hms(2025, 3, 4, 21, 7, 0).unwrap();
        let m = StoredMessage::at(MessageRole::User, "hi", now);
        assert_eq!(m.timestamp, "09:07 PM");
    }

    #[test]
    fn session_row_tolerates_null_messages() {
        let row: SessionRecord = serde_json::from_value(serde_json::json!({
            "id": "s1", "name": "n", "date": "d", "user_id": "u1", "messages": null
        }))
        .unwrap();
        assert!(row.messages.is_empty());
    }

    #[tokio::test]
    async fn rename_ignores_blank_names() {
        let (store, svc) = service();
        store.seed(record("s1"));

        assert!(!svc.rename(&user(), "s1", "   ").await.unwrap());
        assert_eq!(store.get("s1").unwrap().name, "Session s1");

        assert!(svc.rename(&user(), "s1", " Night shift ").await.unwrap());
        assert_eq!(store.get("s1").unwrap().name, "Night shift");
    }

    #[tokio::test]
    async fn renaming_missing_session_is_not_found() {
        let (_store, svc) = service();
        let err = svc.rename(&user(), "nope", "Night shift").await.unwrap_err();
        assert!(matches!(err, NarrativeError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_inactive_session_keeps_active() {
        let (store, svc) = service();
        store.seed(record("s1"));
        store.seed(record("s2"));

        let outcome = svc.delete(&user(), "s2", Some("s1")).await.unwrap();
        assert_eq!(outcome.next_active_session_id.as_deref(), Some("s1"));
        assert!(outcome.created_session.is_none());
        assert!(store.get("s2").is_none());
    }

    #[tokio::test]
    async fn deleting_active_session_picks_first_remaining() {
        let (store, svc) = service();
        store.seed(record("s1"));
        store.seed(record("s2"));
        store.seed(record("s3"));

        let outcome = svc.delete(&user(), "s1", Some("s1")).await.unwrap();
        assert_eq!(outcome.next_active_session_id.as_deref(), Some("s2"));
        assert!(outcome.created_session.is_none());
    }

    #[tokio::test]
    async fn deleting_last_session_creates_a_new_one() {
        let (store, svc) = service();
        store.seed(record("s1"));

        let outcome = svc.delete(&user(), "s1", Some("s1")).await.unwrap();
        let created = outcome.created_session.expect("replacement session");
        assert_eq!(outcome.next_active_session_id.as_deref(), Some(created.id.as_str()));
        assert!(created.id.starts_with("session-"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn append_message_reads_then_writes_back() {
        let (store, svc) = service();
        let mut existing = record("s1");
        existing.messages.push(StoredMessage::new(MessageRole::User, "first", "10:00 AM"));
        store.seed(existing);

        let messages = svc
            .append_message(
                &user(),
                "s1",
                StoredMessage::new(MessageRole::Assistant, "second", "10:01 AM"),
            )
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(store.get("s1").unwrap().messages[1].content, "second");
    }

    #[tokio::test]
    async fn append_to_missing_session_is_not_found() {
        let (_store, svc) = service();
        let err = svc
            .append_message(&user(), "nope", StoredMessage::new(MessageRole::User, "x", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, NarrativeError::NotFound(_)));
    }
}
