use crate::constants::SESSIONS_TABLE;
use crate::session::{SessionRecord, StoredMessage};
use crate::supabase::{SupabaseClient, TableQuery};
use crate::user::UserContext;
use crate::{NarrativeError, NarrativeResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn list(&self, user: &UserContext) -> NarrativeResult<Vec<SessionRecord>>;
    async fn insert(&self, user: &UserContext, session: &SessionRecord) -> NarrativeResult<()>;
    /// Fails with `NotFound` when no session of the user has that id.
    async fn rename(&self, user: &UserContext, session_id: &str, name: &str)
        -> NarrativeResult<()>;
    async fn delete(&self, user: &UserContext, session_id: &str) -> NarrativeResult<()>;
    /// Current messages of a session, `None` when the session does not exist.
    async fn messages(
        &self,
        user: &UserContext,
        session_id: &str,
    ) -> NarrativeResult<Option<Vec<StoredMessage>>>;
    async fn set_messages(
        &self,
        user: &UserContext,
        session_id: &str,
        messages: &[StoredMessage],
    ) -> NarrativeResult<()>;
}

pub struct SupabaseSessionStore {
    client: SupabaseClient,
}

impl SupabaseSessionStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    fn by_id(user: &UserContext, session_id: &str) -> TableQuery {
        TableQuery::new(SESSIONS_TABLE)
            .eq("id", session_id)
            .eq("user_id", user.user_id())
    }
}

#[derive(Deserialize)]
struct MessagesRow {
    #[serde(default)]
    messages: Option<Vec<StoredMessage>>,
}

#[async_trait]
impl SessionStore for SupabaseSessionStore {
    async fn list(&self, user: &UserContext) -> NarrativeResult<Vec<SessionRecord>> {
        let query = TableQuery::new(SESSIONS_TABLE)
            .select("*")
            .eq("user_id", user.user_id());
        self.client.select(user.access_token(), &query).await
    }

    async fn insert(&self, user: &UserContext, session: &SessionRecord) -> NarrativeResult<()> {
        let _: Vec<serde_json::Value> = self
            .client
            .insert(user.access_token(), SESSIONS_TABLE, session)
            .await?;
        Ok(())
    }

    async fn rename(
        &self,
        user: &UserContext,
        session_id: &str,
        name: &str,
    ) -> NarrativeResult<()> {
        let updated: Vec<serde_json::Value> = self
            .client
            .update(
                user.access_token(),
                &Self::by_id(user, session_id),
                &json!({ "name": name }),
            )
            .await?;
        if updated.is_empty() {
            return Err(NarrativeError::NotFound("Session".into()));
        }
        Ok(())
    }

    async fn delete(&self, user: &UserContext, session_id: &str) -> NarrativeResult<()> {
        self.client
            .delete(user.access_token(), &Self::by_id(user, session_id))
            .await
    }

    async fn messages(
        &self,
        user: &UserContext,
        session_id: &str,
    ) -> NarrativeResult<Option<Vec<StoredMessage>>> {
        let query = Self::by_id(user, session_id).select("messages").limit(1);
        let rows: Vec<MessagesRow> = self.client.select(user.access_token(), &query).await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| row.messages.unwrap_or_default()))
    }

    async fn set_messages(
        &self,
        user: &UserContext,
        session_id: &str,
        messages: &[StoredMessage],
    ) -> NarrativeResult<()> {
        let _: Vec<serde_json::Value> = self
            .client
            .update(
                user.access_token(),
                &Self::by_id(user, session_id),
                &json!({ "messages": messages }),
            )
            .await?;
        Ok(())
    }
}
