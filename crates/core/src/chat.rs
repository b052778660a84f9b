//! Free-form chat inside a session.

use crate::llm::CompletionClient;
use crate::prompt::chat_prompt;
use crate::session::{MessageRole, SessionService, StoredMessage};
use crate::user::UserContext;
use crate::{NarrativeError, NarrativeResult};
use chrono::Local;
use std::sync::Arc;

#[derive(Clone)]
pub struct ChatService {
    sessions: SessionService,
    llm: Arc<dyn CompletionClient>,
}

impl ChatService {
    pub fn new(sessions: SessionService, llm: Arc<dyn CompletionClient>) -> Self {
        Self { sessions, llm }
    }

    /// Record the user's message, ask the model with the full session history and record the
    /// reply. Returns the assistant message.
    pub async fn send(
        &self,
        user: &UserContext,
        session_id: &str,
        content: &str,
        system_message: Option<&str>,
    ) -> NarrativeResult<StoredMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(NarrativeError::validation("Please enter a message."));
        }

        let history = self
            .sessions
            .append_message(
                user,
                session_id,
                StoredMessage::at(MessageRole::User, content, Local::now()),
            )
            .await?;

        let request = chat_prompt(&history, system_message);
        let reply = self.llm.complete(&request).await.map_err(|e| {
            tracing::error!("chat completion failed: {e}");
            e
        })?;

        let assistant = StoredMessage::at(MessageRole::Assistant, reply, Local::now());
        self.sessions
            .append_message(user, session_id, assistant.clone())
            .await?;
        Ok(assistant)
    }
}
