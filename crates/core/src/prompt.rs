//! Prompt construction for narrative generation and chat.
//!
//! Prompts are fixed instructions plus the form snapshot rendered as pretty-printed JSON.
//! Model output is returned as-is; nothing is parsed back out of it.

use crate::constants::{CHAT_MAX_TOKENS, COMPLETION_TEMPERATURE, NARRATIVE_MAX_TOKENS};
use crate::session::{MessageRole, StoredMessage};
use crate::settings::NarrativeSettings;
use crate::NarrativeResult;
use serde::{Deserialize, Serialize};

const EMS_REFERENCE_SYSTEM_PROMPT: &str = "You are an EMS narrative assistant. Generate a comprehensive NFIRS-compliant narrative based on the provided run data.
Use only the reference materials provided to inform your narrative. Do not invent facts or procedures not mentioned in the reference materials.
Format the narrative professionally and include all relevant details from the run data.";

const EMS_GENERAL_SYSTEM_PROMPT: &str = "You are an EMS narrative assistant. Generate a comprehensive NFIRS-compliant narrative based on the provided run data.
Use your knowledge of EMS protocols and best practices to create an accurate and professional narrative.
Format the narrative professionally and include all relevant details from the run data.";

const FIRE_SYSTEM_PROMPT: &str = "You are a Fire narrative assistant. Generate a comprehensive NFIRS-compliant fire incident narrative based on the provided incident data.
Format the narrative professionally and include all relevant details from the incident data.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl From<MessageRole> for ChatRole {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => ChatRole::User,
            MessageRole::Assistant => ChatRole::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: ChatRole,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A chat-completion call: messages plus sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<PromptMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    fn narrative(system: &str, user: String) -> Self {
        Self {
            messages: vec![
                PromptMessage::new(ChatRole::System, system),
                PromptMessage::new(ChatRole::User, user),
            ],
            temperature: COMPLETION_TEMPERATURE,
            max_tokens: NARRATIVE_MAX_TOKENS,
        }
    }

    pub fn system_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
    }

    /// Content of the last user message.
    pub fn user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
    }
}

/// Sentence describing the layout, abbreviation and header preferences.
pub fn format_instructions(settings: &NarrativeSettings) -> String {
    let layout = match settings.format_type.as_str() {
        "D.R.A.T.T." => {
            "Please format the narrative in D.R.A.T.T. format (Dispatch, Response, Arrival, Treatment, Transport).".to_string()
        }
        "S.O.A.P." => {
            "Please format the narrative in S.O.A.P. format (Subjective, Objective, Assessment, Plan).".to_string()
        }
        "C.H.A.R.T." => {
            "Please format the narrative in C.H.A.R.T. format (Chief complaint, History, Assessment, Rx/Treatment, Transport).".to_string()
        }
        "Custom" if !settings.custom_format.trim().is_empty() => format!(
            "Please format the narrative using the following format: {}",
            settings.custom_format.trim()
        ),
        _ => "Please format the narrative in standard paragraph format.".to_string(),
    };

    let abbreviations = if settings.use_abbreviations {
        "Use standard EMS abbreviations where appropriate."
    } else {
        "Do not use abbreviations; spell out all terms."
    };

    let headers = if settings.include_headers {
        "Include a header for each section of the narrative."
    } else {
        "Do not include section headers."
    };

    format!("{layout} {abbreviations} {headers}")
}

/// Prompt for an EMS narrative.
///
/// With `reference` set, the model is restricted to the reference materials and any snippets
/// are appended to the run data. Without it, the model draws on general protocol knowledge.
pub fn ems_prompt(
    run_data: &serde_json::Value,
    settings: &NarrativeSettings,
    reference: Option<&[String]>,
) -> NarrativeResult<CompletionRequest> {
    let mut user = format!(
        "FORMAT INSTRUCTIONS: {}\n\nRun Data:\n{}",
        format_instructions(settings),
        serde_json::to_string_pretty(run_data)?
    );

    let system = match reference {
        Some(snippets) => {
            if !snippets.is_empty() {
                user.push_str("\n\nReference Materials:\n");
                user.push_str(&snippets.join("\n\n"));
            }
            EMS_REFERENCE_SYSTEM_PROMPT
        }
        None => EMS_GENERAL_SYSTEM_PROMPT,
    };

    Ok(CompletionRequest::narrative(system, user))
}

/// Prompt for a fire incident narrative.
pub fn fire_prompt(incident_data: &serde_json::Value) -> NarrativeResult<CompletionRequest> {
    let user = format!(
        "Incident Data:\n{}",
        serde_json::to_string_pretty(incident_data)?
    );
    Ok(CompletionRequest::narrative(FIRE_SYSTEM_PROMPT, user))
}

/// Prompt for a chat turn: optional system message followed by the session history.
pub fn chat_prompt(history: &[StoredMessage], system: Option<&str>) -> CompletionRequest {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if let Some(system) = system.map(str::trim).filter(|s| !s.is_empty()) {
        messages.push(PromptMessage::new(ChatRole::System, system));
    }
    messages.extend(
        history
            .iter()
            .map(|m| PromptMessage::new(m.role.into(), m.content.clone())),
    );

    CompletionRequest {
        messages,
        temperature: COMPLETION_TEMPERATURE,
        max_tokens: CHAT_MAX_TOKENS,
    }
}
