//! Wire types for the coach backend

use serde::{Deserialize, Serialize};

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of the streaming POST to `/coach`
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

// Streaming response types. Every level is optional: a missing path means
// "no fragment this event", never an error.

/// One decoded object from the streamed reply body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StreamEvent {
    pub agent_id: Option<String>,
    pub chunk: Option<Chunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Chunk {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Choice {
    pub delta: Delta,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Delta {
    pub content: Option<String>,
}

impl StreamEvent {
    /// Incremental text carried by this event, if any
    pub fn content(&self) -> Option<&str> {
        self.chunk
            .as_ref()?
            .choices
            .first()?
            .delta
            .content
            .as_deref()
    }
}

// Auxiliary REST payloads. Absent fields default to empty.

/// One entry of the agent catalog
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentInfo {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// One entry of the brand-element catalog
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrandElement {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct UserNameResponse {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ResolveResponse {
    pub user_id: String,
}
