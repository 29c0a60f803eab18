//! UI-agnostic chat state types
//!
//! This module contains the transcript and request types shared between the
//! session and any front-end (TUI, web view, etc.). Nothing here depends on a
//! UI framework or on the network.

use serde::{Deserialize, Deserializer, Serialize};

/// Context id meaning "no context restriction".
pub const GENERAL_CONTEXT: &str = "general";

/// Display name of the always-present general option.
pub const GENERAL_CONTEXT_NAME: &str = "General";

/// Shown when the backend answers successfully but with nothing to say.
pub const NO_ANSWER_TEXT: &str = "no answer could be generated";

/// Shown for any failed turn (network, server status, malformed body).
pub const CONNECTION_ERROR_TEXT: &str = "connection error, try again";

/// Identifier of a transcript entry, unique for the lifetime of a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(u64);

/// Who a transcript entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    /// Placeholder while a request is in flight
    Pending,
    Error,
}

/// A single entry in the chat transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    /// HTML for front-ends that display markup. Terminal front-ends re-style
    /// `text` instead; `None` marks plain fallback text.
    pub rendered_html: Option<String>,
}

/// Ordered chat history. Append-only, except for removing the in-flight
/// pending placeholder once its request resolves.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        role: Role,
        text: impl Into<String>,
        rendered_html: Option<String>,
    ) -> MessageId {
        debug_assert!(
            role != Role::Pending || self.pending().is_none(),
            "transcript already holds a pending entry"
        );

        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(Message {
            id,
            role,
            text: text.into(),
            rendered_html,
        });
        id
    }

    /// Remove the entry with `id`, returning it if it was present
    pub fn remove(&mut self, id: MessageId) -> Option<Message> {
        let idx = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(idx))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn pending(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.role == Role::Pending)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A selectable scope for questions (e.g. a folder of notes)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextOption {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
}

impl ContextOption {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    /// The always-present "no context" option
    pub fn general() -> Self {
        Self::new(GENERAL_CONTEXT, GENERAL_CONTEXT_NAME)
    }

    pub fn is_general(&self) -> bool {
        self.id == GENERAL_CONTEXT
    }
}

/// Folder ids arrive as integers from the backend but are routed as strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}

/// One user turn as sent to the answer service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub text: String,
    pub context_id: Option<String>,
}

impl ChatRequest {
    /// Build a request, collapsing the general sentinel (or no selection)
    /// into "no context".
    pub fn new(text: impl Into<String>, selected_context: Option<&str>) -> Self {
        let context_id = selected_context
            .filter(|id| *id != GENERAL_CONTEXT)
            .map(str::to_string);

        Self {
            text: text.into(),
            context_id,
        }
    }

    pub fn is_contextual(&self) -> bool {
        self.context_id.is_some()
    }
}
