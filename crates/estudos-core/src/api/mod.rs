pub mod answer;
pub mod contexts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::state::{ChatRequest, ContextOption};

pub use answer::AnswerClient;
pub use contexts::ContextClient;

/// Answers one user turn
#[async_trait]
pub trait AnswerService: Send + Sync {
    /// Returns the raw (Markdown) answer. An empty string is a valid,
    /// degraded answer rather than an error.
    async fn ask(&self, request: &ChatRequest) -> Result<String, ChatError>;
}

/// Supplies the contexts a question can be narrowed to
#[async_trait]
pub trait ContextRegistry: Send + Sync {
    async fn list(&self) -> Result<Vec<ContextOption>, ChatError>;
}

/// Backend routes, relative to the configured base URL
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Endpoints {
    pub chat: String,
    pub chat_contextual: String,
    pub contexts: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            chat: "/api/chat".to_string(),
            chat_contextual: "/api/chat_contextual".to_string(),
            contexts: "/api/user_contexts".to_string(),
        }
    }
}

/// Join a base URL and a route without doubling or dropping the slash
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Keep error bodies short enough for a log line
pub(crate) fn truncate_body(text: &str) -> String {
    text.chars().take(200).collect()
}
