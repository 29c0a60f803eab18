/// Why a backend call failed.
///
/// The session collapses every variant into the same user-visible
/// connection-error entry; the distinction only reaches the logs.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Request task failed: {0}")]
    Task(String),
}

impl ChatError {
    /// Short label used as a structured logging field
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Network(_) => "network",
            ChatError::Status { .. } => "status",
            ChatError::Parse(_) => "parse",
            ChatError::Task(_) => "task",
        }
    }
}

impl From<tokio::task::JoinError> for ChatError {
    fn from(err: tokio::task::JoinError) -> Self {
        ChatError::Task(err.to_string())
    }
}
