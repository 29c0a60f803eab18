pub mod api;
pub mod config;
pub mod error;
pub mod render;
pub mod session;
pub mod state;
pub mod store;
pub mod theme;

// Re-export main types for convenience
pub use api::{AnswerClient, AnswerService, ContextClient, ContextRegistry, Endpoints};
pub use config::Config;
pub use error::ChatError;
pub use render::render;
pub use session::{ChatSession, Command, TranscriptEvent};
pub use state::{ChatRequest, ContextOption, Message, MessageId, Role, Transcript};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use theme::Theme;
