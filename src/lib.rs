pub mod catalog;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod oneshot;
pub mod prompt;
pub mod render;
pub mod repl;

pub use error::{AskError, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::error::{AskError, Result};
    pub use crate::history::{SavedSession, SessionStore};
    pub use crate::llm::gateways::OllamaGateway;
    pub use crate::llm::{
        ChatOptions, ChatSession, CompletionConfig, LlmBroker, LlmGateway, LlmMessage,
        MessageRole, ResponseEvent,
    };
    pub use crate::render::{Palette, ResponseSink, TerminalRenderer};
}
