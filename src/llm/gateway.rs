use crate::error::Result;
use crate::llm::models::{LlmMessage, ModelInfo, Usage};
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

/// Request options for a chat completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionConfig {
    /// Ask the server to constrain output to JSON
    pub json_mode: bool,
    /// Ask the server for a reasoning pass before the answer
    pub think: bool,
    /// Context window override (`options.num_ctx`)
    pub num_ctx: Option<u32>,
}

/// One item of a streaming chat response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// Raw fragment of `message.content`, possibly carrying `<think>` markers
    Content(String),
    /// Fragment of the out-of-band `message.thinking` field
    Thinking(String),
    /// Final object of the stream
    Done(Usage),
}

/// Result of a non-streaming chat completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayReply {
    pub content: String,
    pub thinking: Option<String>,
    pub usage: Usage,
}

/// Abstract interface to the inference server
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Complete a chat request and return the whole reply
    async fn complete(
        &self,
        model: &str,
        messages: &[LlmMessage],
        config: &CompletionConfig,
    ) -> Result<GatewayReply>;

    /// Complete a chat request, yielding fragments as they arrive
    fn complete_stream<'a>(
        &'a self,
        model: &'a str,
        messages: &'a [LlmMessage],
        config: &'a CompletionConfig,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>>;

    /// Get the models installed on the server
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_config_default() {
        let config = CompletionConfig::default();

        assert!(!config.json_mode);
        assert!(!config.think);
        assert_eq!(config.num_ctx, None);
    }

    #[test]
    fn test_gateway_reply_default() {
        let reply = GatewayReply::default();
        assert!(reply.content.is_empty());
        assert!(reply.thinking.is_none());
        assert_eq!(reply.usage, Usage::default());
    }
}
