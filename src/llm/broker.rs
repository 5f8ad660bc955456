use crate::error::Result;
use crate::llm::gateway::{CompletionConfig, LlmGateway, StreamChunk};
use crate::llm::models::{LlmMessage, Usage};
use crate::llm::thinking::{split_complete, AssembledResponse, Segment, ThinkingSplitter};
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info};

/// What a caller sees while a reply is being produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    ThinkingStarted,
    Thinking(String),
    ThinkingEnded,
    Answer(String),
    Done(Usage),
}

impl From<Segment> for ResponseEvent {
    fn from(segment: Segment) -> Self {
        match segment {
            Segment::ThinkingStart => ResponseEvent::ThinkingStarted,
            Segment::Thinking(text) => ResponseEvent::Thinking(text),
            Segment::ThinkingEnd => ResponseEvent::ThinkingEnded,
            Segment::Answer(text) => ResponseEvent::Answer(text),
        }
    }
}

/// Binds a model name to a gateway
#[derive(Clone)]
pub struct LlmBroker {
    model: String,
    gateway: Arc<dyn LlmGateway>,
}

impl LlmBroker {
    /// Create a new LLM broker
    pub fn new(model: impl Into<String>, gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            model: model.into(),
            gateway,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Use a different model on the same gateway
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self::new(model, Arc::clone(&self.gateway))
    }

    pub fn gateway(&self) -> &Arc<dyn LlmGateway> {
        &self.gateway
    }

    /// Generate a complete reply, split into answer and reasoning
    pub async fn generate(
        &self,
        messages: &[LlmMessage],
        config: Option<CompletionConfig>,
    ) -> Result<(AssembledResponse, Usage)> {
        let config = config.unwrap_or_default();

        let reply = self.gateway.complete(&self.model, messages, &config).await?;

        let mut response = split_complete(&reply.content);
        if let Some(native) = reply.thinking {
            response.thinking.insert_str(0, &native);
        }

        debug!(
            "Reply: {} answer bytes, {} thinking bytes",
            response.answer.len(),
            response.thinking.len()
        );
        Ok((response, reply.usage))
    }

    /// Generate a streaming reply.
    ///
    /// Reasoning delivered either inline (`<think>` markers) or out of band
    /// (`message.thinking`) is reported through the same thinking events.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use futures::stream::StreamExt;
    ///
    /// let broker = LlmBroker::new("qwen3:32b", gateway);
    /// let messages = vec![LlmMessage::user("Tell me a story")];
    ///
    /// let mut stream = broker.generate_stream(&messages, None);
    /// while let Some(event) = stream.next().await {
    ///     if let ResponseEvent::Answer(text) = event? {
    ///         print!("{}", text);
    ///     }
    /// }
    /// ```
    pub fn generate_stream<'a>(
        &'a self,
        messages: &'a [LlmMessage],
        config: Option<CompletionConfig>,
    ) -> Pin<Box<dyn Stream<Item = Result<ResponseEvent>> + Send + 'a>> {
        let config = config.unwrap_or_default();

        Box::pin(async_stream::stream! {
            let mut splitter = ThinkingSplitter::new();
            let mut native_thinking = false;
            let mut usage = None;

            let mut stream = self.gateway.complete_stream(&self.model, messages, &config);

            while let Some(chunk_result) = stream.next().await {
                match chunk_result {
                    Ok(StreamChunk::Thinking(text)) => {
                        // Inside an inline block the span is already open
                        if !native_thinking && !splitter.is_thinking() {
                            native_thinking = true;
                            yield Ok(ResponseEvent::ThinkingStarted);
                        }
                        yield Ok(ResponseEvent::Thinking(text));
                    }
                    Ok(StreamChunk::Content(text)) => {
                        if native_thinking {
                            native_thinking = false;
                            yield Ok(ResponseEvent::ThinkingEnded);
                        }
                        for segment in splitter.feed(&text) {
                            yield Ok(segment.into());
                        }
                    }
                    Ok(StreamChunk::Done(done)) => {
                        usage = Some(done);
                        break;
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            for segment in splitter.finish() {
                yield Ok(segment.into());
            }
            if native_thinking {
                yield Ok(ResponseEvent::ThinkingEnded);
            }

            let usage = usage.unwrap_or_default();
            info!("Stream complete: {} completion tokens", usage.completion_tokens);
            yield Ok(ResponseEvent::Done(usage));
        })
    }
}
