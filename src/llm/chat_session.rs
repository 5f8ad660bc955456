//! Conversation state for one-shot and interactive chat.
//!
//! A [`ChatSession`] owns the message history sent to the server on every turn.
//! Only final answers are stored back into the history; reasoning text is shown
//! to the user but never replayed to the model.

use crate::error::Result;
use crate::history::SavedSession;
use crate::llm::broker::{LlmBroker, ResponseEvent};
use crate::llm::gateway::CompletionConfig;
use crate::llm::models::{LlmMessage, Usage};
use crate::llm::thinking::{AssembledResponse, ResponseAssembler};
use crate::render::ResponseSink;
use futures::stream::StreamExt;
use tracing::debug;

/// Per-turn switches chosen on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChatOptions {
    pub stream: bool,
    pub json_mode: bool,
    pub think: bool,
}

/// A conversation with one model.
///
/// # Examples
///
/// ```ignore
/// use ask::llm::{ChatOptions, ChatSession, LlmBroker};
/// use ask::llm::gateways::OllamaGateway;
/// use ask::render::{Palette, TerminalRenderer};
/// use std::sync::Arc;
///
/// let broker = LlmBroker::new("llama3", Arc::new(OllamaGateway::default()));
/// let mut session = ChatSession::new(broker, Some("Be brief."), None);
/// let mut renderer = TerminalRenderer::new(std::io::stdout(), Palette::new(true));
///
/// session.add_user_message("What is Rust?");
/// session.chat(ChatOptions { stream: true, ..Default::default() }, &mut renderer).await?;
/// ```
pub struct ChatSession {
    broker: LlmBroker,
    messages: Vec<LlmMessage>,
    num_ctx: Option<u32>,
    total_tokens: u64,
}

impl ChatSession {
    /// Create a session, seeding the system prompt when one is given
    pub fn new(broker: LlmBroker, system_prompt: Option<&str>, num_ctx: Option<u32>) -> Self {
        let messages = system_prompt
            .map(|prompt| vec![LlmMessage::system(prompt)])
            .unwrap_or_default();

        Self {
            broker,
            messages,
            num_ctx,
            total_tokens: 0,
        }
    }

    /// Restore a saved conversation on the gateway used by `broker`
    pub fn from_saved(broker: &LlmBroker, saved: SavedSession) -> Self {
        Self {
            broker: broker.with_model(saved.model),
            messages: saved.messages,
            num_ctx: None,
            total_tokens: 0,
        }
    }

    pub fn model(&self) -> &str {
        self.broker.model()
    }

    pub fn broker(&self) -> &LlmBroker {
        &self.broker
    }

    pub fn messages(&self) -> &[LlmMessage] {
        &self.messages
    }

    pub fn num_ctx(&self) -> Option<u32> {
        self.num_ctx
    }

    /// Completion tokens generated so far in this session
    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.messages.push(LlmMessage::user(content));
    }

    pub fn add_assistant_message(&mut self, content: impl Into<String>) {
        self.messages.push(LlmMessage::assistant(content));
    }

    /// Store a finished reply and account for its tokens
    pub fn record_reply(&mut self, answer: &str, usage: Usage) {
        self.add_assistant_message(answer);
        self.total_tokens += usage.completion_tokens;
    }

    /// Run one exchange with the current history.
    ///
    /// Events are forwarded to `sink` as they arrive. The answer is recorded only
    /// when the exchange succeeds; on error the history is left untouched.
    pub async fn chat(
        &mut self,
        options: ChatOptions,
        sink: &mut dyn ResponseSink,
    ) -> Result<AssembledResponse> {
        let config = CompletionConfig {
            json_mode: options.json_mode,
            think: options.think,
            num_ctx: self.num_ctx,
        };
        debug!("Chat turn with {} messages, stream={}", self.messages.len(), options.stream);

        let (response, usage) = if options.stream {
            let mut assembler = ResponseAssembler::new();
            let mut usage = Usage::default();

            let mut stream = self.broker.generate_stream(&self.messages, Some(config));
            while let Some(event) = stream.next().await {
                let event = event?;
                match &event {
                    ResponseEvent::Thinking(text) => assembler.push_thinking(text),
                    ResponseEvent::Answer(text) => assembler.push_answer(text),
                    ResponseEvent::Done(done) => usage = *done,
                    ResponseEvent::ThinkingStarted | ResponseEvent::ThinkingEnded => {}
                }
                sink.on_event(&event)?;
            }
            drop(stream);

            (assembler.finish(), usage)
        } else {
            self.broker.generate(&self.messages, Some(config)).await?
        };

        sink.on_complete(&response, options.stream)?;
        self.record_reply(&response.answer, usage);

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AskError;
    use crate::llm::gateway::{GatewayReply, LlmGateway, StreamChunk};
    use crate::llm::models::{MessageRole, ModelInfo};
    use futures::stream::{self, Stream};
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};

    // Mock gateway recording the requests it receives
    struct MockGateway {
        chunks: Vec<StreamChunk>,
        reply: GatewayReply,
        fail: bool,
        seen: Mutex<Vec<(usize, CompletionConfig)>>,
    }

    impl MockGateway {
        fn new(chunks: Vec<StreamChunk>, reply: &str) -> Self {
            Self {
                chunks,
                reply: GatewayReply {
                    content: reply.to_string(),
                    thinking: None,
                    usage: Usage {
                        prompt_tokens: 1,
                        completion_tokens: 5,
                    },
                },
                fail: false,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmGateway for MockGateway {
        async fn complete(
            &self,
            _model: &str,
            messages: &[LlmMessage],
            config: &CompletionConfig,
        ) -> Result<GatewayReply> {
            self.seen.lock().unwrap().push((messages.len(), config.clone()));
            if self.fail {
                return Err(AskError::Gateway("down".to_string()));
            }
            Ok(self.reply.clone())
        }

        fn complete_stream<'a>(
            &'a self,
            _model: &'a str,
            messages: &'a [LlmMessage],
            config: &'a CompletionConfig,
        ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>> {
            self.seen.lock().unwrap().push((messages.len(), config.clone()));
            if self.fail {
                return Box::pin(stream::iter(vec![Err(AskError::Gateway("down".to_string()))]));
            }
            Box::pin(stream::iter(self.chunks.clone().into_iter().map(Ok)))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Vec<ResponseEvent>,
        completed: Vec<(AssembledResponse, bool)>,
    }

    impl ResponseSink for RecordingSink {
        fn on_event(&mut self, event: &ResponseEvent) -> Result<()> {
            self.events.push(event.clone());
            Ok(())
        }

        fn on_complete(&mut self, response: &AssembledResponse, streamed: bool) -> Result<()> {
            self.completed.push((response.clone(), streamed));
            Ok(())
        }
    }

    fn session_with(gateway: Arc<MockGateway>, system: Option<&str>) -> ChatSession {
        ChatSession::new(LlmBroker::new("test-model", gateway), system, Some(4096))
    }

    fn streaming_chunks() -> Vec<StreamChunk> {
        vec![
            StreamChunk::Content("<think>why</think>".to_string()),
            StreamChunk::Content("Because.".to_string()),
            StreamChunk::Done(Usage {
                prompt_tokens: 2,
                completion_tokens: 7,
            }),
        ]
    }

    #[test]
    fn test_new_session_with_system_prompt() {
        let session = session_with(Arc::new(MockGateway::new(vec![], "")), Some("Be terse"));

        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, MessageRole::System);
        assert_eq!(session.messages()[0].content, "Be terse");
        assert_eq!(session.model(), "test-model");
        assert_eq!(session.num_ctx(), Some(4096));
    }

    #[test]
    fn test_new_session_without_system_prompt() {
        let session = session_with(Arc::new(MockGateway::new(vec![], "")), None);
        assert!(session.messages().is_empty());
        assert_eq!(session.total_tokens(), 0);
    }

    #[test]
    fn test_from_saved_switches_model() {
        let broker = LlmBroker::new("current", Arc::new(MockGateway::new(vec![], "")));
        let saved = SavedSession {
            model: "saved-model".to_string(),
            messages: vec![LlmMessage::user("hi"), LlmMessage::assistant("hello")],
            saved_at: "2024-01-01T00:00:00+00:00".to_string(),
        };

        let session = ChatSession::from_saved(&broker, saved);

        assert_eq!(session.model(), "saved-model");
        assert_eq!(session.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_streaming_chat_records_answer_only() {
        let gateway = Arc::new(MockGateway::new(streaming_chunks(), ""));
        let mut session = session_with(gateway.clone(), Some("sys"));
        let mut sink = RecordingSink::default();

        session.add_user_message("Why?");
        let response = session
            .chat(
                ChatOptions {
                    stream: true,
                    think: true,
                    ..Default::default()
                },
                &mut sink,
            )
            .await
            .unwrap();

        assert_eq!(response.answer, "Because.");
        assert_eq!(response.thinking, "why");
        assert_eq!(session.messages().len(), 3);
        assert_eq!(session.messages()[2], LlmMessage::assistant("Because."));
        assert_eq!(session.total_tokens(), 7);

        assert_eq!(sink.events.first(), Some(&ResponseEvent::ThinkingStarted));
        assert_eq!(sink.completed.len(), 1);
        assert!(sink.completed[0].1);

        let seen = gateway.seen.lock().unwrap();
        assert_eq!(seen[0].0, 2);
        assert_eq!(
            seen[0].1,
            CompletionConfig {
                json_mode: false,
                think: true,
                num_ctx: Some(4096)
            }
        );
    }

    #[tokio::test]
    async fn test_non_streaming_chat() {
        let gateway = Arc::new(MockGateway::new(vec![], "<think>x</think>Done"));
        let mut session = session_with(gateway, None);
        let mut sink = RecordingSink::default();

        session.add_user_message("Go");
        let response = session.chat(ChatOptions::default(), &mut sink).await.unwrap();

        assert_eq!(response.answer, "Done");
        assert!(sink.events.is_empty());
        assert_eq!(sink.completed[0].0.answer, "Done");
        assert!(!sink.completed[0].1);
        assert_eq!(session.messages()[1], LlmMessage::assistant("Done"));
        assert_eq!(session.total_tokens(), 5);
    }

    #[tokio::test]
    async fn test_tokens_accumulate_across_turns() {
        let gateway = Arc::new(MockGateway::new(streaming_chunks(), ""));
        let mut session = session_with(gateway, None);
        let mut sink = RecordingSink::default();
        let options = ChatOptions {
            stream: true,
            ..Default::default()
        };

        session.add_user_message("one");
        session.chat(options, &mut sink).await.unwrap();
        session.add_user_message("two");
        session.chat(options, &mut sink).await.unwrap();

        assert_eq!(session.total_tokens(), 14);
        assert_eq!(session.messages().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_chat_leaves_history_untouched() {
        let mut gateway = MockGateway::new(vec![], "");
        gateway.fail = true;
        let mut session = session_with(Arc::new(gateway), None);
        let mut sink = RecordingSink::default();

        session.add_user_message("Hello?");
        let result = session
            .chat(
                ChatOptions {
                    stream: true,
                    ..Default::default()
                },
                &mut sink,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(session.messages(), &[LlmMessage::user("Hello?")]);
        assert!(sink.completed.is_empty());
    }
}
