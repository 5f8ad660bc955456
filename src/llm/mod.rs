pub mod broker;
pub mod chat_session;
pub mod gateway;
pub mod gateways;
pub mod models;
pub mod thinking;

pub use broker::{LlmBroker, ResponseEvent};
pub use chat_session::{ChatOptions, ChatSession};
pub use gateway::{CompletionConfig, GatewayReply, LlmGateway, StreamChunk};
pub use models::{LlmMessage, MessageRole, ModelInfo, Usage};
pub use thinking::{split_complete, AssembledResponse, Segment, ThinkingSplitter};
