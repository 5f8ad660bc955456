pub mod ollama;

pub use ollama::{LineDecoder, OllamaConfig, OllamaGateway};
