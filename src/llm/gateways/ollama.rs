use crate::config::{normalize_host, Settings};
use crate::error::{AskError, Result};
use crate::llm::gateway::{CompletionConfig, GatewayReply, LlmGateway, StreamChunk};
use crate::llm::models::{LlmMessage, ModelInfo, Usage};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for connecting to Ollama server
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub host: String,
    /// Longest silence tolerated while a chat reply is being produced
    pub chat_timeout: Duration,
    /// Deadline for catalogue requests
    pub list_timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: normalize_host(
                &std::env::var("OLLAMA_HOST")
                    .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ),
            chat_timeout: Duration::from_secs(300),
            list_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&Settings> for OllamaConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            host: settings.host.clone(),
            chat_timeout: settings.chat_timeout,
            list_timeout: settings.list_timeout,
        }
    }
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// Gateway for the Ollama local LLM service
pub struct OllamaGateway {
    client: Client,
    config: OllamaConfig,
}

impl OllamaGateway {
    /// Create a new Ollama gateway with default configuration
    pub fn new() -> Self {
        Self::with_config(OllamaConfig::default())
    }

    /// Create a new Ollama gateway with custom configuration
    pub fn with_config(config: OllamaConfig) -> Self {
        // The read timeout applies between body reads, so long streamed replies
        // are fine as long as tokens keep arriving.
        let client = Client::builder()
            .connect_timeout(config.list_timeout)
            .read_timeout(config.chat_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });

        Self { client, config }
    }

    /// Create gateway with custom host
    pub fn with_host(host: impl Into<String>) -> Self {
        Self::with_config(OllamaConfig {
            host: normalize_host(&host.into()),
            ..Default::default()
        })
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    async fn post_chat(&self, body: &Value) -> Result<Response> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.config.host))
            .json(body)
            .send()
            .await
            .map_err(|e| AskError::from_request(&self.config.host, e))?;

        check_status(response).await
    }
}

impl Default for OllamaGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmGateway for OllamaGateway {
    async fn complete(
        &self,
        model: &str,
        messages: &[LlmMessage],
        config: &CompletionConfig,
    ) -> Result<GatewayReply> {
        info!("Delegating to Ollama for completion");
        debug!("Model: {}, Message count: {}", model, messages.len());

        let body = build_chat_body(model, messages, config, false);
        let response = self.post_chat(&body).await?;
        let text = response
            .text()
            .await
            .map_err(|e| AskError::from_request(&self.config.host, e))?;
        let response_body: Value = serde_json::from_str(&text)?;

        if let Some(message) = response_body["error"].as_str() {
            return Err(AskError::Gateway(message.to_string()));
        }

        let content = response_body["message"]["content"]
            .as_str()
            .ok_or_else(|| AskError::Gateway("No content in response".to_string()))?
            .to_string();
        let thinking = response_body["message"]["thinking"]
            .as_str()
            .filter(|t| !t.is_empty())
            .map(String::from);

        Ok(GatewayReply {
            content,
            thinking,
            usage: Usage::from_body(&response_body),
        })
    }

    fn complete_stream<'a>(
        &'a self,
        model: &'a str,
        messages: &'a [LlmMessage],
        config: &'a CompletionConfig,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>> {
        Box::pin(async_stream::stream! {
            info!("Starting Ollama streaming completion");
            debug!("Model: {}, Message count: {}", model, messages.len());

            let body = build_chat_body(model, messages, config, true);
            let response = match self.post_chat(&body).await {
                Ok(r) => r,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut stream = response.bytes_stream();
            let mut decoder = LineDecoder::new();
            let mut lines = Vec::new();
            let mut finished = false;

            while !finished {
                match stream.next().await {
                    Some(Ok(bytes)) => lines.extend(decoder.push(&bytes)),
                    Some(Err(e)) => {
                        yield Err(AskError::from_request(&self.config.host, e));
                        return;
                    }
                    None => {
                        lines.extend(decoder.finish());
                        finished = true;
                    }
                }

                for line in lines.drain(..) {
                    match parse_stream_line(&line) {
                        Ok(chunks) => {
                            for chunk in chunks {
                                let done = matches!(chunk, StreamChunk::Done(_));
                                yield Ok(chunk);
                                if done {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }

            warn!("Ollama stream ended without a final done object");
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        debug!("Fetching available Ollama models");

        let response = self
            .client
            .get(format!("{}/api/tags", self.config.host))
            .timeout(self.config.list_timeout)
            .send()
            .await
            .map_err(|e| AskError::from_request(&self.config.host, e))?;
        let response = check_status(response).await?;

        let tags: TagsResponse = serde_json::from_str(
            &response
                .text()
                .await
                .map_err(|e| AskError::from_request(&self.config.host, e))?,
        )?;

        Ok(tags.models)
    }
}

/// Splits a byte stream into complete newline-terminated lines.
///
/// Bytes are only decoded once a whole line is present, so a multi-byte
/// character cut by a chunk boundary is reassembled before decoding.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }
        lines
    }

    /// Return the unterminated tail, if any
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&tail).into_owned())
    }
}

fn parse_stream_line(line: &str) -> Result<Vec<StreamChunk>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(vec![]);
    }

    let json: Value = match serde_json::from_str(line) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to parse streaming chunk: {}", e);
            return Ok(vec![]);
        }
    };

    if let Some(message) = json["error"].as_str() {
        return Err(AskError::Gateway(message.to_string()));
    }

    let mut chunks = Vec::new();
    if let Some(thinking) = json["message"]["thinking"].as_str() {
        if !thinking.is_empty() {
            chunks.push(StreamChunk::Thinking(thinking.to_string()));
        }
    }
    if let Some(content) = json["message"]["content"].as_str() {
        if !content.is_empty() {
            chunks.push(StreamChunk::Content(content.to_string()));
        }
    }
    if json["done"].as_bool().unwrap_or(false) {
        chunks.push(StreamChunk::Done(Usage::from_body(&json)));
    }

    Ok(chunks)
}

fn build_chat_body(
    model: &str,
    messages: &[LlmMessage],
    config: &CompletionConfig,
    stream: bool,
) -> Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
        "stream": stream
    });

    if config.json_mode {
        body["format"] = serde_json::json!("json");
    }
    if let Some(num_ctx) = config.num_ctx {
        body["options"] = serde_json::json!({ "num_ctx": num_ctx });
    }
    if config.think {
        body["think"] = serde_json::json!(true);
    }

    body
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v["error"].as_str().map(String::from))
        .unwrap_or(text);

    Err(AskError::Gateway(if detail.trim().is_empty() {
        format!("Ollama API error: {}", status)
    } else {
        format!("Ollama API error: {}: {}", status, detail.trim())
    }))
}
