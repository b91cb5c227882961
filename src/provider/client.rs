//! Provider clients and streaming workers.
//!
//! [`Provider`] wraps the concrete clients behind enum dispatch, keeping
//! provider-specific wire details out of the orchestration layer. Each
//! `chat_stream` call masks unsupported options, then spawns one worker
//! task that owns the HTTP response and pushes typed chunks into the pipe.
//! The worker emits exactly one `Done` chunk, success or fault, and exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use super::accumulate::ToolCallAccumulator;
use super::capabilities::{capabilities_for, ProviderCapabilities};
use super::chunk::{ChunkSender, StreamChunk, StreamEnd};
use super::kind::ProviderKind;
use super::options::{ChatOptions, ResponseFormat};
use super::resolve::ModelSelection;
use crate::config::Config;
use crate::message::{Message, Role, ToolCall};

/// Faults surfaced by the wire clients.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Connection(#[from] reqwest::Error),
    #[error("server error: {0}")]
    Server(String),
    #[error("malformed response: {0}")]
    Parse(String),
}

/// A configured provider ready to handle chat and embedding requests.
pub enum Provider {
    Ollama(OllamaClient),
    LmStudio(LmStudioClient),
    #[cfg(test)]
    Scripted(scripted::ScriptedClient),
}

impl Provider {
    /// Creates a [`Provider`] from the loaded application config.
    pub fn from_config(config: &Config, selection: &ModelSelection) -> Self {
        let entry = config.provider_entry(selection.provider.id());
        let host = entry.and_then(|e| e.host.clone());
        let endpoint = entry.and_then(|e| e.endpoint.clone());
        let keep_alive = entry.and_then(|e| e.keep_alive.clone());
        match selection.provider {
            ProviderKind::Ollama => Provider::Ollama(OllamaClient::new(
                host.unwrap_or_else(|| crate::constants::OLLAMA_DEFAULT_BASE_URL.to_string()),
                keep_alive,
            )),
            ProviderKind::LmStudio => Provider::LmStudio(LmStudioClient::new(
                host.unwrap_or_else(|| crate::constants::LMSTUDIO_DEFAULT_BASE_URL.to_string()),
                endpoint,
            )),
        }
    }

    pub fn capabilities(&self) -> &'static ProviderCapabilities {
        match self {
            Provider::Ollama(_) => capabilities_for(ProviderKind::Ollama),
            Provider::LmStudio(_) => capabilities_for(ProviderKind::LmStudio),
            #[cfg(test)]
            Provider::Scripted(_) => scripted::capabilities(),
        }
    }

    /// Default keep-alive hint from the provider entry, for callers
    /// assembling options.
    pub fn default_keep_alive(&self) -> Option<String> {
        match self {
            Provider::Ollama(c) => c.keep_alive.clone(),
            _ => None,
        }
    }

    /// Streams one chat request into `sink` on a dedicated worker task.
    ///
    /// Options are masked against the provider capabilities before the wire
    /// request is built, so an unsupported option produces a request
    /// indistinguishable from one that never set it. The worker honors
    /// `cancel` between chunks and always terminates the stream with one
    /// `Done`.
    pub fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        options: ChatOptions,
        sink: ChunkSender,
        cancel: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        let options = options.masked_for(self.capabilities());
        match self {
            Provider::Ollama(client) => {
                let http = client.http.clone();
                let url = client.chat_url();
                let body = ollama_request_body(model, messages, &options);
                tokio::spawn(async move {
                    let end = match run_ollama_stream(http, url, body, &sink, &cancel).await {
                        Ok(()) => StreamEnd::ok(),
                        Err(e) => StreamEnd::failed(e.to_string()),
                    };
                    let _ = sink.send(StreamChunk::Done(end)).await;
                })
            }
            Provider::LmStudio(client) => {
                let http = client.http.clone();
                let url = client.chat_url();
                let body = openai_request_body(model, messages, &options);
                tokio::spawn(async move {
                    let end = match run_openai_stream(http, url, body, &sink, &cancel).await {
                        Ok(()) => StreamEnd::ok(),
                        Err(e) => StreamEnd::failed(e.to_string()),
                    };
                    let _ = sink.send(StreamChunk::Done(end)).await;
                })
            }
            #[cfg(test)]
            Provider::Scripted(client) => client.play_next(sink, cancel),
        }
    }

    /// Embed one text.
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed_batch(model, &[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ProviderError::Parse("empty embedding response".into()))
    }

    /// Embed a batch of texts.
    pub async fn embed_batch(
        &self,
        model: &str,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        match self {
            Provider::Ollama(client) => client.embed_batch(model, texts).await,
            Provider::LmStudio(client) => client.embed_batch(model, texts).await,
            #[cfg(test)]
            Provider::Scripted(client) => Ok(client.embed_batch(texts)),
        }
    }
}

/// Client for the native Ollama chat API.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    keep_alive: Option<String>,
}

impl OllamaClient {
    pub fn new(base_url: String, keep_alive: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            keep_alive,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    async fn embed_batch(
        &self,
        model: &str,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let response = self
            .http
            .post(format!("{}/api/embed", self.base_url))
            .json(&json!({"model": model, "input": texts}))
            .send()
            .await?;
        let response = check_status(response).await?;

        #[derive(Deserialize)]
        struct EmbedResponse {
            embeddings: Vec<Vec<f32>>,
        }
        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(parsed.embeddings)
    }
}

/// Client for the OpenAI-compatible LM Studio API.
pub struct LmStudioClient {
    http: reqwest::Client,
    base_url: String,
    endpoint: String,
}

impl LmStudioClient {
    pub fn new(base_url: String, endpoint: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoint: endpoint.unwrap_or_else(|| "/v1/chat/completions".to_string()),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}{}", self.base_url, self.endpoint)
    }

    async fn embed_batch(
        &self,
        model: &str,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let response = self
            .http
            .post(format!("{}/v1/embeddings", self.base_url))
            .json(&json!({"model": model, "input": texts}))
            .send()
            .await?;
        let response = check_status(response).await?;

        #[derive(Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
        }
        #[derive(Deserialize)]
        struct EmbedResponse {
            data: Vec<EmbeddingData>,
        }
        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Turn a non-2xx response into a server error with the body text.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Server(format!("{status}: {body}")))
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// Build the native Ollama request body. Masked-off options never appear.
pub fn ollama_request_body(model: &str, messages: &[Message], options: &ChatOptions) -> Value {
    let wire: Vec<Value> = messages
        .iter()
        .filter(|m| !m.display_only)
        .map(|m| {
            let mut obj = json!({"role": role_str(m.role), "content": m.content});
            if let Some(ref thinking) = m.thinking {
                obj["thinking"] = json!(thinking);
            }
            if !m.tool_calls.is_empty() {
                obj["tool_calls"] = Value::Array(
                    m.tool_calls
                        .iter()
                        .map(|tc| {
                            let arguments: Value = serde_json::from_str(&tc.arguments)
                                .unwrap_or_else(|_| json!(tc.arguments));
                            json!({"function": {"name": tc.name, "arguments": arguments}})
                        })
                        .collect(),
                );
            }
            obj
        })
        .collect();

    let mut body = json!({"model": model, "messages": wire, "stream": true});
    if options.enable_thinking {
        body["think"] = json!(true);
    }
    if let Some(ref keep_alive) = options.keep_alive {
        body["keep_alive"] = json!(keep_alive);
    }
    if let Some(ResponseFormat::Json) = options.response_format {
        body["format"] = json!("json");
    }
    if !options.tools.is_empty() {
        body["tools"] = Value::Array(options.tools.clone());
    }
    let mut tuning = serde_json::Map::new();
    if let Some(ctx) = options.context_size {
        tuning.insert("num_ctx".into(), json!(ctx));
    }
    if let Some(max) = options.max_tokens {
        tuning.insert("num_predict".into(), json!(max));
    }
    if let Some(temp) = options.temperature {
        tuning.insert("temperature".into(), json!(temp));
    }
    if let Some(penalty) = options.repeat_penalty {
        tuning.insert("repeat_penalty".into(), json!(penalty));
    }
    if !tuning.is_empty() {
        body["options"] = Value::Object(tuning);
    }
    body
}

/// Build the OpenAI-compatible request body. Masked-off options never appear.
pub fn openai_request_body(model: &str, messages: &[Message], options: &ChatOptions) -> Value {
    let wire: Vec<Value> = messages
        .iter()
        .filter(|m| !m.display_only)
        .map(|m| {
            let mut obj = json!({"role": role_str(m.role), "content": m.content});
            if !m.tool_calls.is_empty() {
                obj["tool_calls"] = Value::Array(
                    m.tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {"name": tc.name, "arguments": tc.arguments},
                            })
                        })
                        .collect(),
                );
            }
            if let Some(ref call_id) = m.tool_call_id {
                obj["tool_call_id"] = json!(call_id);
            }
            obj
        })
        .collect();

    let mut body = json!({"model": model, "messages": wire, "stream": true});
    if options.enable_thinking {
        body["reasoning"] = json!({"enabled": true});
    }
    if let Some(ref keep_alive) = options.keep_alive {
        body["keep_alive"] = json!(keep_alive);
    }
    if let Some(ctx) = options.context_size {
        body["context_size"] = json!(ctx);
    }
    if let Some(max) = options.max_tokens {
        body["max_tokens"] = json!(max);
    }
    if let Some(temp) = options.temperature {
        body["temperature"] = json!(temp);
    }
    if let Some(ResponseFormat::Json) = options.response_format {
        body["response_format"] = json!({"type": "json_object"});
    }
    if !options.tools.is_empty() {
        body["tools"] = Value::Array(options.tools.clone());
    }
    body
}

#[derive(Deserialize)]
struct OllamaChunk {
    #[serde(default)]
    message: Option<OllamaChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaChunkMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Deserialize)]
struct OllamaToolCall {
    function: OllamaToolFunction,
}

#[derive(Deserialize)]
struct OllamaToolFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Drive one native Ollama streaming request, pushing chunks into `sink`.
///
/// NDJSON lines may split across network reads; a carry buffer reassembles
/// them. Tool calls arrive complete within one line and pass straight
/// through as a batch.
async fn run_ollama_stream(
    http: reqwest::Client,
    url: String,
    body: Value,
    sink: &ChunkSender,
    cancel: &AtomicBool,
) -> Result<(), ProviderError> {
    let response = http.post(&url).json(&body).send().await?;
    let response = check_status(response).await?;

    let mut stream = response.bytes_stream();
    let mut carry = String::new();
    while let Some(bytes) = stream.next().await {
        if cancel.load(Ordering::Relaxed) {
            return Ok(());
        }
        let bytes = bytes?;
        carry.push_str(&String::from_utf8_lossy(&bytes));
        while let Some(pos) = carry.find('\n') {
            let line: String = carry.drain(..=pos).collect();
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if process_ollama_line(line, sink).await? {
                return Ok(());
            }
        }
    }
    let tail = carry.trim();
    if !tail.is_empty() {
        process_ollama_line(tail, sink).await?;
    }
    Ok(())
}

/// Handle one NDJSON line. Returns `true` when the server marked the
/// response done.
async fn process_ollama_line(line: &str, sink: &ChunkSender) -> Result<bool, ProviderError> {
    let chunk: OllamaChunk =
        serde_json::from_str(line).map_err(|e| ProviderError::Parse(e.to_string()))?;
    if let Some(error) = chunk.error {
        return Err(ProviderError::Server(error));
    }
    if let Some(message) = chunk.message {
        if let Some(thinking) = message.thinking {
            if !thinking.is_empty() {
                send_chunk(sink, StreamChunk::Thinking(thinking)).await?;
            }
        }
        if !message.content.is_empty() {
            send_chunk(sink, StreamChunk::Content(message.content)).await?;
        }
        if !message.tool_calls.is_empty() {
            let batch: Vec<ToolCall> = message
                .tool_calls
                .into_iter()
                .map(|tc| ToolCall {
                    id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                    name: tc.function.name,
                    arguments: tc.function.arguments.to_string(),
                })
                .collect();
            send_chunk(sink, StreamChunk::ToolCalls(batch)).await?;
        }
    }
    Ok(chunk.done)
}

#[derive(Deserialize)]
struct OpenAiChunk {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    #[serde(default)]
    delta: OpenAiDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAiToolCallDelta>,
}

#[derive(Deserialize)]
struct OpenAiToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: OpenAiFunctionDelta,
}

#[derive(Deserialize, Default)]
struct OpenAiFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Drive one OpenAI-compatible SSE request, accumulating tool-call deltas
/// by index and emitting a single batch when generation finishes.
async fn run_openai_stream(
    http: reqwest::Client,
    url: String,
    body: Value,
    sink: &ChunkSender,
    cancel: &AtomicBool,
) -> Result<(), ProviderError> {
    let response = http.post(&url).json(&body).send().await?;
    let response = check_status(response).await?;

    let mut accumulator = ToolCallAccumulator::new();
    let mut events = response.bytes_stream().eventsource();
    while let Some(event) = events.next().await {
        if cancel.load(Ordering::Relaxed) {
            return Ok(());
        }
        let event = event.map_err(|e| ProviderError::Parse(e.to_string()))?;
        if event.data.trim() == "[DONE]" {
            break;
        }
        let chunk: OpenAiChunk = serde_json::from_str(&event.data)
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        for choice in chunk.choices {
            if let Some(thinking) = choice.delta.reasoning_content {
                if !thinking.is_empty() {
                    send_chunk(sink, StreamChunk::Thinking(thinking)).await?;
                }
            }
            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    send_chunk(sink, StreamChunk::Content(content)).await?;
                }
            }
            for delta in choice.delta.tool_calls {
                accumulator.push(
                    delta.index,
                    delta.id.as_deref(),
                    delta.function.name.as_deref(),
                    delta.function.arguments.as_deref(),
                );
            }
            if choice.finish_reason.as_deref() == Some("tool_calls") && !accumulator.is_empty() {
                send_chunk(sink, StreamChunk::ToolCalls(accumulator.finish())).await?;
            }
        }
    }
    // Servers that omit the finish reason still get their calls delivered.
    if !accumulator.is_empty() {
        send_chunk(sink, StreamChunk::ToolCalls(accumulator.finish())).await?;
    }
    Ok(())
}

async fn send_chunk(sink: &ChunkSender, chunk: StreamChunk) -> Result<(), ProviderError> {
    sink.send(chunk)
        .await
        .map_err(|_| ProviderError::Server("stream consumer went away".into()))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::capabilities::capabilities_for;

    fn history() -> Vec<Message> {
        vec![Message::system("sys"), Message::user("hi")]
    }

    #[test]
    fn masked_lmstudio_request_has_no_thinking_or_keep_alive() {
        let options = ChatOptions {
            enable_thinking: true,
            keep_alive: Some("15m".into()),
            context_size: Some(4096),
            ..Default::default()
        }
        .masked_for(capabilities_for(ProviderKind::LmStudio));
        let body = openai_request_body("m", &history(), &options);
        assert!(body.get("reasoning").is_none());
        assert!(body.get("keep_alive").is_none());
        assert!(body.get("context_size").is_none());
    }

    #[test]
    fn ollama_request_keeps_supported_options() {
        let options = ChatOptions {
            enable_thinking: true,
            keep_alive: Some("15m".into()),
            context_size: Some(4096),
            ..Default::default()
        }
        .masked_for(capabilities_for(ProviderKind::Ollama));
        let body = ollama_request_body("m", &history(), &options);
        assert_eq!(body["think"], serde_json::json!(true));
        assert_eq!(body["keep_alive"], serde_json::json!("15m"));
        assert_eq!(body["options"]["num_ctx"], serde_json::json!(4096));
    }

    #[test]
    fn masked_and_unset_requests_are_indistinguishable() {
        let caps = capabilities_for(ProviderKind::LmStudio);
        let set = ChatOptions {
            enable_thinking: true,
            keep_alive: Some("15m".into()),
            context_size: Some(4096),
            ..Default::default()
        }
        .masked_for(caps);
        let unset = ChatOptions::default().masked_for(caps);
        assert_eq!(
            openai_request_body("m", &history(), &set),
            openai_request_body("m", &history(), &unset),
        );
    }

    #[test]
    fn display_only_messages_never_reach_the_wire() {
        let mut messages = history();
        messages.push(Message::display_only("local note"));
        let body = openai_request_body("m", &messages, &ChatOptions::default());
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn tool_role_messages_carry_their_call_id() {
        let messages = vec![Message::tool_result("c1", "{\"ok\":true}")];
        let body = openai_request_body("m", &messages, &ChatOptions::default());
        assert_eq!(body["messages"][0]["tool_call_id"], serde_json::json!("c1"));
    }

    #[tokio::test]
    async fn scripted_provider_replays_through_real_pipe() {
        use crate::provider::chunk::chunk_pipe;

        let provider = Provider::scripted(vec![vec![
            StreamChunk::Content("Hi".into()),
            StreamChunk::Content("!".into()),
        ]]);
        let (tx, mut rx) = chunk_pipe();
        let cancel = Arc::new(AtomicBool::new(false));
        provider.chat_stream("m", &history(), ChatOptions::default(), tx, cancel);

        assert_eq!(rx.recv().await, Some(StreamChunk::Content("Hi".into())));
        assert_eq!(rx.recv().await, Some(StreamChunk::Content("!".into())));
        assert_eq!(
            rx.recv().await,
            Some(StreamChunk::Done(StreamEnd::ok()))
        );
    }
}
