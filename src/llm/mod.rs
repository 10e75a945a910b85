//! Reqwest-based client for OpenAI-compatible Chat Completions, streaming and not.

use std::{pin::Pin, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::ImageUrl { image_url: ImageUrl { url: url.into() } }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: MessageContent::Text(content.into()) }
    }

    pub fn multimodal(role: Role, parts: Vec<ContentPart>) -> Self {
        Self { role, content: MessageContent::Parts(parts) }
    }
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: Option<u32>,
}

impl ChatOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into(), temperature: 1.0, top_p: 1.0, max_tokens: None }
    }
}

/// Anything that turns a request into the text of its first choice.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], opts: &ChatOptions) -> Result<String>;
}

#[derive(Debug)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    streaming: bool,
}

impl LlmClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let timeout = cfg.get_u64("REQUEST_TIMEOUT").unwrap_or(60);
        let api_base_url = cfg.get("API_BASE_URL").unwrap_or_else(|| "default".into());
        let base_url = normalize_base_url(&api_base_url);
        let api_key = cfg
            .get("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .context("OPENAI_API_KEY is not set")?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key,
            streaming: !cfg.get_bool("DISABLE_STREAMING"),
        })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn headers(&self, stream: bool) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if stream {
            headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        }
        let hv = HeaderValue::from_str(&format!("Bearer {}", self.api_key))?;
        headers.insert(AUTHORIZATION, hv);
        Ok(headers)
    }

    /// Single JSON response; returns `choices[0].message.content`.
    pub async fn chat(&self, messages: &[ChatMessage], opts: &ChatOptions) -> Result<String> {
        let body = request_body(messages, opts, false);
        let resp = self
            .http
            .post(self.url())
            .headers(self.headers(false)?)
            .json(&body)
            .send()
            .await
            .context("failed to send chat request")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("LLM error: {}: {}", status, text));
        }

        let parsed: ChatResponse = resp.json().await.context("invalid chat response")?;
        let first = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("LLM response has no choices"))?;
        Ok(first.message.content.unwrap_or_default())
    }

    pub fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
        opts: ChatOptions,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>> {
        let http = self.http.clone();
        let url = self.url();
        let headers = self.headers(true);

        Box::pin(try_stream! {
            let body = request_body(&messages, &opts, true);
            let resp = http
                .post(url)
                .headers(headers?)
                .json(&body)
                .send()
                .await
                .context("failed to send chat request")?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                Err::<(), _>(anyhow!("LLM error: {}: {}", status, text))?;
                return;
            }

            let mut buf = String::new();
            let mut stream = resp.bytes_stream();

            while let Some(chunk) = stream.next().await {
                let bytes = chunk.context("stream error")?;
                buf.push_str(&String::from_utf8_lossy(&bytes));
                while let Some(pos) = buf.find('\n') {
                    let line: String = buf.drain(..=pos).collect();
                    match parse_sse_line(&line) {
                        Some(StreamEvent::Done) => { yield StreamEvent::Done; return; }
                        Some(ev) => { yield ev; }
                        None => {}
                    }
                }
            }
            yield StreamEvent::Done;
        })
    }
}

#[async_trait]
impl CompletionService for LlmClient {
    async fn complete(&self, messages: &[ChatMessage], opts: &ChatOptions) -> Result<String> {
        if !self.streaming {
            return self.chat(messages, opts).await;
        }
        let mut stream = self.chat_stream(messages.to_vec(), opts.clone());
        let mut text = String::new();
        while let Some(ev) = stream.next().await {
            match ev? {
                StreamEvent::Content(t) => text.push_str(&t),
                StreamEvent::Done => break,
            }
        }
        Ok(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Content(String),
    Done,
}

fn normalize_base_url(api_base_url: &str) -> String {
    if api_base_url == "default" {
        return "https://api.openai.com/v1".to_string();
    }
    let trimmed = api_base_url.trim_end_matches('/');
    if !trimmed.ends_with("/v1") && !trimmed.contains("/v1/") {
        format!("{}/v1", trimmed)
    } else {
        trimmed.to_string()
    }
}

fn request_body(messages: &[ChatMessage], opts: &ChatOptions, stream: bool) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": opts.model,
        "temperature": opts.temperature,
        "top_p": opts.top_p,
        "messages": messages,
        "stream": stream,
    });
    if let Some(max) = opts.max_tokens {
        body["max_tokens"] = serde_json::json!(max);
    }
    body
}

/// Interpret one server-sent-events line. Only content of choice 0 is kept.
fn parse_sse_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let payload = line.strip_prefix("data:")?.trim();
    if payload == "[DONE]" {
        return Some(StreamEvent::Done);
    }
    // ignore malformed lines
    let chunk: Chunk = serde_json::from_str(payload).ok()?;
    let content: String = chunk
        .choices
        .into_iter()
        .filter(|c| c.index.unwrap_or(0) == 0)
        .filter_map(|c| c.delta.and_then(|d| d.content))
        .collect();
    if content.is_empty() {
        None
    } else {
        Some(StreamEvent::Content(content))
    }
}

// Minimal chunk structures for OpenAI-like streaming
#[derive(Debug, Deserialize)]
struct Chunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    index: Option<u32>,
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multimodal_message_serializes_to_openai_shape() {
        let msg = ChatMessage::multimodal(
            Role::User,
            vec![
                ContentPart::text("describe"),
                ContentPart::image_url("data:image/jpeg;base64,AAAA"),
            ],
        );
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "describe"},
                    {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,AAAA"}}
                ]
            })
        );
    }

    #[test]
    fn text_message_serializes_as_plain_string() {
        let v = serde_json::to_value(ChatMessage::new(Role::System, "hi")).unwrap();
        assert_eq!(v, serde_json::json!({"role": "system", "content": "hi"}));
    }

    #[test]
    fn request_body_omits_unset_max_tokens() {
        let opts = ChatOptions::new("gpt-4o");
        let body = request_body(&[ChatMessage::new(Role::User, "q")], &opts, true);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["stream"], true);
        assert!(body.get("max_tokens").is_none());

        let opts = ChatOptions { max_tokens: Some(2048), ..opts };
        let body = request_body(&[], &opts, false);
        assert_eq!(body["max_tokens"], 2048);
    }

    #[test]
    fn base_url_gets_v1_suffix() {
        assert_eq!(normalize_base_url("default"), "https://api.openai.com/v1");
        assert_eq!(normalize_base_url("http://localhost:8080/"), "http://localhost:8080/v1");
        assert_eq!(normalize_base_url("http://host/v1/"), "http://host/v1");
    }

    #[test]
    fn sse_lines() {
        assert_eq!(parse_sse_line("data: [DONE]"), Some(StreamEvent::Done));
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line(""), None);
        assert_eq!(parse_sse_line("data: {not json"), None);
        let line = r#"data: {"choices":[{"index":0,"delta":{"content":"print"}},{"index":1,"delta":{"content":"other"}}]}"#;
        assert_eq!(parse_sse_line(line), Some(StreamEvent::Content("print".into())));
        let role_only = r#"data: {"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(role_only), None);
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let cfg = crate::config::Config::from_pairs([("OPENAI_API_KEY", "  ")]);
        let err = LlmClient::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    mod transport {
        use tokio::{
            io::{AsyncReadExt, AsyncWriteExt},
            net::{TcpListener, TcpStream},
        };

        use super::*;
        use crate::config::Config;

        /// Answer one HTTP request with the given status and body; returns the base url.
        async fn serve_once(status: &'static str, content_type: &'static str, body: String) -> String {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                let (mut sock, _) = listener.accept().await.unwrap();
                read_request(&mut sock).await;
                let resp = format!(
                    "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    content_type,
                    body.len(),
                    body
                );
                sock.write_all(resp.as_bytes()).await.unwrap();
                let _ = sock.shutdown().await;
            });
            format!("http://{}", addr)
        }

        async fn read_request(sock: &mut TcpStream) {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    return;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                    let len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + len {
                        return;
                    }
                }
            }
        }

        fn client(base_url: String, streaming: bool) -> LlmClient {
            let cfg = Config::from_pairs([
                ("OPENAI_API_KEY".to_string(), "test-key".to_string()),
                ("API_BASE_URL".to_string(), base_url),
                ("DISABLE_STREAMING".to_string(), (!streaming).to_string()),
            ]);
            LlmClient::from_config(&cfg).unwrap()
        }

        fn question() -> Vec<ChatMessage> {
            vec![ChatMessage::new(Role::User, "What is 1+1?")]
        }

        fn sse_chunk(content: &str) -> String {
            let chunk = serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]});
            format!("data: {}\n\n", chunk)
        }

        #[tokio::test]
        async fn streaming_error_status_is_reported() {
            let base = serve_once("500 Internal Server Error", "text/plain", "upstream exploded".into()).await;
            let err = client(base, true)
                .complete(&question(), &ChatOptions::new("m"))
                .await
                .unwrap_err();
            let msg = err.to_string();
            assert!(msg.contains("500"), "{}", msg);
            assert!(msg.contains("upstream exploded"), "{}", msg);
        }

        #[tokio::test]
        async fn single_response_error_status_is_reported() {
            let base = serve_once("401 Unauthorized", "application/json", r#"{"error":"bad key"}"#.into()).await;
            let err = client(base, false)
                .complete(&question(), &ChatOptions::new("m"))
                .await
                .unwrap_err();
            let msg = err.to_string();
            assert!(msg.contains("401"), "{}", msg);
            assert!(msg.contains("bad key"), "{}", msg);
        }

        #[tokio::test]
        async fn streaming_deltas_are_concatenated() {
            let body = format!(
                "{}: keep-alive\n\n{}data: [DONE]\n\n",
                sse_chunk("```python\nprint("),
                sse_chunk("2)\n```")
            );
            let base = serve_once("200 OK", "text/event-stream", body).await;
            let text = client(base, true)
                .complete(&question(), &ChatOptions::new("m"))
                .await
                .unwrap();
            assert_eq!(text, "```python\nprint(2)\n```");
        }

        #[tokio::test]
        async fn single_response_returns_first_choice() {
            let body = serde_json::json!({
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": "first"}},
                    {"index": 1, "message": {"role": "assistant", "content": "second"}}
                ]
            })
            .to_string();
            let base = serve_once("200 OK", "application/json", body).await;
            let text = client(base, false)
                .complete(&question(), &ChatOptions::new("m"))
                .await
                .unwrap();
            assert_eq!(text, "first");
        }
    }
}
