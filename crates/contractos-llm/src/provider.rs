//! The LM provider capability boundary (C9, spec §4.9).
//!
//! Grounded on the teacher's `legalis-llm/src/providers.rs` `OpenAiClient` /
//! `AnthropicClient` pattern: a small async trait, a reqwest-backed remote
//! implementation, and a deterministic mock for tests. The surface is
//! narrower than the teacher's — no streaming, no progress callbacks — since
//! the spec's capability set is exactly `complete` and `embed`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use contractos_core::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A JSON-Schema-shaped constraint the provider should coerce its reply into.
/// `None` means free-form text.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub structured_schema: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub text: String,
    /// Present when `structured_schema` was supplied and the provider
    /// returned parseable JSON conforming to it.
    pub structured: Option<Value>,
}

/// The capability boundary required by the core: `complete` is
/// mandatory, `embed` is optional — the embedding index may hold its own
/// model instead.
#[async_trait]
pub trait LmProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> CoreResult<CompletionResult>;

    async fn embed(&self, _texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        Err(CoreError::LmUnavailable("this provider does not implement embed".to_string()))
    }

    fn provider_name(&self) -> &str;
}

fn prompt_hash(messages: &[Message]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for m in messages {
        m.content.hash(&mut hasher);
    }
    hasher.finish()
}

/// Deterministic mock keyed by prompt hash (spec §4.9: "scripted responses
/// keyed by prompt hash for reproducible tests"). Script entries are matched
/// in insertion order by substring first; if nothing matches, a fixed
/// default response derives from the hash so repeated calls with the same
/// prompt always produce the same (if uninteresting) answer.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    scripts: Vec<(String, CompletionResultScript)>,
}

#[derive(Debug, Clone)]
struct CompletionResultScript {
    text: String,
    structured: Option<Value>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a scripted reply for any prompt whose concatenated message
    /// content contains `pattern`.
    pub fn with_text_response(mut self, pattern: impl Into<String>, text: impl Into<String>) -> Self {
        self.scripts.push((pattern.into(), CompletionResultScript { text: text.into(), structured: None }));
        self
    }

    pub fn with_structured_response(mut self, pattern: impl Into<String>, structured: Value) -> Self {
        let text = structured.to_string();
        self.scripts.push((pattern.into(), CompletionResultScript { text, structured: Some(structured) }));
        self
    }
}

#[async_trait]
impl LmProvider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> CoreResult<CompletionResult> {
        let joined: String = request.messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n");
        for (pattern, script) in &self.scripts {
            if joined.contains(pattern.as_str()) {
                return Ok(CompletionResult { text: script.text.clone(), structured: script.structured.clone() });
            }
        }
        let hash = prompt_hash(&request.messages);
        Ok(CompletionResult {
            text: format!("mock-response-{hash:x}"),
            structured: None,
        })
    }

    async fn embed(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        // A cheap, deterministic embedding: hash each text into a small fixed
        // vector. Not semantically meaningful, only stable and reproducible.
        Ok(texts.iter().map(|t| deterministic_embedding(t, 32)).collect())
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

fn deterministic_embedding(text: &str, dim: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; dim];
    for (i, byte) in text.bytes().enumerate() {
        out[i % dim] += (byte as f32) / 255.0;
    }
    let norm: f32 = out.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut out {
            *v /= norm;
        }
    }
    out
}

/// A remote, HTTP-backed provider speaking an OpenAI-compatible chat
/// completion API. Grounded on the teacher's `OpenAiClient`
/// (`legalis-llm/src/providers.rs`): same request shape, same
/// `Authorization: Bearer` header, minus streaming support.
pub struct RemoteProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl RemoteProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: WireMessageOwned,
}

#[derive(Deserialize)]
struct WireMessageOwned {
    content: String,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl LmProvider for RemoteProvider {
    async fn complete(&self, request: CompletionRequest) -> CoreResult<CompletionResult> {
        let wire_messages: Vec<WireMessage> =
            request.messages.iter().map(|m| WireMessage { role: role_str(m.role), content: &m.content }).collect();

        let body = ChatRequest {
            model: &self.model,
            messages: wire_messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::LmUnavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::LmRateLimited("provider returned 429".to_string()));
        }
        if !response.status().is_success() {
            return Err(CoreError::LmUnavailable(format!("provider returned {}", response.status())));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| CoreError::LmInvalidResponse(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CoreError::LmInvalidResponse("no choices in response".to_string()))?;

        let structured = request.structured_schema.as_ref().and_then(|_| extract_json(&text).and_then(|s| serde_json::from_str(s).ok()));

        Ok(CompletionResult { text, structured })
    }

    fn provider_name(&self) -> &str {
        "remote"
    }
}

fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return Some(text[content_start..content_start + end].trim());
        }
    }
    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            if end > start {
                return Some(&text[start..=end]);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_returns_scripted_response_for_matching_prompt() {
        let provider = MockProvider::new().with_text_response("parties", "Alpha Corp and Beta LLC");
        let result = provider
            .complete(CompletionRequest {
                messages: vec![Message::user("Who are the parties to this contract?")],
                max_tokens: 100,
                temperature: 0.0,
                structured_schema: None,
            })
            .await
            .unwrap();
        assert_eq!(result.text, "Alpha Corp and Beta LLC");
    }

    #[tokio::test]
    async fn mock_is_deterministic_for_identical_unmatched_prompts() {
        let provider = MockProvider::new();
        let req = || CompletionRequest {
            messages: vec![Message::user("identical prompt")],
            max_tokens: 100,
            temperature: 0.0,
            structured_schema: None,
        };
        let a = provider.complete(req()).await.unwrap();
        let b = provider.complete(req()).await.unwrap();
        assert_eq!(a.text, b.text);
    }

    #[tokio::test]
    async fn mock_embed_is_deterministic_and_normalized() {
        let provider = MockProvider::new();
        let vectors = provider.embed(&["hello world".to_string()]).await.unwrap();
        assert_eq!(vectors.len(), 1);
        let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
    }
}
