//! The provider-facing contract: what any backing model API must offer,
//! independent of which vendor answers it.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
	System,
	User,
	Assistant,
	Tool,
}

#[derive(Debug, Clone)]
pub struct Message {
	pub role: Role,
	pub content: String,
}

impl Message {
	pub fn new(role: Role, content: impl Into<String>) -> Self {
		Self { role, content: content.into() }
	}
}

/// Per-call settings. `model` is overwritten by [`crate::client::LlmClient`]
/// with whichever model the key ring has currently selected; callers set
/// everything else.
#[derive(Debug, Clone)]
pub struct RequestSettings {
	pub model: String,
	pub max_tokens: Option<u32>,
	pub temperature: Option<f32>,
	pub timeout: std::time::Duration,
}

impl Default for RequestSettings {
	fn default() -> Self {
		Self { model: String::new(), max_tokens: None, temperature: None, timeout: std::time::Duration::from_secs(60) }
	}
}

#[derive(Debug, Clone)]
pub struct ToolCall {
	pub name: String,
	pub arguments: Value,
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
	pub content: String,
	pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone)]
pub struct ResponseChunk {
	pub delta: String,
}

#[derive(Debug, Clone)]
pub struct BatchRequest {
	pub id: String,
	pub messages: Vec<Message>,
	pub settings: RequestSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchHandle(pub String);

#[derive(Debug, Clone)]
pub struct BatchResult {
	pub id: String,
	pub response: GenerationResponse,
}

#[derive(Debug, Clone)]
pub enum BatchStatus {
	Pending,
	Done(Vec<BatchResult>),
	Failed(String),
}

/// Documents are embedded with a "document" prompt, queries with a
/// "query" prompt; there is no default because mixing the two is a
/// programming error, not a runtime condition to guard against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingRole {
	Document,
	Query,
}

/// An API credential. `label` identifies it in logs and metrics;
/// `secret` is never included in `Debug` output.
#[derive(Clone)]
pub struct ApiKey {
	pub label: String,
	secret: String,
}

impl ApiKey {
	pub fn new(label: impl Into<String>, secret: impl Into<String>) -> Self {
		Self { label: label.into(), secret: secret.into() }
	}

	pub fn secret(&self) -> &str {
		&self.secret
	}
}

impl std::fmt::Debug for ApiKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ApiKey").field("label", &self.label).field("secret", &"<redacted>").finish()
	}
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
	#[error("provider rate-limited the request")]
	RateLimited,
	#[error("provider request timed out")]
	Timeout,
	#[error("provider network error: {0}")]
	Network(String),
	#[error("provider returned an unusable response: {0}")]
	InvalidResponse(String),
	#[error("provider authentication failed: {0}")]
	Auth(String),
}

impl ProviderError {
	/// Whether retrying the same call (after backoff, or after key
	/// rotation) could plausibly succeed. `Auth` and `InvalidResponse`
	/// are not: the former needs a different credential, the latter a
	/// different request.
	pub fn is_retryable(&self) -> bool {
		matches!(self, ProviderError::RateLimited | ProviderError::Timeout | ProviderError::Network(_))
	}
}

/// A backing model API. One implementation per vendor; `kiln_llm::client`
/// is vendor-agnostic and drives any `Provider` through rate limiting,
/// key rotation, and retry.
#[async_trait]
pub trait Provider: Send + Sync {
	async fn generate(&self, key: &ApiKey, model: &str, messages: &[Message], settings: &RequestSettings) -> Result<GenerationResponse, ProviderError>;

	async fn generate_stream(&self, key: &ApiKey, model: &str, messages: &[Message], settings: &RequestSettings) -> Result<BoxStream<'static, Result<ResponseChunk, ProviderError>>, ProviderError>;

	async fn submit_batch(&self, key: &ApiKey, model: &str, requests: &[BatchRequest]) -> Result<BatchHandle, ProviderError>;

	async fn poll_batch(&self, key: &ApiKey, handle: &BatchHandle) -> Result<BatchStatus, ProviderError>;

	async fn embed(&self, key: &ApiKey, model: &str, texts: &[String], role: EmbeddingRole) -> Result<Vec<Vec<f32>>, ProviderError>;
}
