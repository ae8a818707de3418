//! A generic JSON-over-HTTP [`Provider`]: the one concrete
//! implementation this crate ships, against a vendor-agnostic wire
//! protocol. A real vendor's SDK (with its own auth flow) is an explicit
//! non-goal (`spec.md` §1); this type only ever sends the bearer token
//! already resolved into the [`ApiKey`] it's handed, so nothing here
//! negotiates credentials — it just shapes requests and responses.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::provider::{
	ApiKey, BatchHandle, BatchRequest, BatchResult, BatchStatus, EmbeddingRole, GenerationResponse, Message, Provider, ProviderError, RequestSettings,
	ResponseChunk, Role, ToolCall,
};

/// Where the provider's endpoints live. One `base_url`, four fixed
/// sub-paths — a single vendor-agnostic shape any backing service
/// implementing this wire protocol can sit behind.
#[derive(Debug, Clone)]
pub struct HttpEndpoints {
	pub base_url: String,
}

impl HttpEndpoints {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self { base_url: base_url.into() }
	}

	fn generate(&self) -> String {
		format!("{}/v1/generate", self.base_url)
	}
	fn generate_stream(&self) -> String {
		format!("{}/v1/generate/stream", self.base_url)
	}
	fn batches(&self) -> String {
		format!("{}/v1/batches", self.base_url)
	}
	fn batch_status(&self, handle: &BatchHandle) -> String {
		format!("{}/v1/batches/{}", self.base_url, handle.0)
	}
	fn embeddings(&self) -> String {
		format!("{}/v1/embeddings", self.base_url)
	}
}

#[derive(Serialize)]
struct WireMessage<'a> {
	role: &'a str,
	content: &'a str,
}

fn role_str(role: Role) -> &'static str {
	match role {
		Role::System => "system",
		Role::User => "user",
		Role::Assistant => "assistant",
		Role::Tool => "tool",
	}
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
	model: &'a str,
	messages: Vec<WireMessage<'a>>,
	max_tokens: Option<u32>,
	temperature: Option<f32>,
}

#[derive(Deserialize)]
struct WireToolCall {
	name: String,
	arguments: Value,
}

#[derive(Deserialize)]
struct GenerateResponseBody {
	content: String,
	#[serde(default)]
	tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct StreamChunkBody {
	delta: String,
}

#[derive(Serialize)]
struct BatchRequestItem<'a> {
	id: &'a str,
	model: &'a str,
	messages: Vec<WireMessage<'a>>,
	max_tokens: Option<u32>,
	temperature: Option<f32>,
}

#[derive(Serialize)]
struct SubmitBatchRequest<'a> {
	requests: Vec<BatchRequestItem<'a>>,
}

#[derive(Deserialize)]
struct SubmitBatchResponse {
	handle: String,
}

#[derive(Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum BatchStatusBody {
	Pending,
	Done { results: Vec<BatchResultBody> },
	Failed { error: String },
}

#[derive(Deserialize)]
struct BatchResultBody {
	id: String,
	content: String,
	#[serde(default)]
	tool_calls: Vec<WireToolCall>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
	model: &'a str,
	texts: &'a [String],
	role: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
	vectors: Vec<Vec<f32>>,
}

/// Generic JSON-over-HTTP [`Provider`]. One `reqwest::Client` (connection
/// pooling, rustls) shared across every call this instance makes.
pub struct HttpProvider {
	client: reqwest::Client,
	endpoints: HttpEndpoints,
}

impl HttpProvider {
	pub fn new(endpoints: HttpEndpoints) -> Self {
		Self { client: reqwest::Client::new(), endpoints }
	}

	fn auth(&self, builder: reqwest::RequestBuilder, key: &ApiKey) -> reqwest::RequestBuilder {
		builder.bearer_auth(key.secret())
	}

	async fn send_json<B: Serialize, R: for<'de> Deserialize<'de>>(&self, url: String, key: &ApiKey, body: &B, timeout: Duration) -> Result<R, ProviderError> {
		let request = self.auth(self.client.post(url).timeout(timeout).json(body), key);
		let response = request.send().await.map_err(classify_transport)?;
		if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
			return Err(ProviderError::RateLimited);
		}
		if response.status() == reqwest::StatusCode::UNAUTHORIZED || response.status() == reqwest::StatusCode::FORBIDDEN {
			return Err(ProviderError::Auth(format!("status {}", response.status())));
		}
		if !response.status().is_success() {
			return Err(ProviderError::InvalidResponse(format!("status {}", response.status())));
		}
		response.json::<R>().await.map_err(|e| ProviderError::InvalidResponse(e.to_string()))
	}
}

fn classify_transport(err: reqwest::Error) -> ProviderError {
	if err.is_timeout() {
		ProviderError::Timeout
	} else {
		ProviderError::Network(err.to_string())
	}
}

#[async_trait]
impl Provider for HttpProvider {
	async fn generate(&self, key: &ApiKey, model: &str, messages: &[Message], settings: &RequestSettings) -> Result<GenerationResponse, ProviderError> {
		let body = GenerateRequest {
			model,
			messages: messages.iter().map(|m| WireMessage { role: role_str(m.role), content: &m.content }).collect(),
			max_tokens: settings.max_tokens,
			temperature: settings.temperature,
		};
		let parsed: GenerateResponseBody = self.send_json(self.endpoints.generate(), key, &body, settings.timeout).await?;
		Ok(GenerationResponse {
			content: parsed.content,
			tool_calls: parsed.tool_calls.into_iter().map(|t| ToolCall { name: t.name, arguments: t.arguments }).collect(),
		})
	}

	async fn generate_stream(&self, key: &ApiKey, model: &str, messages: &[Message], settings: &RequestSettings) -> Result<BoxStream<'static, Result<ResponseChunk, ProviderError>>, ProviderError> {
		let body = GenerateRequest {
			model,
			messages: messages.iter().map(|m| WireMessage { role: role_str(m.role), content: &m.content }).collect(),
			max_tokens: settings.max_tokens,
			temperature: settings.temperature,
		};
		let request = self.auth(self.client.post(self.endpoints.generate_stream()).timeout(settings.timeout).json(&body), key);
		let response = request.send().await.map_err(classify_transport)?;
		if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
			return Err(ProviderError::RateLimited);
		}
		if !response.status().is_success() {
			return Err(ProviderError::InvalidResponse(format!("status {}", response.status())));
		}

		// One NDJSON line per chunk; each line decodes independently, so a
		// malformed line surfaces as an `InvalidResponse` item rather than
		// aborting the whole stream.
		let stream = response.bytes_stream().map(|chunk| {
			chunk
				.map_err(classify_transport)
				.and_then(|bytes| serde_json::from_slice::<StreamChunkBody>(&bytes).map_err(|e| ProviderError::InvalidResponse(e.to_string())))
				.map(|body| ResponseChunk { delta: body.delta })
		});
		Ok(stream.boxed())
	}

	async fn submit_batch(&self, key: &ApiKey, model: &str, requests: &[BatchRequest]) -> Result<BatchHandle, ProviderError> {
		let body = SubmitBatchRequest {
			requests: requests
				.iter()
				.map(|r| BatchRequestItem {
					id: &r.id,
					model,
					messages: r.messages.iter().map(|m| WireMessage { role: role_str(m.role), content: &m.content }).collect(),
					max_tokens: r.settings.max_tokens,
					temperature: r.settings.temperature,
				})
				.collect(),
		};
		let parsed: SubmitBatchResponse = self.send_json(self.endpoints.batches(), key, &body, Duration::from_secs(30)).await?;
		Ok(BatchHandle(parsed.handle))
	}

	async fn poll_batch(&self, key: &ApiKey, handle: &BatchHandle) -> Result<BatchStatus, ProviderError> {
		let request = self.auth(self.client.get(self.endpoints.batch_status(handle)).timeout(Duration::from_secs(30)), key);
		let response = request.send().await.map_err(classify_transport)?;
		if !response.status().is_success() {
			return Err(ProviderError::InvalidResponse(format!("status {}", response.status())));
		}
		let parsed: BatchStatusBody = response.json().await.map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
		Ok(match parsed {
			BatchStatusBody::Pending => BatchStatus::Pending,
			BatchStatusBody::Done { results } => BatchStatus::Done(
				results
					.into_iter()
					.map(|r| BatchResult {
						id: r.id,
						response: GenerationResponse { content: r.content, tool_calls: r.tool_calls.into_iter().map(|t| ToolCall { name: t.name, arguments: t.arguments }).collect() },
					})
					.collect(),
			),
			BatchStatusBody::Failed { error } => BatchStatus::Failed(error),
		})
	}

	async fn embed(&self, key: &ApiKey, model: &str, texts: &[String], role: EmbeddingRole) -> Result<Vec<Vec<f32>>, ProviderError> {
		let role = match role {
			EmbeddingRole::Document => "document",
			EmbeddingRole::Query => "query",
		};
		let body = EmbedRequest { model, texts, role };
		let parsed: EmbedResponse = self.send_json(self.endpoints.embeddings(), key, &body, Duration::from_secs(30)).await?;
		Ok(parsed.vectors)
	}
}
