//! Vendor-agnostic orchestration over a [`Provider`]: rate limiting, key
//! rotation, retry with backoff, and cooperative batch polling.

use std::sync::Arc;
use std::time::Duration;

use kiln_config::RateLimitConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::keys::KeyRing;
use crate::limiter::RateLimiter;
use crate::provider::{BatchHandle, BatchRequest, BatchStatus, EmbeddingRole, GenerationResponse, Message, Provider, ProviderError, RequestSettings, ResponseChunk};
use crate::retry::{RetryBudget, backoff_delay};
use futures::stream::BoxStream;

/// Classifies whether a [`ProviderError`] signals a rate limit (and
/// should trigger key rotation) as opposed to any other transient or
/// fatal condition. Injected so call sites can recognize vendor-specific
/// rate-limit signaling (e.g. a 429 surfaced as `Network`) without this
/// crate hardcoding vendor response shapes.
pub type RateLimitClassifier = Arc<dyn Fn(&ProviderError) -> bool + Send + Sync>;

pub fn default_rate_limit_classifier() -> RateLimitClassifier {
	Arc::new(|err: &ProviderError| matches!(err, ProviderError::RateLimited))
}

pub struct LlmClient<P: Provider> {
	provider: Arc<P>,
	keys: KeyRing,
	limiter: RateLimiter,
	retry_budget: RetryBudget,
	is_rate_limit: RateLimitClassifier,
}

impl<P: Provider> LlmClient<P> {
	pub fn new(provider: Arc<P>, keys: KeyRing, rate_limit: RateLimitConfig, retry_budget: RetryBudget) -> Self {
		Self { provider, keys, limiter: RateLimiter::new(rate_limit), retry_budget, is_rate_limit: default_rate_limit_classifier() }
	}

	pub fn with_rate_limit_classifier(mut self, classifier: RateLimitClassifier) -> Self {
		self.is_rate_limit = classifier;
		self
	}

	/// Single-shot generation. Rotates keys immediately on a classified
	/// rate-limit error (bounded by the total key count, so a request
	/// never spins forever if every credential is rate-limited); retries
	/// other retryable errors with backoff up to the configured budget;
	/// propagates anything else immediately.
	pub async fn request(&self, messages: &[Message], settings: &RequestSettings, cancellation: &CancellationToken) -> Result<GenerationResponse, LlmError> {
		let total_keys = self.keys.total_keys();
		let mut keys_tried = 0usize;
		let mut attempt = 0u32;

		loop {
			let permit = self.limiter.acquire(cancellation).await?;
			let (model, key) = self.keys.current();
			let mut call_settings = settings.clone();
			call_settings.model = model;

			let result = self.provider.generate(&key, &call_settings.model, messages, &call_settings).await;
			drop(permit);

			match result {
				Ok(response) => return Ok(response),
				Err(err) => {
					if (self.is_rate_limit)(&err) {
						keys_tried += 1;
						warn!(key = %key.label, "provider rate-limited key, rotating");
						self.keys.rotate();
						if keys_tried < total_keys {
							continue;
						}
						debug!("rate limit hit on every configured key, falling back to backoff");
					}

					if !err.is_retryable() {
						return Err(err.into());
					}

					attempt += 1;
					if attempt > self.retry_budget.max_attempts {
						return Err(LlmError::Transient { message: err.to_string(), attempts: attempt });
					}
					let delay = backoff_delay(&self.retry_budget, attempt);
					tokio::select! {
						_ = tokio::time::sleep(delay) => {}
						_ = cancellation.cancelled() => return Err(LlmError::Cancelled),
					}
				}
			}
		}
	}

	pub async fn request_stream(&self, messages: &[Message], settings: &RequestSettings, cancellation: &CancellationToken) -> Result<BoxStream<'static, Result<ResponseChunk, ProviderError>>, LlmError> {
		let permit = self.limiter.acquire(cancellation).await?;
		let (model, key) = self.keys.current();
		let mut call_settings = settings.clone();
		call_settings.model = model;
		let stream = self.provider.generate_stream(&key, &call_settings.model, messages, &call_settings).await?;
		drop(permit);
		Ok(stream)
	}

	pub async fn submit_batch(&self, requests: &[BatchRequest], cancellation: &CancellationToken) -> Result<BatchHandle, LlmError> {
		let permit = self.limiter.acquire(cancellation).await?;
		let (model, key) = self.keys.current();
		let handle = self.provider.submit_batch(&key, &model, requests).await?;
		drop(permit);
		Ok(handle)
	}

	/// Polls once. Cooperative callers loop this with a sleep and a
	/// `yield_now` between calls so polling never starves other tasks.
	pub async fn poll(&self, handle: &BatchHandle) -> Result<BatchStatus, LlmError> {
		let (_model, key) = self.keys.current();
		tokio::task::yield_now().await;
		Ok(self.provider.poll_batch(&key, handle).await?)
	}

	pub async fn embed(&self, texts: &[String], role: EmbeddingRole, cancellation: &CancellationToken) -> Result<Vec<Vec<f32>>, LlmError> {
		let permit = self.limiter.acquire(cancellation).await?;
		let (model, key) = self.keys.current();
		let vectors = self.provider.embed(&key, &model, texts, role).await?;
		drop(permit);
		Ok(vectors)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use async_trait::async_trait;

	use super::*;
	use crate::keys::ModelKeys;
	use crate::provider::{ApiKey, Role};

	struct FlakyProvider {
		calls: AtomicUsize,
		fail_until_call: usize,
		fail_with: ProviderError,
	}

	#[async_trait]
	impl Provider for FlakyProvider {
		async fn generate(&self, key: &ApiKey, _model: &str, _messages: &[Message], _settings: &RequestSettings) -> Result<GenerationResponse, ProviderError> {
			let call = self.calls.fetch_add(1, Ordering::SeqCst);
			if call < self.fail_until_call {
				return Err(self.fail_with.clone());
			}
			Ok(GenerationResponse { content: format!("ok via {}", key.label), tool_calls: vec![] })
		}

		async fn generate_stream(&self, _key: &ApiKey, _model: &str, _messages: &[Message], _settings: &RequestSettings) -> Result<BoxStream<'static, Result<ResponseChunk, ProviderError>>, ProviderError> {
			unimplemented!("not exercised in these tests")
		}

		async fn submit_batch(&self, _key: &ApiKey, _model: &str, _requests: &[BatchRequest]) -> Result<BatchHandle, ProviderError> {
			unimplemented!("not exercised in these tests")
		}

		async fn poll_batch(&self, _key: &ApiKey, _handle: &BatchHandle) -> Result<BatchStatus, ProviderError> {
			unimplemented!("not exercised in these tests")
		}

		async fn embed(&self, _key: &ApiKey, _model: &str, _texts: &[String], _role: EmbeddingRole) -> Result<Vec<Vec<f32>>, ProviderError> {
			unimplemented!("not exercised in these tests")
		}
	}

	fn two_key_ring() -> KeyRing {
		KeyRing::new(vec![ModelKeys { model: "model-a".to_string(), keys: vec![ApiKey::new("key-a", "secret-a"), ApiKey::new("key-b", "secret-b")] }])
	}

	#[tokio::test]
	async fn rotates_key_immediately_on_rate_limit_and_succeeds() {
		let provider = Arc::new(FlakyProvider { calls: AtomicUsize::new(0), fail_until_call: 1, fail_with: ProviderError::RateLimited });
		let client = LlmClient::new(provider, two_key_ring(), RateLimitConfig { requests_per_minute: 6000, burst: 10 }, RetryBudget::default());
		let cancellation = CancellationToken::new();

		let response = client.request(&[Message::new(Role::User, "hi")], &RequestSettings::default(), &cancellation).await.unwrap();

		assert_eq!(response.content, "ok via key-b");
	}

	#[tokio::test]
	async fn retries_non_rate_limit_transient_errors_with_backoff() {
		let provider = Arc::new(FlakyProvider { calls: AtomicUsize::new(0), fail_until_call: 2, fail_with: ProviderError::Timeout });
		let client = LlmClient::new(
			provider,
			two_key_ring(),
			RateLimitConfig { requests_per_minute: 6000, burst: 10 },
			RetryBudget { max_attempts: 5, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5) },
		);
		let cancellation = CancellationToken::new();

		let response = client.request(&[Message::new(Role::User, "hi")], &RequestSettings::default(), &cancellation).await.unwrap();

		assert_eq!(response.content, "ok via key-a");
	}

	#[tokio::test]
	async fn propagates_auth_errors_without_retry() {
		let provider = Arc::new(FlakyProvider { calls: AtomicUsize::new(0), fail_until_call: usize::MAX, fail_with: ProviderError::Auth("bad key".to_string()) });
		let client = LlmClient::new(provider, two_key_ring(), RateLimitConfig { requests_per_minute: 6000, burst: 10 }, RetryBudget::default());
		let cancellation = CancellationToken::new();

		let err = client.request(&[Message::new(Role::User, "hi")], &RequestSettings::default(), &cancellation).await.unwrap_err();

		assert!(matches!(err, LlmError::Provider(ProviderError::Auth(_))));
	}
}
