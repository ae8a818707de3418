//! The profile enrichment worker: aggregates an author's recent
//! contributions into a single summary and upserts it as a `Profile`
//! document keyed by `author_id` (`spec.md` §3, §4.7).

use std::collections::BTreeSet;
use std::sync::Arc;

use kiln_llm::{LlmClient, Message, Provider, RequestSettings, Role};
use kiln_model::document::{ContentType, DocType, Document};
use kiln_repo::DocumentRepository;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::EnrichError;

/// A plain data-in input: an author id plus the raw text of their recent
/// contributions. The worker never inspects an `Entry` or `Window`
/// directly — the caller decides what counts as "recent" and hands over
/// already-extracted text (`spec.md` §4.7's data-in/data-out contract).
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileInput {
	pub author_id: String,
	pub recent_contributions: Vec<String>,
}

pub struct ProfileWorker<P: Provider> {
	client: Arc<LlmClient<P>>,
	repo: DocumentRepository,
	system_prompt: String,
	prompt_version: String,
}

impl<P: Provider> ProfileWorker<P> {
	pub fn new(client: Arc<LlmClient<P>>, repo: DocumentRepository, system_prompt: impl Into<String>, prompt_version: impl Into<String>) -> Self {
		Self { client, repo, system_prompt: system_prompt.into(), prompt_version: prompt_version.into() }
	}

	/// Produces or updates one profile document per input. A per-author
	/// failure is logged and skipped; it never aborts the remaining
	/// authors in this call (`spec.md` §4.7/§7).
	pub async fn run(&self, inputs: &[ProfileInput], cancellation: &CancellationToken) -> Result<usize, EnrichError> {
		let mut processed = 0;
		for input in inputs {
			if input.recent_contributions.is_empty() {
				continue;
			}
			match self.summarize(input, cancellation).await {
				Ok(doc) => {
					self.repo.upsert(&doc).await?;
					processed += 1;
				}
				Err(err) => warn!(author_id = %input.author_id, error = %err, "profile update failed"),
			}
		}
		Ok(processed)
	}

	async fn summarize(&self, input: &ProfileInput, cancellation: &CancellationToken) -> Result<Document, EnrichError> {
		let body = input.recent_contributions.join("\n---\n");
		let messages = [Message::new(Role::System, self.system_prompt.clone()), Message::new(Role::User, body)];
		let response = self.client.request(&messages, &RequestSettings::default(), cancellation).await?;

		let now = chrono::Utc::now();
		let existing = self.repo.get(&input.author_id, DocType::Profile).await?;
		let created_at = existing.map(|d| d.created_at).unwrap_or(now);

		Ok(Document::new(
			input.author_id.clone(),
			DocType::Profile,
			format!("Profile: {}", input.author_id),
			created_at,
			now,
			BTreeSet::from([input.author_id.clone()]),
			response.content,
			ContentType::Markdown,
			None,
			None,
			serde_json::Map::from_iter([("prompt_version".to_string(), serde_json::Value::String(self.prompt_version.clone()))]),
		)
		.expect("author_id is always non-empty per the Entry invariant"))
	}
}

#[cfg(test)]
mod tests {
	use async_trait::async_trait;
	use futures::stream::BoxStream;
	use kiln_llm::{ApiKey, BatchHandle, BatchRequest, BatchStatus, GenerationResponse, KeyRing, ModelKeys, ProviderError, ResponseChunk, RetryBudget};

	use super::*;

	struct EchoProvider;

	#[async_trait]
	impl Provider for EchoProvider {
		async fn generate(&self, _key: &ApiKey, _model: &str, messages: &[Message], _settings: &RequestSettings) -> Result<GenerationResponse, ProviderError> {
			Ok(GenerationResponse { content: format!("profile summary of: {}", messages[1].content), tool_calls: vec![] })
		}
		async fn generate_stream(&self, _key: &ApiKey, _model: &str, _messages: &[Message], _settings: &RequestSettings) -> Result<BoxStream<'static, Result<ResponseChunk, ProviderError>>, ProviderError> {
			unimplemented!()
		}
		async fn submit_batch(&self, _key: &ApiKey, _model: &str, _requests: &[BatchRequest]) -> Result<BatchHandle, ProviderError> {
			unimplemented!()
		}
		async fn poll_batch(&self, _key: &ApiKey, _handle: &BatchHandle) -> Result<BatchStatus, ProviderError> {
			unimplemented!()
		}
		async fn embed(&self, _key: &ApiKey, _model: &str, _texts: &[String], _role: kiln_llm::EmbeddingRole) -> Result<Vec<Vec<f32>>, ProviderError> {
			unimplemented!()
		}
	}

	async fn worker() -> ProfileWorker<EchoProvider> {
		let provider = Arc::new(EchoProvider);
		let keys = KeyRing::new(vec![ModelKeys { model: "m".to_string(), keys: vec![ApiKey::new("k1", "secret")] }]);
		let client = Arc::new(LlmClient::new(provider, keys, kiln_config::RateLimitConfig { requests_per_minute: 6000, burst: 10 }, RetryBudget::default()));
		let repo = DocumentRepository::connect(":memory:").await.unwrap();
		ProfileWorker::new(client, repo, "summarize this author", "v1")
	}

	#[tokio::test]
	async fn produces_a_profile_document_keyed_by_author_id() {
		let worker = worker().await;
		let input = ProfileInput { author_id: "author-1".to_string(), recent_contributions: vec!["hello".to_string()] };

		let processed = worker.run(&[input], &CancellationToken::new()).await.unwrap();

		assert_eq!(processed, 1);
		let doc = worker.repo.get("author-1", DocType::Profile).await.unwrap().unwrap();
		assert!(doc.content_body.contains("hello"));
	}

	#[tokio::test]
	async fn updating_an_existing_profile_preserves_created_at() {
		let worker = worker().await;
		let input = ProfileInput { author_id: "author-1".to_string(), recent_contributions: vec!["first".to_string()] };
		worker.run(&[input], &CancellationToken::new()).await.unwrap();
		let first = worker.repo.get("author-1", DocType::Profile).await.unwrap().unwrap();

		let input2 = ProfileInput { author_id: "author-1".to_string(), recent_contributions: vec!["second".to_string()] };
		worker.run(&[input2], &CancellationToken::new()).await.unwrap();
		let second = worker.repo.get("author-1", DocType::Profile).await.unwrap().unwrap();

		assert_eq!(second.created_at, first.created_at);
		assert!(second.updated_at >= first.updated_at);
		assert!(second.content_body.contains("second"));
	}

	#[tokio::test]
	async fn skips_authors_with_no_recent_contributions() {
		let worker = worker().await;
		let input = ProfileInput { author_id: "author-1".to_string(), recent_contributions: vec![] };

		let processed = worker.run(&[input], &CancellationToken::new()).await.unwrap();

		assert_eq!(processed, 0);
	}
}
