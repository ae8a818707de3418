//! The URL/media enrichment worker: describes a link or media asset via
//! the LLM and persists the description as an `Enrichment` document
//! pointing at the asset through `parent_id`.

use std::collections::BTreeSet;
use std::sync::Arc;

use kiln_llm::{LlmClient, Message, Provider, RequestSettings, Role};
use kiln_model::document::{ContentType, DocType, Document};
use kiln_repo::DocumentRepository;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::EnrichError;
use crate::task::{EnrichmentKind, TaskStore};

/// Batches of this size or larger go through the LLM client's batch
/// submission API; smaller batches go through single-shot calls
/// (`spec.md` §4.7).
const DEFAULT_BATCH_THRESHOLD: usize = 5;

/// Distinct prompts for URL vs. media enrichment, sharing this worker's
/// infrastructure (`spec.md` §4.7).
pub struct EnrichmentPrompts {
	pub url_system_prompt: String,
	pub media_system_prompt: String,
}

/// Worker processing a bounded batch of pending URL/media enrichment
/// tasks per call to [`Self::run`]. Constructed once per pipeline run by
/// the runner and invoked repeatedly between windows — never builds its
/// own `LlmClient` (`spec.md` §4.7's centralized-instantiation rule), it
/// only ever receives one.
pub struct UrlMediaEnricher<P: Provider> {
	client: Arc<LlmClient<P>>,
	repo: DocumentRepository,
	tasks: TaskStore,
	prompts: EnrichmentPrompts,
	prompt_version: String,
	batch_threshold: usize,
	claim_limit: i64,
}

impl<P: Provider> UrlMediaEnricher<P> {
	pub fn new(client: Arc<LlmClient<P>>, repo: DocumentRepository, tasks: TaskStore, prompts: EnrichmentPrompts, prompt_version: impl Into<String>) -> Self {
		Self { client, repo, tasks, prompts, prompt_version: prompt_version.into(), batch_threshold: DEFAULT_BATCH_THRESHOLD, claim_limit: 50 }
	}

	pub fn with_batch_threshold(mut self, threshold: usize) -> Self {
		self.batch_threshold = threshold;
		self
	}

	/// Claims pending tasks of both kinds and enriches them. Returns the
	/// number of tasks that completed successfully (failed items are
	/// recorded in the task store but not counted, matching `run() ->
	/// count_processed` meaning "produced output", per `spec.md` §4.7).
	pub async fn run(&self, cancellation: &CancellationToken) -> Result<usize, EnrichError> {
		let mut processed = 0;
		for kind in [EnrichmentKind::Url, EnrichmentKind::Media] {
			let batch = self.tasks.claim_batch(kind, self.claim_limit).await?;
			if batch.is_empty() {
				continue;
			}
			debug!(kind = ?kind, count = batch.len(), "claimed enrichment batch");
			processed += self.enrich_claimed(kind, batch, cancellation).await?;
		}
		Ok(processed)
	}

	/// Enriches one already-claimed batch of tasks of a single kind,
	/// persisting a successful result as an `Enrichment` document and
	/// recording a per-item failure without aborting the rest.
	async fn enrich_claimed(&self, kind: EnrichmentKind, tasks: Vec<crate::task::EnrichmentTask>, cancellation: &CancellationToken) -> Result<usize, EnrichError> {
		let system_prompt = match kind {
			EnrichmentKind::Url => &self.prompts.url_system_prompt,
			EnrichmentKind::Media => &self.prompts.media_system_prompt,
		};

		let mut processed = 0;
		if tasks.len() >= self.batch_threshold {
			processed += self.enrich_via_batch(system_prompt, &tasks, cancellation).await?;
		} else {
			for task in &tasks {
				match self.enrich_one(system_prompt, task, cancellation).await {
					Ok(doc) => {
						self.repo.upsert(&doc).await?;
						self.tasks.mark_done(&task.id).await?;
						processed += 1;
					}
					Err(err) => {
						warn!(task_id = %task.id, error = %err, "enrichment task failed");
						self.tasks.mark_failed(&task.id, &err.to_string()).await?;
					}
				}
			}
		}
		Ok(processed)
	}

	async fn enrich_one(&self, system_prompt: &str, task: &crate::task::EnrichmentTask, cancellation: &CancellationToken) -> Result<Document, EnrichError> {
		let messages = [Message::new(Role::System, system_prompt), Message::new(Role::User, task.asset_uri.clone())];
		let response = self.client.request(&messages, &RequestSettings::default(), cancellation).await?;
		Ok(self.to_document(task, &response.content))
	}

	async fn enrich_via_batch(&self, system_prompt: &str, tasks: &[crate::task::EnrichmentTask], cancellation: &CancellationToken) -> Result<usize, EnrichError> {
		use kiln_llm::BatchRequest;

		let requests: Vec<BatchRequest> = tasks
			.iter()
			.map(|task| BatchRequest {
				id: task.id.clone(),
				messages: vec![Message::new(Role::System, system_prompt), Message::new(Role::User, task.asset_uri.clone())],
				settings: RequestSettings::default(),
			})
			.collect();

		let handle = self.client.submit_batch(&requests, cancellation).await?;
		let results = loop {
			match self.client.poll(&handle).await? {
				kiln_llm::BatchStatus::Done(results) => break results,
				kiln_llm::BatchStatus::Failed(reason) => {
					for task in tasks {
						self.tasks.mark_failed(&task.id, &reason).await?;
					}
					return Ok(0);
				}
				kiln_llm::BatchStatus::Pending => {
					tokio::task::yield_now().await;
					continue;
				}
			}
		};

		let mut processed = 0;
		let by_id: std::collections::HashMap<_, _> = results.into_iter().map(|r| (r.id.clone(), r)).collect();
		for task in tasks {
			match by_id.get(&task.id) {
				Some(result) => {
					let doc = self.to_document(task, &result.response.content);
					self.repo.upsert(&doc).await?;
					self.tasks.mark_done(&task.id).await?;
					processed += 1;
				}
				None => {
					self.tasks.mark_failed(&task.id, "missing from batch results").await?;
				}
			}
		}
		Ok(processed)
	}

	fn to_document(&self, task: &crate::task::EnrichmentTask, description: &str) -> Document {
		let now = chrono::Utc::now();
		Document::new(
			format!("enrichment:{}", task.id),
			DocType::Enrichment,
			task.asset_uri.clone(),
			now,
			now,
			BTreeSet::new(),
			description.to_string(),
			ContentType::Text,
			task.parent_media_id.clone(),
			None,
			serde_json::Map::from_iter([("prompt_version".to_string(), serde_json::Value::String(self.prompt_version.clone()))]),
		)
		.expect("enrichment ids are always non-empty")
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use async_trait::async_trait;
	use futures::stream::BoxStream;
	use kiln_llm::{ApiKey, BatchHandle, BatchResult, GenerationResponse, KeyRing, ModelKeys, ProviderError, ResponseChunk, RetryBudget};
	use kiln_model::document::DocType;
	use sqlx::SqlitePool;

	use super::*;
	use crate::task::EnrichmentTask;

	struct FakeProvider {
		single_calls: AtomicUsize,
		fail_uris: Vec<String>,
	}

	#[async_trait]
	impl Provider for FakeProvider {
		async fn generate(&self, _key: &ApiKey, _model: &str, messages: &[Message], _settings: &RequestSettings) -> Result<GenerationResponse, ProviderError> {
			self.single_calls.fetch_add(1, Ordering::SeqCst);
			let uri = &messages[1].content;
			if self.fail_uris.contains(uri) {
				return Err(ProviderError::InvalidResponse("could not describe asset".to_string()));
			}
			Ok(GenerationResponse { content: format!("a description of {uri}"), tool_calls: vec![] })
		}
		async fn generate_stream(&self, _key: &ApiKey, _model: &str, _messages: &[Message], _settings: &RequestSettings) -> Result<BoxStream<'static, Result<ResponseChunk, ProviderError>>, ProviderError> {
			unimplemented!()
		}
		async fn submit_batch(&self, _key: &ApiKey, _model: &str, requests: &[kiln_llm::BatchRequest]) -> Result<BatchHandle, ProviderError> {
			Ok(BatchHandle(requests.iter().map(|r| r.id.clone()).collect::<Vec<_>>().join(",")))
		}
		async fn poll_batch(&self, _key: &ApiKey, handle: &BatchHandle) -> Result<kiln_llm::BatchStatus, ProviderError> {
			let results = handle
				.0
				.split(',')
				.map(|id| BatchResult { id: id.to_string(), response: GenerationResponse { content: format!("a description of batch item {id}"), tool_calls: vec![] } })
				.collect();
			Ok(kiln_llm::BatchStatus::Done(results))
		}
		async fn embed(&self, _key: &ApiKey, _model: &str, _texts: &[String], _role: kiln_llm::EmbeddingRole) -> Result<Vec<Vec<f32>>, ProviderError> {
			unimplemented!()
		}
	}

	fn client(fail_uris: Vec<String>) -> Arc<LlmClient<FakeProvider>> {
		let provider = Arc::new(FakeProvider { single_calls: AtomicUsize::new(0), fail_uris });
		let keys = KeyRing::new(vec![ModelKeys { model: "m".to_string(), keys: vec![ApiKey::new("k1", "secret")] }]);
		Arc::new(LlmClient::new(provider, keys, kiln_config::RateLimitConfig { requests_per_minute: 6000, burst: 10 }, RetryBudget::default()))
	}

	async fn enricher(fail_uris: Vec<String>, batch_threshold: usize) -> UrlMediaEnricher<FakeProvider> {
		let repo = DocumentRepository::connect(":memory:").await.unwrap();
		let tasks = TaskStore::from_pool(SqlitePool::connect(":memory:").await.unwrap()).await.unwrap();
		let prompts = EnrichmentPrompts { url_system_prompt: "describe this url".to_string(), media_system_prompt: "describe this media".to_string() };
		UrlMediaEnricher::new(client(fail_uris), repo, tasks, prompts, "v1").with_batch_threshold(batch_threshold)
	}

	#[tokio::test]
	async fn single_calls_below_threshold_persist_enrichment_documents() {
		let enricher = enricher(vec![], 5).await;
		enricher.tasks.enqueue(&[EnrichmentTask { id: "t1".to_string(), kind: EnrichmentKind::Url, asset_uri: "https://a.example".to_string(), parent_media_id: None }]).await.unwrap();

		let processed = enricher.run(&CancellationToken::new()).await.unwrap();

		assert_eq!(processed, 1);
		let doc = enricher.repo.get("enrichment:t1", DocType::Enrichment).await.unwrap().unwrap();
		assert!(doc.content_body.contains("a.example"));
	}

	#[tokio::test]
	async fn failed_task_is_recorded_and_does_not_block_the_rest() {
		let enricher = enricher(vec!["https://bad.example".to_string()], 5).await;
		enricher
			.tasks
			.enqueue(&[
				EnrichmentTask { id: "t1".to_string(), kind: EnrichmentKind::Url, asset_uri: "https://bad.example".to_string(), parent_media_id: None },
				EnrichmentTask { id: "t2".to_string(), kind: EnrichmentKind::Url, asset_uri: "https://good.example".to_string(), parent_media_id: None },
			])
			.await
			.unwrap();

		let processed = enricher.run(&CancellationToken::new()).await.unwrap();

		assert_eq!(processed, 1);
		assert_eq!(enricher.tasks.status("t1").await.unwrap(), Some(crate::task::TaskStatus::Failed("provider returned an unusable response: could not describe asset".to_string())));
		assert_eq!(enricher.tasks.status("t2").await.unwrap(), Some(crate::task::TaskStatus::Done));
	}

	#[tokio::test]
	async fn batch_path_used_at_or_above_threshold() {
		let enricher = enricher(vec![], 2).await;
		enricher
			.tasks
			.enqueue(&[
				EnrichmentTask { id: "t1".to_string(), kind: EnrichmentKind::Url, asset_uri: "https://a.example".to_string(), parent_media_id: None },
				EnrichmentTask { id: "t2".to_string(), kind: EnrichmentKind::Url, asset_uri: "https://b.example".to_string(), parent_media_id: None },
			])
			.await
			.unwrap();

		let processed = enricher.run(&CancellationToken::new()).await.unwrap();

		assert_eq!(processed, 2);
	}

	#[tokio::test]
	async fn empty_task_store_processes_nothing() {
		let enricher = enricher(vec![], 5).await;
		assert_eq!(enricher.run(&CancellationToken::new()).await.unwrap(), 0);
	}
}
