//! Content-addressed vector store over [`kiln_model::Document`]s, with
//! asymmetric embeddings: documents are embedded under
//! [`kiln_llm::EmbeddingRole::Document`], queries under
//! [`kiln_llm::EmbeddingRole::Query`]. The two roles are never
//! interchangeable — `search` always asks for `Query`, `index_documents`
//! always asks for `Document` — so mixing them is impossible to express
//! rather than merely discouraged.
//!
//! Which document types get indexed (`PipelineConfig::indexable_types`,
//! default: posts) is a caller-side decision — this crate indexes
//! whatever `Document`s it is handed and has no opinion on `doc_type`.

mod error;
mod key;
mod row;
mod similarity;

pub use error::RagError;
pub use key::embedding_cache_digest;
pub use similarity::cosine_similarity;

use std::sync::Arc;

use chrono::Utc;
use kiln_llm::{EmbeddingRole, LlmClient, Provider};
use kiln_model::document::Document;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::row::{decode_vector, encode_vector};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// One ranked hit from [`RagIndex::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
	pub doc_id: String,
	pub score: f32,
}

/// Vector index backed by a `sqlx::SqlitePool` table, fronted by a
/// rate-limited [`LlmClient`] for embedding calls. Both the bulk indexing
/// path ([`Self::index_documents`]) and the low-latency single-query path
/// ([`Self::search`]) call through the same `client`, so they share its
/// one rate-limiter bucket (`spec.md` §4.4's "dual-queue router ... share
/// the same limiter bucket") without this crate needing its own queueing.
pub struct RagIndex<P: Provider> {
	pool: SqlitePool,
	client: Arc<LlmClient<P>>,
	embedding_model: String,
}

impl<P: Provider> RagIndex<P> {
	/// Opens (creating if necessary) the vector store at `path` and runs
	/// pending migrations.
	pub async fn connect(path: &str, client: Arc<LlmClient<P>>, embedding_model: impl Into<String>) -> Result<Self, RagError> {
		let pool = SqlitePool::connect(path).await?;
		MIGRATOR.run(&pool).await?;
		Ok(Self { pool, client, embedding_model: embedding_model.into() })
	}

	/// Wraps an already-open pool, e.g. the same SQLite file `kiln-repo`
	/// opened, so the vector table lives alongside the documents table
	/// without a second file on disk.
	pub async fn from_pool(pool: SqlitePool, client: Arc<LlmClient<P>>, embedding_model: impl Into<String>) -> Result<Self, RagError> {
		MIGRATOR.run(&pool).await?;
		Ok(Self { pool, client, embedding_model: embedding_model.into() })
	}

	/// The index's current fixed dimensionality, or `None` if nothing has
	/// been indexed yet.
	pub async fn dimensionality(&self) -> Result<Option<i64>, RagError> {
		let row: Option<(i64,)> = sqlx::query_as("SELECT dim FROM index_meta WHERE id = 0").fetch_optional(&self.pool).await?;
		Ok(row.map(|(dim,)| dim))
	}

	/// Embeds and appends/replaces `docs` by `Document::id`, batched
	/// through the bulk embedding path. If an embedding's dimensionality
	/// differs from the index's current dimensionality, the whole index
	/// is rebuilt (every prior vector is now incomparable to the new
	/// ones, so keeping them around would violate the
	/// never-mixed-dimension search invariant).
	#[instrument(skip(self, docs, cancellation), fields(count = docs.len()))]
	pub async fn index_documents(&self, docs: &[Document], cancellation: &CancellationToken) -> Result<(), RagError> {
		if docs.is_empty() {
			return Ok(());
		}
		let texts: Vec<String> = docs.iter().map(|d| d.content_body.clone()).collect();
		let vectors = self.client.embed(&texts, EmbeddingRole::Document, cancellation).await?;

		if let Some(dim) = vectors.first().map(Vec::len) {
			self.ensure_dimensionality(dim as i64).await?;
		}

		let now = Utc::now();
		let mut tx = self.pool.begin().await?;
		for (doc, vector) in docs.iter().zip(vectors) {
			sqlx::query(
				"INSERT INTO vectors (doc_id, dim, embedding, indexed_at) VALUES (?, ?, ?, ?) \
				 ON CONFLICT(doc_id) DO UPDATE SET dim = excluded.dim, embedding = excluded.embedding, indexed_at = excluded.indexed_at",
			)
			.bind(&doc.id)
			.bind(vector.len() as i64)
			.bind(encode_vector(&vector))
			.bind(now)
			.execute(&mut *tx)
			.await?;
		}
		tx.commit().await?;
		Ok(())
	}

	/// Embeds `query` through the single-query low-latency path and
	/// returns at most `top_k` hits scoring at or above `min_similarity`,
	/// ranked highest-first. Only vectors matching the index's current
	/// dimensionality are ever compared (`spec.md` §8 property 5):
	/// nothing else is loaded from storage.
	#[instrument(skip(self, cancellation), fields(top_k, min_similarity))]
	pub async fn search(&self, query: &str, top_k: usize, min_similarity: f32, cancellation: &CancellationToken) -> Result<Vec<SearchHit>, RagError> {
		let Some(dim) = self.dimensionality().await? else {
			debug!("search against an empty index");
			return Ok(Vec::new());
		};

		let query_vectors = self.client.embed(std::slice::from_ref(&query.to_string()), EmbeddingRole::Query, cancellation).await?;
		let query_vector = query_vectors.into_iter().next().expect("embed returns one vector per input text");

		let rows: Vec<(String, Vec<u8>)> = sqlx::query_as("SELECT doc_id, embedding FROM vectors WHERE dim = ?").bind(dim).fetch_all(&self.pool).await?;

		let hits = tokio::task::spawn_blocking(move || -> Result<Vec<SearchHit>, RagError> {
			let mut scored = Vec::with_capacity(rows.len());
			for (doc_id, blob) in rows {
				let vector = decode_vector(&blob)?;
				let score = cosine_similarity(&query_vector, &vector);
				if score >= min_similarity {
					scored.push(SearchHit { doc_id, score });
				}
			}
			scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
			scored.truncate(top_k);
			Ok(scored)
		})
		.await
		.expect("search scoring task never panics")?;

		Ok(hits)
	}

	async fn ensure_dimensionality(&self, dim: i64) -> Result<(), RagError> {
		let current = self.dimensionality().await?;
		if current == Some(dim) {
			return Ok(());
		}
		if current.is_some() {
			debug!(from = ?current, to = dim, "embedding dimensionality changed, rebuilding index");
			sqlx::query("DELETE FROM vectors").execute(&self.pool).await?;
		}
		sqlx::query("INSERT INTO index_meta (id, dim) VALUES (0, ?) ON CONFLICT(id) DO UPDATE SET dim = excluded.dim")
			.bind(dim)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	/// The embedding model name this index was configured with, exposed
	/// so callers building cache keys (`kiln-cache` L2) can fold it into
	/// the index-version hash.
	pub fn embedding_model(&self) -> &str {
		&self.embedding_model
	}
}

#[cfg(test)]
mod tests {
	use async_trait::async_trait;
	use chrono::{DateTime, TimeZone};
	use futures::stream::BoxStream;
	use kiln_llm::{
		ApiKey, BatchHandle, BatchRequest, BatchStatus, GenerationResponse, KeyRing, Message, ModelKeys, ProviderError, RequestSettings, ResponseChunk,
		RetryBudget,
	};
	use kiln_model::document::{ContentType, DocType};
	use pretty_assertions::assert_eq;
	use std::collections::BTreeSet;

	use super::*;

	struct FakeEmbedder {
		dim: usize,
	}

	#[async_trait]
	impl Provider for FakeEmbedder {
		async fn generate(&self, _key: &ApiKey, _model: &str, _messages: &[Message], _settings: &RequestSettings) -> Result<GenerationResponse, ProviderError> {
			unimplemented!()
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
		async fn embed(&self, _key: &ApiKey, _model: &str, texts: &[String], role: EmbeddingRole) -> Result<Vec<Vec<f32>>, ProviderError> {
			// Deterministic pseudo-embedding: first float encodes role so
			// document/query vectors of the same text are never identical.
			let role_bit = match role {
				EmbeddingRole::Document => 0.0,
				EmbeddingRole::Query => 1.0,
			};
			Ok(texts
				.iter()
				.map(|t| {
					let mut v = vec![role_bit];
					v.extend((0..self.dim - 1).map(|i| (t.len() as f32 + i as f32) / 10.0));
					v
				})
				.collect())
		}
	}

	fn client(dim: usize) -> Arc<LlmClient<FakeEmbedder>> {
		let provider = Arc::new(FakeEmbedder { dim });
		let keys = KeyRing::new(vec![ModelKeys { model: "embed-model".to_string(), keys: vec![ApiKey::new("k1", "secret")] }]);
		Arc::new(LlmClient::new(provider, keys, kiln_config::RateLimitConfig { requests_per_minute: 6000, burst: 10 }, RetryBudget::default()))
	}

	fn post(id: &str, body: &str) -> Document {
		let ts: DateTime<Utc> = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
		Document::new(id, DocType::Post, "t", ts, ts, BTreeSet::new(), body, ContentType::Markdown, None, None, serde_json::Map::new()).unwrap()
	}

	#[tokio::test]
	async fn indexes_then_finds_by_similarity() {
		let index = RagIndex::from_pool(SqlitePool::connect(":memory:").await.unwrap(), client(4), "embed-model").await.unwrap();
		let cancellation = CancellationToken::new();
		index.index_documents(&[post("p1", "aaaa"), post("p2", "bb")], &cancellation).await.unwrap();

		let hits = index.search("aaaa", 5, 0.0, &cancellation).await.unwrap();

		assert_eq!(hits.len(), 2);
	}

	#[tokio::test]
	async fn search_respects_min_similarity() {
		let index = RagIndex::from_pool(SqlitePool::connect(":memory:").await.unwrap(), client(4), "embed-model").await.unwrap();
		let cancellation = CancellationToken::new();
		index.index_documents(&[post("p1", "aaaa")], &cancellation).await.unwrap();

		let hits = index.search("aaaa", 5, 1.1, &cancellation).await.unwrap();

		assert!(hits.is_empty());
	}

	#[tokio::test]
	async fn search_respects_top_k() {
		let index = RagIndex::from_pool(SqlitePool::connect(":memory:").await.unwrap(), client(4), "embed-model").await.unwrap();
		let cancellation = CancellationToken::new();
		index
			.index_documents(&[post("p1", "aaaa"), post("p2", "bb"), post("p3", "ccc")], &cancellation)
			.await
			.unwrap();

		let hits = index.search("aaaa", 1, 0.0, &cancellation).await.unwrap();

		assert_eq!(hits.len(), 1);
	}

	#[tokio::test]
	async fn search_on_empty_index_returns_no_hits() {
		let index = RagIndex::from_pool(SqlitePool::connect(":memory:").await.unwrap(), client(4), "embed-model").await.unwrap();
		let cancellation = CancellationToken::new();
		assert!(index.search("anything", 5, 0.0, &cancellation).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn reindexing_with_a_different_dimensionality_rebuilds() {
		let index = RagIndex::from_pool(SqlitePool::connect(":memory:").await.unwrap(), client(4), "embed-model").await.unwrap();
		let cancellation = CancellationToken::new();
		index.index_documents(&[post("p1", "aaaa")], &cancellation).await.unwrap();
		assert_eq!(index.dimensionality().await.unwrap(), Some(4));

		// Simulate a model change by embedding with a different dimensionality
		// directly against the same pool.
		let bigger_client = client(6);
		let bigger_index = RagIndex { pool: index.pool.clone(), client: bigger_client, embedding_model: "embed-model-v2".to_string() };
		bigger_index.index_documents(&[post("p2", "bb")], &cancellation).await.unwrap();

		assert_eq!(bigger_index.dimensionality().await.unwrap(), Some(6));
		let hits = bigger_index.search("bb", 5, 0.0, &cancellation).await.unwrap();
		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].doc_id, "p2");
	}
}
