//! The runner's implementation of the writer's tool surface
//! (`kiln_writer::PipelineContext`): `rag_search` and `recent_posts`
//! wired to the live RAG index and document repository, `metadata` a
//! plain value built fresh for each window.

use std::sync::Arc;

use async_trait::async_trait;
use kiln_llm::Provider;
use kiln_model::document::{DocType, Document};
use kiln_rag::RagIndex;
use kiln_repo::DocumentRepository;
use kiln_writer::{PipelineContext, PipelineMetadata, WriterError};
use tokio_util::sync::CancellationToken;

/// `rag_search` doesn't expose a similarity floor as a tool parameter
/// (`spec.md` §4.8 names only `query`); ranking and `top_k` do the
/// filtering instead.
const TOOL_MIN_SIMILARITY: f32 = 0.0;

pub(crate) struct RunnerContext<P: Provider> {
	rag: Arc<RagIndex<P>>,
	repo: DocumentRepository,
	metadata: PipelineMetadata,
	cancellation: CancellationToken,
}

impl<P: Provider> RunnerContext<P> {
	pub(crate) fn new(rag: Arc<RagIndex<P>>, repo: DocumentRepository, metadata: PipelineMetadata, cancellation: CancellationToken) -> Self {
		Self { rag, repo, metadata, cancellation }
	}
}

#[async_trait]
impl<P: Provider> PipelineContext for RunnerContext<P> {
	async fn rag_search(&self, query: &str, top_k: usize) -> Result<Vec<Document>, WriterError> {
		let hits = self.rag.search(query, top_k, TOOL_MIN_SIMILARITY, &self.cancellation).await?;
		let mut documents = Vec::with_capacity(hits.len());
		for hit in hits {
			if let Some(doc) = self.repo.get(&hit.doc_id, DocType::Post).await? {
				documents.push(doc);
			}
		}
		Ok(documents)
	}

	async fn recent_posts(&self, limit: i64) -> Result<Vec<Document>, WriterError> {
		Ok(self.repo.recent_posts(limit).await?)
	}

	fn metadata(&self) -> PipelineMetadata {
		self.metadata.clone()
	}
}
