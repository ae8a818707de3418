//! The writer's tool surface: `rag_search`, `recent_posts`,
//! `pipeline_metadata`. A small enum dispatched against a
//! runner-supplied [`PipelineContext`] rather than a bag of ad-hoc
//! closures, so every call site the model can make is enumerable and
//! exhaustively matched (`spec.md` §4.8).

use async_trait::async_trait;
use kiln_model::document::Document;
use serde::Serialize;
use serde_json::Value;

use crate::error::WriterError;

/// `pipeline_metadata()`'s return value: a single property, not an
/// ad-hoc dict assembled per call site (`spec.md` §4.8).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineMetadata {
	pub run_id: String,
	pub window_label: String,
	pub config_fingerprint: String,
	pub source: String,
}

/// The runner-supplied context a [`WriterTool`] is dispatched against.
/// Implemented once by `kiln-runner`; this crate only defines the
/// contract and a test double.
#[async_trait]
pub trait PipelineContext: Send + Sync {
	async fn rag_search(&self, query: &str, top_k: usize) -> Result<Vec<Document>, WriterError>;
	async fn recent_posts(&self, limit: i64) -> Result<Vec<Document>, WriterError>;
	fn metadata(&self) -> PipelineMetadata;
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriterTool {
	RagSearch { query: String, top_k: usize },
	RecentPosts { limit: i64 },
	PipelineMetadata,
}

impl WriterTool {
	/// Parses a model-issued tool call by name and JSON arguments. Returns
	/// `None` for anything outside the three-tool surface; the caller
	/// turns that into an explicit [`WriterError::UnknownTool`].
	pub fn parse(name: &str, arguments: &Value) -> Option<Self> {
		match name {
			"rag_search" => Some(WriterTool::RagSearch {
				query: arguments.get("query")?.as_str()?.to_string(),
				top_k: arguments.get("top_k").and_then(Value::as_u64).unwrap_or(5) as usize,
			}),
			"recent_posts" => Some(WriterTool::RecentPosts { limit: arguments.get("limit").and_then(Value::as_i64).unwrap_or(10) }),
			"pipeline_metadata" => Some(WriterTool::PipelineMetadata),
			_ => None,
		}
	}

	pub async fn dispatch(&self, context: &dyn PipelineContext) -> Result<Value, WriterError> {
		let value = match self {
			WriterTool::RagSearch { query, top_k } => serde_json::to_value(context.rag_search(query, *top_k).await?.iter().map(document_summary).collect::<Vec<_>>())?,
			WriterTool::RecentPosts { limit } => serde_json::to_value(context.recent_posts(*limit).await?.iter().map(document_summary).collect::<Vec<_>>())?,
			WriterTool::PipelineMetadata => serde_json::to_value(context.metadata())?,
		};
		Ok(value)
	}
}

fn document_summary(doc: &Document) -> serde_json::Value {
	serde_json::json!({ "id": doc.id, "title": doc.title, "body": doc.content_body })
}
