use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriterError {
	#[error("cache error: {0}")]
	Cache(#[from] kiln_cache::CacheError),
	#[error("repository error: {0}")]
	Repository(#[from] kiln_repo::RepositoryError),
	#[error("rag error: {0}")]
	Rag(#[from] kiln_rag::RagError),
	#[error("llm call failed: {0}")]
	Llm(#[from] kiln_llm::LlmError),
	#[error("template rendering failed: {0}")]
	Template(#[from] askama::Error),
	#[error("writer response was not valid JSON: {0}")]
	InvalidResponse(#[from] serde_json::Error),
	#[error("generated post failed validation: {0}")]
	InvalidDocument(#[from] kiln_model::document::DocumentValidationError),
	#[error("post date {0:?} looks like a range; a post carries a single canonical date")]
	DateRangeRejected(String),
	#[error("writer exceeded its tool-call budget of {0} iterations without a final answer")]
	ToolBudgetExceeded(usize),
	#[error("writer requested an unknown tool: {0}")]
	UnknownTool(String),
}
