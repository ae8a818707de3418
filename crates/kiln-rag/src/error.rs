use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("migration error: {0}")]
	Migration(#[from] sqlx::migrate::MigrateError),
	#[error("embedding call failed: {0}")]
	Embedding(#[from] kiln_llm::LlmError),
	#[error("stored vector is corrupt: {0}")]
	Corrupt(String),
}
