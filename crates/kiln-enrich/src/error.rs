use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("migration error: {0}")]
	Migration(#[from] sqlx::migrate::MigrateError),
	#[error("llm call failed: {0}")]
	Llm(#[from] kiln_llm::LlmError),
	#[error("repository error: {0}")]
	Repository(#[from] kiln_repo::RepositoryError),
	#[error("task store row is corrupt: {0}")]
	Corrupt(String),
}
