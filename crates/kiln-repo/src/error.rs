use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("migration error: {0}")]
	Migration(#[from] sqlx::migrate::MigrateError),
	#[error("stored document is corrupt: {0}")]
	Corrupt(String),
}
