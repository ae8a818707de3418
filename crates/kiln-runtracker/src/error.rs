use kiln_model::run::RunStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunTrackerError {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("migration error: {0}")]
	Migration(#[from] sqlx::migrate::MigrateError),
	#[error("stored run is corrupt: {0}")]
	Corrupt(String),
	#[error("no run with id {0:?}")]
	NotFound(String),
	#[error("cannot transition a run from {from:?} to {to:?}")]
	InvalidTransition { from: RunStatus, to: RunStatus },
	#[error("cursor would regress from {current:?} to {attempted:?}")]
	CursorRegressed { current: Option<String>, attempted: String },
	#[error("finish requires a terminal status, got {0:?}")]
	FinishRequiresTerminalStatus(RunStatus),
}
