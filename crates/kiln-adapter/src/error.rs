use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("entry rejected by validation: {0}")]
	InvalidEntry(#[from] kiln_model::entry::EntryValidationError),
	#[error("source error: {0}")]
	Source(String),
}
