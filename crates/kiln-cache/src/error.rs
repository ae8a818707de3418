use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
	#[error("cache io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("cache metadata is corrupt: {0}")]
	Serde(#[from] serde_json::Error),
}
