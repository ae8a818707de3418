use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum LlmError {
	#[error(transparent)]
	Provider(#[from] ProviderError),
	#[error("transient provider error after {attempts} attempts: {message}")]
	Transient { message: String, attempts: u32 },
	#[error("request cancelled")]
	Cancelled,
}
