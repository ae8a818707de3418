//! The error taxonomy shared across the pipeline core (`spec.md` §7).
//!
//! Each downstream crate owns its own `thiserror` error enum for the
//! failures specific to its subsystem; this type is the kind-level
//! classification that `kiln-runner` converts those into at the
//! orchestration boundary. Inner crates do not depend on this type.

use thiserror::Error;

/// The kind-level error taxonomy from `spec.md` §7, used by the runner to
/// decide commit/retry/abort policy.
#[derive(Debug, Error)]
pub enum PipelineError {
	/// Adapter yielded malformed entries, config is self-inconsistent, or
	/// a window spec is invalid. The runner aborts the run before any
	/// window is committed.
	#[error("invalid input: {0}")]
	InvalidInput(String),

	/// Network, 5xx, or rate-limit error that exhausted its retry budget.
	#[error("transient provider error after {attempts} attempt(s): {message}")]
	TransientProviderError { message: String, attempts: u32 },

	/// Signalled by the LLM client or detected pre-call; handled by the
	/// runner via window split, not treated as a run failure by itself.
	#[error("prompt too large: estimated {estimated_size} exceeds limit {limit}")]
	PromptTooLarge { estimated_size: usize, limit: usize },

	/// Storage failure. The current window is aborted; the cursor is not
	/// advanced.
	#[error("repository error: {0}")]
	RepositoryError(String),

	/// Unrecoverable: auth failed on all keys, disk full, etc. The run
	/// ends `failed`.
	#[error("fatal error: {0}")]
	Fatal(String),

	/// Cooperative cancellation observed at a suspension point. The run
	/// ends `cancelled`, cursor preserved.
	#[error("run cancelled")]
	Cancelled,
}

impl PipelineError {
	/// Whether this error kind should abort the run outright (as opposed
	/// to failing only the current window, which is recoverable on the
	/// next invocation).
	pub fn is_run_fatal(&self) -> bool {
		matches!(self, PipelineError::InvalidInput(_) | PipelineError::Fatal(_))
	}
}
