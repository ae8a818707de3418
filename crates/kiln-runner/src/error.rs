//! Converts each downstream crate's own error type into
//! `kiln_model::error::PipelineError` at this crate's boundary.
//!
//! These are plain functions, not `From` impls: neither `PipelineError`
//! nor any of the error types below is defined in this crate, so Rust's
//! orphan rule rules out implementing a foreign trait for a foreign type
//! here. Every call site that crosses into a sibling crate maps its
//! error explicitly through one of these.

use kiln_llm::{LlmError, ProviderError};
use kiln_model::error::PipelineError;

pub(crate) fn from_repo(err: kiln_repo::RepositoryError) -> PipelineError {
	PipelineError::RepositoryError(err.to_string())
}

pub(crate) fn from_cache(err: kiln_cache::CacheError) -> PipelineError {
	PipelineError::RepositoryError(err.to_string())
}

pub(crate) fn from_checkpoint(err: kiln_window::CheckpointError) -> PipelineError {
	PipelineError::RepositoryError(err.to_string())
}

pub(crate) fn from_window(err: kiln_window::WindowError) -> PipelineError {
	PipelineError::InvalidInput(err.to_string())
}

pub(crate) fn from_adapter(err: kiln_adapter::AdapterError) -> PipelineError {
	PipelineError::InvalidInput(err.to_string())
}

/// `kiln-runtracker`'s transition-guard errors (`NotFound`,
/// `InvalidTransition`, `CursorRegressed`, a non-terminal `finish`
/// target) only fire when the runner itself drives the tracker out of
/// sequence; they indicate a bug in this crate's orchestration, not a
/// recoverable run-time condition, so they're always fatal.
pub(crate) fn from_runtracker(err: kiln_runtracker::RunTrackerError) -> PipelineError {
	use kiln_runtracker::RunTrackerError as E;
	match err {
		E::Database(_) | E::Migration(_) | E::Corrupt(_) => PipelineError::RepositoryError(err.to_string()),
		E::NotFound(_) | E::InvalidTransition { .. } | E::CursorRegressed { .. } | E::FinishRequiresTerminalStatus(_) => PipelineError::Fatal(err.to_string()),
	}
}

pub(crate) fn from_llm(err: LlmError) -> PipelineError {
	match err {
		LlmError::Cancelled => PipelineError::Cancelled,
		LlmError::Transient { message, attempts } => PipelineError::TransientProviderError { message, attempts },
		LlmError::Provider(provider_err) => from_provider(provider_err),
	}
}

fn from_provider(err: ProviderError) -> PipelineError {
	if err.is_retryable() {
		PipelineError::TransientProviderError { message: err.to_string(), attempts: 1 }
	} else {
		PipelineError::Fatal(err.to_string())
	}
}

pub(crate) fn from_rag(err: kiln_rag::RagError) -> PipelineError {
	use kiln_rag::RagError as E;
	match err {
		E::Database(_) | E::Migration(_) | E::Corrupt(_) => PipelineError::RepositoryError(err.to_string()),
		E::Embedding(llm_err) => from_llm(llm_err),
	}
}

pub(crate) fn from_enrich(err: kiln_enrich::EnrichError) -> PipelineError {
	use kiln_enrich::EnrichError as E;
	match err {
		E::Database(_) | E::Migration(_) | E::Corrupt(_) => PipelineError::RepositoryError(err.to_string()),
		E::Repository(repo_err) => from_repo(repo_err),
		E::Llm(llm_err) => from_llm(llm_err),
	}
}

pub(crate) fn from_writer(err: kiln_writer::WriterError) -> PipelineError {
	use kiln_writer::WriterError as E;
	match err {
		E::Cache(cache_err) => from_cache(cache_err),
		E::Repository(repo_err) => from_repo(repo_err),
		E::Rag(rag_err) => from_rag(rag_err),
		E::Llm(llm_err) => from_llm(llm_err),
		E::Template(_) | E::InvalidResponse(_) | E::InvalidDocument(_) | E::UnknownTool(_) => PipelineError::Fatal(err.to_string()),
		E::DateRangeRejected(_) | E::ToolBudgetExceeded(_) => PipelineError::RepositoryError(err.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn retryable_provider_errors_become_transient() {
		let err = from_provider(ProviderError::Timeout);
		assert!(matches!(err, PipelineError::TransientProviderError { attempts: 1, .. }));
	}

	#[test]
	fn non_retryable_provider_errors_are_fatal() {
		let err = from_provider(ProviderError::Auth("bad key".to_string()));
		assert!(matches!(err, PipelineError::Fatal(_)));
	}

	#[test]
	fn runtracker_cursor_regression_is_fatal() {
		let err = from_runtracker(kiln_runtracker::RunTrackerError::CursorRegressed { current: Some("w1".to_string()), attempted: "w0".to_string() });
		assert!(matches!(err, PipelineError::Fatal(_)));
	}
}
