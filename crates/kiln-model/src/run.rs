//! The persisted control record for a single pipeline invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`Run`]. `Succeeded`, `Failed` and `Cancelled` are
/// terminal: once reached, the run tracker refuses further transitions
/// (`kiln-runtracker` enforces this, this enum only names the states).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
	Pending,
	Running,
	Succeeded,
	Failed,
	Cancelled,
}

impl RunStatus {
	pub fn is_terminal(self) -> bool {
		matches!(self, RunStatus::Succeeded | RunStatus::Failed | RunStatus::Cancelled)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			RunStatus::Pending => "pending",
			RunStatus::Running => "running",
			RunStatus::Succeeded => "succeeded",
			RunStatus::Failed => "failed",
			RunStatus::Cancelled => "cancelled",
		}
	}

	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"pending" => Some(RunStatus::Pending),
			"running" => Some(RunStatus::Running),
			"succeeded" => Some(RunStatus::Succeeded),
			"failed" => Some(RunStatus::Failed),
			"cancelled" => Some(RunStatus::Cancelled),
			_ => None,
		}
	}
}

/// A single invocation of the pipeline against an archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
	pub run_id: String,
	/// Deterministic hash of the configuration this run was started with.
	/// Used to find a resumable run for the same logical configuration
	/// (see `kiln-runtracker::RunTracker::latest`).
	pub config_fingerprint: String,
	pub status: RunStatus,
	/// Label of the last window this run committed, or `None` before the
	/// first window commits.
	pub cursor: Option<String>,
	pub started_at: DateTime<Utc>,
	pub finished_at: Option<DateTime<Utc>>,
	pub error_summary: Option<String>,
	/// Windows aborted in a row without an intervening commit. Reset to 0
	/// by [`RunStatus::Running`]'s cursor advancing; compared against
	/// `PipelineConfig::window_abort_threshold` to decide whether a
	/// window-scoped failure leaves the run resumable or fails it outright.
	pub window_abort_count: u32,
}

impl Run {
	pub fn new(run_id: impl Into<String>, config_fingerprint: impl Into<String>, started_at: DateTime<Utc>) -> Self {
		Self {
			run_id: run_id.into(),
			config_fingerprint: config_fingerprint.into(),
			status: RunStatus::Pending,
			cursor: None,
			started_at,
			finished_at: None,
			error_summary: None,
			window_abort_count: 0,
		}
	}
}
