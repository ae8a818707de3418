//! Projection between the storage row shape and [`Run`], mirroring the
//! kept-separate mapping used for documents: the SQL and the mapping can
//! each be read on their own.

use chrono::{DateTime, Utc};
use kiln_model::run::{Run, RunStatus};
use sqlx::FromRow;

use crate::error::RunTrackerError;

#[derive(Debug, FromRow)]
pub(crate) struct RunRow {
	pub run_id: String,
	pub config_fingerprint: String,
	pub status: String,
	pub cursor: Option<String>,
	pub started_at: DateTime<Utc>,
	pub finished_at: Option<DateTime<Utc>>,
	pub error_summary: Option<String>,
	pub window_abort_count: i64,
}

impl RunRow {
	pub fn from_run(run: &Run) -> Self {
		Self {
			run_id: run.run_id.clone(),
			config_fingerprint: run.config_fingerprint.clone(),
			status: run.status.as_str().to_string(),
			cursor: run.cursor.clone(),
			started_at: run.started_at,
			finished_at: run.finished_at,
			error_summary: run.error_summary.clone(),
			window_abort_count: run.window_abort_count as i64,
		}
	}

	pub fn into_run(self) -> Result<Run, RunTrackerError> {
		let status = RunStatus::parse(&self.status)
			.ok_or_else(|| RunTrackerError::Corrupt(format!("unknown run status tag {:?}", self.status)))?;
		Ok(Run {
			run_id: self.run_id,
			config_fingerprint: self.config_fingerprint,
			status,
			cursor: self.cursor,
			started_at: self.started_at,
			finished_at: self.finished_at,
			error_summary: self.error_summary,
			window_abort_count: self.window_abort_count.max(0) as u32,
		})
	}
}
