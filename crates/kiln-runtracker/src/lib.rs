//! Durable run tracking (`spec.md` §4.9): every pipeline invocation gets a
//! row in `runs`, advanced in place as windows commit. A second
//! append-only `run_transitions` table records every state change for
//! after-the-fact debugging without being the system of record itself —
//! resumption only ever reads `runs`.
//!
//! Every write here runs inside one sqlx transaction that reads the
//! current row, validates the transition, updates it, and appends the
//! audit row, so a concurrent `advance`/`finish` against the same run
//! can't interleave into a corrupt state.

mod error;
mod row;

use chrono::Utc;
use kiln_model::run::{Run, RunStatus};
use sqlx::SqlitePool;
use uuid::Uuid;

pub use error::RunTrackerError;
use row::RunRow;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// A single audit entry from `run_transitions`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTransition {
	pub status: RunStatus,
	pub cursor: Option<String>,
	pub recorded_at: chrono::DateTime<Utc>,
}

pub struct RunTracker {
	pool: SqlitePool,
}

impl RunTracker {
	pub async fn connect(database_url: &str) -> Result<Self, RunTrackerError> {
		let pool = SqlitePool::connect(database_url).await?;
		MIGRATOR.run(&pool).await?;
		Ok(Self { pool })
	}

	pub async fn from_pool(pool: SqlitePool) -> Result<Self, RunTrackerError> {
		MIGRATOR.run(&pool).await?;
		Ok(Self { pool })
	}

	/// Starts a new run in `pending` status with no cursor. Callers call
	/// [`RunTracker::start`] once the run actually begins executing; the
	/// two are kept distinct so a run can be recorded before its first
	/// window is even fetched.
	pub async fn create_run(&self, config_fingerprint: &str) -> Result<String, RunTrackerError> {
		let run_id = Uuid::new_v4().to_string();
		let run = Run::new(run_id.clone(), config_fingerprint, Utc::now());
		let row = RunRow::from_run(&run);

		let mut tx = self.pool.begin().await?;
		sqlx::query(
			"INSERT INTO runs (run_id, config_fingerprint, status, cursor, started_at, finished_at, error_summary, window_abort_count) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(&row.run_id)
		.bind(&row.config_fingerprint)
		.bind(&row.status)
		.bind(&row.cursor)
		.bind(row.started_at)
		.bind(row.finished_at)
		.bind(&row.error_summary)
		.bind(row.window_abort_count)
		.execute(&mut *tx)
		.await?;
		record_transition(&mut tx, &run_id, RunStatus::Pending, None).await?;
		tx.commit().await?;

		tracing::info!(run_id = %run_id, config_fingerprint, "run created");
		Ok(run_id)
	}

	/// Transitions a run from `pending` to `running`.
	pub async fn start(&self, run_id: &str) -> Result<(), RunTrackerError> {
		let mut tx = self.pool.begin().await?;
		let current = fetch_run(&mut tx, run_id).await?;
		if current.status != RunStatus::Pending {
			return Err(RunTrackerError::InvalidTransition { from: current.status, to: RunStatus::Running });
		}

		sqlx::query("UPDATE runs SET status = ? WHERE run_id = ?")
			.bind(RunStatus::Running.as_str())
			.bind(run_id)
			.execute(&mut *tx)
			.await?;
		record_transition(&mut tx, run_id, RunStatus::Running, current.cursor.clone()).await?;
		tx.commit().await?;
		Ok(())
	}

	/// Atomically advances the run's cursor to `window_label`. The cursor
	/// must strictly increase under lexicographic ordering: window labels
	/// are timestamp-sortable strings (`kiln-window`'s labels), so a
	/// non-increasing label means either a replayed commit or an
	/// out-of-order caller, both of which should fail loudly rather than
	/// silently rewind progress.
	pub async fn advance(&self, run_id: &str, window_label: &str) -> Result<(), RunTrackerError> {
		let mut tx = self.pool.begin().await?;
		let current = fetch_run(&mut tx, run_id).await?;
		if current.status != RunStatus::Running {
			return Err(RunTrackerError::InvalidTransition { from: current.status, to: RunStatus::Running });
		}
		if let Some(cursor) = &current.cursor {
			if window_label <= cursor.as_str() {
				return Err(RunTrackerError::CursorRegressed { current: Some(cursor.clone()), attempted: window_label.to_string() });
			}
		}

		sqlx::query("UPDATE runs SET cursor = ?, window_abort_count = 0 WHERE run_id = ?")
			.bind(window_label)
			.bind(run_id)
			.execute(&mut *tx)
			.await?;
		record_transition(&mut tx, run_id, RunStatus::Running, Some(window_label.to_string())).await?;
		tx.commit().await?;
		Ok(())
	}

	/// Records a window-scoped abort (a `PipelineError` that isn't
	/// [`kiln_model::error::PipelineError::is_run_fatal`]) without ending the
	/// run, and returns the new consecutive-abort count. The count resets
	/// to 0 the next time [`RunTracker::advance`] commits a window, so it
	/// only ever measures a streak of failures with no progress between
	/// them.
	pub async fn record_window_abort(&self, run_id: &str) -> Result<u32, RunTrackerError> {
		let mut tx = self.pool.begin().await?;
		let current = fetch_run(&mut tx, run_id).await?;
		if current.status != RunStatus::Running {
			return Err(RunTrackerError::InvalidTransition { from: current.status, to: RunStatus::Running });
		}

		let next = current.window_abort_count + 1;
		sqlx::query("UPDATE runs SET window_abort_count = ? WHERE run_id = ?").bind(next as i64).bind(run_id).execute(&mut *tx).await?;
		record_transition(&mut tx, run_id, RunStatus::Running, current.cursor.clone()).await?;
		tx.commit().await?;
		Ok(next)
	}

	/// Transitions a run into a terminal state. Refuses to finish a run
	/// that's already terminal, and refuses a non-terminal target status
	/// (finishing always means "this run is over").
	pub async fn finish(&self, run_id: &str, status: RunStatus, error_summary: Option<String>) -> Result<(), RunTrackerError> {
		if !status.is_terminal() {
			return Err(RunTrackerError::FinishRequiresTerminalStatus(status));
		}

		let mut tx = self.pool.begin().await?;
		let current = fetch_run(&mut tx, run_id).await?;
		if current.status.is_terminal() {
			return Err(RunTrackerError::InvalidTransition { from: current.status, to: status });
		}

		let finished_at = Utc::now();
		sqlx::query("UPDATE runs SET status = ?, finished_at = ?, error_summary = ? WHERE run_id = ?")
			.bind(status.as_str())
			.bind(finished_at)
			.bind(&error_summary)
			.bind(run_id)
			.execute(&mut *tx)
			.await?;
		record_transition(&mut tx, run_id, status, current.cursor.clone()).await?;
		tx.commit().await?;

		if let Some(ref summary) = error_summary {
			tracing::warn!(run_id, status = status.as_str(), error = summary, "run finished with error");
		} else {
			tracing::info!(run_id, status = status.as_str(), "run finished");
		}
		Ok(())
	}

	pub async fn get(&self, run_id: &str) -> Result<Option<Run>, RunTrackerError> {
		let row = sqlx::query_as::<_, RunRow>("SELECT * FROM runs WHERE run_id = ?").bind(run_id).fetch_optional(&self.pool).await?;
		row.map(RunRow::into_run).transpose()
	}

	/// The most recently started run for a given configuration
	/// fingerprint, used to decide whether a pipeline invocation should
	/// resume or start from scratch (`kiln-config::ResumeMode`).
	pub async fn latest(&self, config_fingerprint: &str) -> Result<Option<Run>, RunTrackerError> {
		let row = sqlx::query_as::<_, RunRow>("SELECT * FROM runs WHERE config_fingerprint = ? ORDER BY started_at DESC LIMIT 1")
			.bind(config_fingerprint)
			.fetch_optional(&self.pool)
			.await?;
		row.map(RunRow::into_run).transpose()
	}

	/// The full transition history for a run, oldest first. For debugging
	/// and tests; the pipeline itself never reads this table.
	pub async fn transitions(&self, run_id: &str) -> Result<Vec<RunTransition>, RunTrackerError> {
		let rows: Vec<(String, Option<String>, chrono::DateTime<Utc>)> =
			sqlx::query_as("SELECT status, cursor, recorded_at FROM run_transitions WHERE run_id = ? ORDER BY id ASC").bind(run_id).fetch_all(&self.pool).await?;
		rows.into_iter()
			.map(|(status, cursor, recorded_at)| {
				let status = RunStatus::parse(&status).ok_or_else(|| RunTrackerError::Corrupt(format!("unknown run status tag {status:?}")))?;
				Ok(RunTransition { status, cursor, recorded_at })
			})
			.collect()
	}
}

async fn fetch_run(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, run_id: &str) -> Result<Run, RunTrackerError> {
	let row = sqlx::query_as::<_, RunRow>("SELECT * FROM runs WHERE run_id = ?")
		.bind(run_id)
		.fetch_optional(&mut **tx)
		.await?
		.ok_or_else(|| RunTrackerError::NotFound(run_id.to_string()))?;
	row.into_run()
}

async fn record_transition(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, run_id: &str, status: RunStatus, cursor: Option<String>) -> Result<(), RunTrackerError> {
	sqlx::query("INSERT INTO run_transitions (run_id, status, cursor, recorded_at) VALUES (?, ?, ?, ?)")
		.bind(run_id)
		.bind(status.as_str())
		.bind(cursor)
		.bind(Utc::now())
		.execute(&mut **tx)
		.await?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	async fn tracker() -> RunTracker {
		let pool = SqlitePool::connect(":memory:").await.unwrap();
		RunTracker::from_pool(pool).await.unwrap()
	}

	#[tokio::test]
	async fn creating_a_run_starts_pending_with_no_cursor() {
		let tracker = tracker().await;
		let run_id = tracker.create_run("fp-1").await.unwrap();

		let run = tracker.get(&run_id).await.unwrap().unwrap();
		assert_eq!(run.status, RunStatus::Pending);
		assert_eq!(run.cursor, None);
	}

	#[tokio::test]
	async fn the_full_lifecycle_advances_and_finishes() {
		let tracker = tracker().await;
		let run_id = tracker.create_run("fp-1").await.unwrap();

		tracker.start(&run_id).await.unwrap();
		tracker.advance(&run_id, "w0001").await.unwrap();
		tracker.advance(&run_id, "w0002").await.unwrap();
		tracker.finish(&run_id, RunStatus::Succeeded, None).await.unwrap();

		let run = tracker.get(&run_id).await.unwrap().unwrap();
		assert_eq!(run.status, RunStatus::Succeeded);
		assert_eq!(run.cursor, Some("w0002".to_string()));
		assert!(run.finished_at.is_some());

		let transitions = tracker.transitions(&run_id).await.unwrap();
		assert_eq!(transitions.len(), 4);
		assert_eq!(transitions[0].status, RunStatus::Pending);
		assert_eq!(transitions.last().unwrap().status, RunStatus::Succeeded);
	}

	#[tokio::test]
	async fn advancing_before_start_is_rejected() {
		let tracker = tracker().await;
		let run_id = tracker.create_run("fp-1").await.unwrap();

		let err = tracker.advance(&run_id, "w0001").await.unwrap_err();
		assert!(matches!(err, RunTrackerError::InvalidTransition { from: RunStatus::Pending, to: RunStatus::Running }));
	}

	#[tokio::test]
	async fn a_non_increasing_cursor_is_rejected() {
		let tracker = tracker().await;
		let run_id = tracker.create_run("fp-1").await.unwrap();
		tracker.start(&run_id).await.unwrap();
		tracker.advance(&run_id, "w0005").await.unwrap();

		let err = tracker.advance(&run_id, "w0003").await.unwrap_err();
		assert!(matches!(err, RunTrackerError::CursorRegressed { .. }));

		let err = tracker.advance(&run_id, "w0005").await.unwrap_err();
		assert!(matches!(err, RunTrackerError::CursorRegressed { .. }));
	}

	#[tokio::test]
	async fn finishing_twice_is_rejected() {
		let tracker = tracker().await;
		let run_id = tracker.create_run("fp-1").await.unwrap();
		tracker.start(&run_id).await.unwrap();
		tracker.finish(&run_id, RunStatus::Failed, Some("boom".to_string())).await.unwrap();

		let err = tracker.finish(&run_id, RunStatus::Succeeded, None).await.unwrap_err();
		assert!(matches!(err, RunTrackerError::InvalidTransition { from: RunStatus::Failed, to: RunStatus::Succeeded }));
	}

	#[tokio::test]
	async fn finish_requires_a_terminal_status() {
		let tracker = tracker().await;
		let run_id = tracker.create_run("fp-1").await.unwrap();
		tracker.start(&run_id).await.unwrap();

		let err = tracker.finish(&run_id, RunStatus::Running, None).await.unwrap_err();
		assert!(matches!(err, RunTrackerError::FinishRequiresTerminalStatus(RunStatus::Running)));
	}

	#[tokio::test]
	async fn latest_returns_the_most_recently_started_run_for_a_fingerprint() {
		let tracker = tracker().await;
		let first = tracker.create_run("fp-1").await.unwrap();
		let second = tracker.create_run("fp-1").await.unwrap();
		tracker.create_run("fp-other").await.unwrap();

		let latest = tracker.latest("fp-1").await.unwrap().unwrap();
		assert!(latest.run_id == first || latest.run_id == second);
		assert_eq!(latest.config_fingerprint, "fp-1");
	}

	#[tokio::test]
	async fn latest_returns_none_for_an_unknown_fingerprint() {
		let tracker = tracker().await;
		assert_eq!(tracker.latest("nope").await.unwrap(), None);
	}

	#[tokio::test]
	async fn window_aborts_accumulate_and_reset_on_advance() {
		let tracker = tracker().await;
		let run_id = tracker.create_run("fp-1").await.unwrap();
		tracker.start(&run_id).await.unwrap();

		assert_eq!(tracker.record_window_abort(&run_id).await.unwrap(), 1);
		assert_eq!(tracker.record_window_abort(&run_id).await.unwrap(), 2);

		tracker.advance(&run_id, "w0001").await.unwrap();
		let run = tracker.get(&run_id).await.unwrap().unwrap();
		assert_eq!(run.window_abort_count, 0);

		assert_eq!(tracker.record_window_abort(&run_id).await.unwrap(), 1);
	}

	#[tokio::test]
	async fn recording_an_abort_before_start_is_rejected() {
		let tracker = tracker().await;
		let run_id = tracker.create_run("fp-1").await.unwrap();

		let err = tracker.record_window_abort(&run_id).await.unwrap_err();
		assert!(matches!(err, RunTrackerError::InvalidTransition { from: RunStatus::Pending, to: RunStatus::Running }));
	}
}
