//! Durable per-item tracking for enrichment work. `spec.md` §4.7/§7
//! require that a per-item failure inside a batch is recorded and the
//! worker continues — this module gives that record a storage shape
//! (an Open Question the distilled spec left unresolved, decided in
//! `DESIGN.md`: a SQLite table, not an in-memory map, so a crash
//! mid-batch never silently loses a failure reason).

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::EnrichError;

/// Which enrichment an [`EnrichmentTask`] asks for. URL and media
/// enrichment share a worker and infrastructure but use distinct
/// prompts (`spec.md` §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentKind {
	Url,
	Media,
}

impl EnrichmentKind {
	fn as_str(self) -> &'static str {
		match self {
			EnrichmentKind::Url => "url",
			EnrichmentKind::Media => "media",
		}
	}

	fn parse(s: &str) -> Option<Self> {
		match s {
			"url" => Some(EnrichmentKind::Url),
			"media" => Some(EnrichmentKind::Media),
			_ => None,
		}
	}
}

/// One unit of enrichment work: a raw link or media handle to describe.
/// Plain data — the worker that consumes this never inspects a
/// heavyweight domain object to decide whether to process it
/// (`spec.md` §4.7's data-in/data-out contract).
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentTask {
	pub id: String,
	pub kind: EnrichmentKind,
	pub asset_uri: String,
	/// The media document this enrichment's resulting document should
	/// point at via `parent_id`, if this task concerns media rather than
	/// a bare link.
	pub parent_media_id: Option<String>,
}

/// The status lifecycle a task store tracks per task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
	Pending,
	InFlight,
	Done,
	Failed(String),
}

/// Durable queue of [`EnrichmentTask`]s, backed by a `sqlx::SqlitePool`
/// table. `claim_batch` and the `mark_*` methods are the only mutators;
/// nothing else writes `status`.
#[derive(Clone)]
pub struct TaskStore {
	pool: SqlitePool,
}

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

impl TaskStore {
	pub async fn connect(path: &str) -> Result<Self, EnrichError> {
		let pool = SqlitePool::connect(path).await?;
		MIGRATOR.run(&pool).await?;
		Ok(Self { pool })
	}

	pub async fn from_pool(pool: SqlitePool) -> Result<Self, EnrichError> {
		MIGRATOR.run(&pool).await?;
		Ok(Self { pool })
	}

	/// Adds `tasks` as `pending`. Re-enqueuing a task with an id already
	/// present resets it back to `pending`, so a caller can safely retry
	/// a previously failed asset by enqueuing it again under the same id.
	pub async fn enqueue(&self, tasks: &[EnrichmentTask]) -> Result<(), EnrichError> {
		let now = Utc::now();
		let mut tx = self.pool.begin().await?;
		for task in tasks {
			sqlx::query(
				"INSERT INTO enrichment_tasks (id, kind, asset_uri, parent_media_id, status, error_reason, created_at, updated_at) \
				 VALUES (?, ?, ?, ?, 'pending', NULL, ?, ?) \
				 ON CONFLICT(id) DO UPDATE SET status = 'pending', error_reason = NULL, updated_at = excluded.updated_at",
			)
			.bind(&task.id)
			.bind(task.kind.as_str())
			.bind(&task.asset_uri)
			.bind(&task.parent_media_id)
			.bind(now)
			.bind(now)
			.execute(&mut *tx)
			.await?;
		}
		tx.commit().await?;
		Ok(())
	}

	/// Claims up to `limit` pending tasks of `kind`, marking them
	/// `in_flight` so a concurrent caller never double-claims the same
	/// row.
	pub async fn claim_batch(&self, kind: EnrichmentKind, limit: i64) -> Result<Vec<EnrichmentTask>, EnrichError> {
		let now = Utc::now();
		let rows: Vec<(String, String, Option<String>)> = sqlx::query_as(
			"SELECT id, asset_uri, parent_media_id FROM enrichment_tasks WHERE kind = ? AND status = 'pending' ORDER BY created_at ASC LIMIT ?",
		)
		.bind(kind.as_str())
		.bind(limit)
		.fetch_all(&self.pool)
		.await?;

		let mut tx = self.pool.begin().await?;
		for (id, _, _) in &rows {
			sqlx::query("UPDATE enrichment_tasks SET status = 'in_flight', updated_at = ? WHERE id = ?").bind(now).bind(id).execute(&mut *tx).await?;
		}
		tx.commit().await?;

		Ok(rows.into_iter().map(|(id, asset_uri, parent_media_id)| EnrichmentTask { id, kind, asset_uri, parent_media_id }).collect())
	}

	pub async fn mark_done(&self, task_id: &str) -> Result<(), EnrichError> {
		sqlx::query("UPDATE enrichment_tasks SET status = 'done', error_reason = NULL, updated_at = ? WHERE id = ?")
			.bind(Utc::now())
			.bind(task_id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	/// Records a per-item failure. Per `spec.md` §4.7/§7, this never
	/// aborts a batch — callers keep processing the remaining tasks.
	pub async fn mark_failed(&self, task_id: &str, reason: &str) -> Result<(), EnrichError> {
		sqlx::query("UPDATE enrichment_tasks SET status = 'failed', error_reason = ?, updated_at = ? WHERE id = ?")
			.bind(reason)
			.bind(Utc::now())
			.bind(task_id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn status(&self, task_id: &str) -> Result<Option<TaskStatus>, EnrichError> {
		let row: Option<(String, Option<String>)> = sqlx::query_as("SELECT status, error_reason FROM enrichment_tasks WHERE id = ?")
			.bind(task_id)
			.fetch_optional(&self.pool)
			.await?;
		row.map(|(status, reason)| status_from_row(&status, reason)).transpose()
	}

	pub async fn count_pending(&self, kind: EnrichmentKind) -> Result<i64, EnrichError> {
		let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM enrichment_tasks WHERE kind = ? AND status = 'pending'")
			.bind(kind.as_str())
			.fetch_one(&self.pool)
			.await?;
		Ok(row.0)
	}
}

fn status_from_row(status: &str, reason: Option<String>) -> Result<TaskStatus, EnrichError> {
	match status {
		"pending" => Ok(TaskStatus::Pending),
		"in_flight" => Ok(TaskStatus::InFlight),
		"done" => Ok(TaskStatus::Done),
		"failed" => Ok(TaskStatus::Failed(reason.unwrap_or_default())),
		other => Err(EnrichError::Corrupt(format!("unknown task status {other:?}"))),
	}
}
