//! Durable store for generated documents: posts, media, enrichments,
//! profiles, banners. Backed by `sqlx` against SQLite; every query is
//! built with bound parameters and the listing predicate is pushed down
//! into SQL rather than applied after loading rows into memory.

mod error;
mod filter;
mod row;
mod sink;

pub use error::RepositoryError;
pub use filter::{DocumentFilter, OrderBy};
pub use sink::FeedSink;

use kiln_model::document::{DocType, Document};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use tracing::instrument;

use crate::filter::FilterValue;
use crate::row::DocumentRow;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// A connection to the document store, with migrations already applied.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
	pool: SqlitePool,
}

impl DocumentRepository {
	/// Opens (creating if necessary) the SQLite database at `path` and
	/// runs pending migrations.
	pub async fn connect(path: &str) -> Result<Self, RepositoryError> {
		let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
		let pool = SqlitePool::connect_with(options).await?;
		MIGRATOR.run(&pool).await?;
		Ok(Self { pool })
	}

	/// Wraps an already-open pool, running this crate's own pending
	/// migrations against it. Callers sharing one SQLite file across the
	/// document repository, run tracker, and RAG index's `vectors` table
	/// construct the pool once and hand it to each — every `from_pool` runs
	/// its own migrations, so construction order between them doesn't
	/// matter.
	pub async fn from_pool(pool: SqlitePool) -> Result<Self, RepositoryError> {
		MIGRATOR.run(&pool).await?;
		Ok(Self { pool })
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	/// Inserts `document`, or entirely replaces the existing row sharing
	/// its `(id, doc_type)` key. There is no partial-update path: every
	/// field is rewritten, so callers never need to read-modify-write to
	/// avoid clobbering a field they didn't mean to touch.
	#[instrument(skip(self, document), fields(id = %document.id, doc_type = document.doc_type.as_str()))]
	pub async fn upsert(&self, document: &Document) -> Result<(), RepositoryError> {
		let row = DocumentRow::from_document(document)?;
		sqlx::query(
			"INSERT INTO documents \
				(id, doc_type, title, created_at, updated_at, authors, content_body, content_type, parent_id, source_window, metadata, vector) \
				VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
				ON CONFLICT(id, doc_type) DO UPDATE SET \
				title = excluded.title, \
				updated_at = excluded.updated_at, \
				authors = excluded.authors, \
				content_body = excluded.content_body, \
				content_type = excluded.content_type, \
				parent_id = excluded.parent_id, \
				source_window = excluded.source_window, \
				metadata = excluded.metadata, \
				vector = excluded.vector",
		)
		.bind(row.id)
		.bind(row.doc_type)
		.bind(row.title)
		.bind(row.created_at)
		.bind(row.updated_at)
		.bind(row.authors)
		.bind(row.content_body)
		.bind(row.content_type)
		.bind(row.parent_id)
		.bind(row.source_window)
		.bind(row.metadata)
		.bind(row.vector)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	/// Looks up a single document by its compound key.
	#[instrument(skip(self))]
	pub async fn get(&self, id: &str, doc_type: DocType) -> Result<Option<Document>, RepositoryError> {
		let row: Option<DocumentRow> = sqlx::query_as("SELECT * FROM documents WHERE id = ? AND doc_type = ?")
			.bind(id)
			.bind(doc_type.as_str())
			.fetch_optional(&self.pool)
			.await?;
		row.map(DocumentRow::into_document).transpose()
	}

	/// Lists documents matching `filter`, with ordering and limit pushed
	/// down to SQL.
	#[instrument(skip(self, filter))]
	pub async fn list(&self, filter: &DocumentFilter) -> Result<Vec<Document>, RepositoryError> {
		let (tail, binds) = filter.to_sql();
		let sql = format!("SELECT * FROM documents{tail}");
		let mut query = sqlx::query_as::<_, DocumentRow>(&sql);
		for value in binds {
			query = match value {
				FilterValue::Text(s) => query.bind(s),
				FilterValue::Timestamp(ts) => query.bind(ts),
				FilterValue::Limit(n) => query.bind(n),
			};
		}
		let rows = query.fetch_all(&self.pool).await?;
		rows.into_iter().map(DocumentRow::into_document).collect()
	}

	/// Removes the document identified by `(id, doc_type)`, if present.
	/// Deleting a document that doesn't exist is not an error: this
	/// mirrors `get`'s `NotFound` being a recoverable signal rather than
	/// a failure.
	#[instrument(skip(self))]
	pub async fn delete(&self, id: &str, doc_type: DocType) -> Result<(), RepositoryError> {
		sqlx::query("DELETE FROM documents WHERE id = ? AND doc_type = ?")
			.bind(id)
			.bind(doc_type.as_str())
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	/// Convenience built atop [`Self::list`] with `doc_type = post`,
	/// `order_by = updated_at desc` — the feed's "most recent posts"
	/// view, per spec.md §4.2. `updated_at` (not `created_at`) is the
	/// sort key: a re-written post should resurface even if its
	/// `created_at` is old.
	#[instrument(skip(self))]
	pub async fn recent_posts(&self, limit: i64) -> Result<Vec<Document>, RepositoryError> {
		let (tail, binds) = DocumentFilter::new().doc_type(DocType::Post).to_sql();
		let sql = format!("SELECT * FROM documents{tail} ORDER BY updated_at DESC LIMIT ?");
		let mut query = sqlx::query_as::<_, DocumentRow>(&sql);
		for value in binds {
			query = match value {
				FilterValue::Text(s) => query.bind(s),
				FilterValue::Timestamp(ts) => query.bind(ts),
				FilterValue::Limit(n) => query.bind(n),
			};
		}
		query = query.bind(limit);
		let rows = query.fetch_all(&self.pool).await?;
		rows.into_iter().map(DocumentRow::into_document).collect()
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;

	use chrono::{DateTime, Utc};
	use kiln_model::document::ContentType;
	use pretty_assertions::assert_eq;
	use serde_json::Map;

	use super::*;

	async fn in_memory_repo() -> DocumentRepository {
		DocumentRepository::connect(":memory:").await.unwrap()
	}

	fn doc(id: &str, doc_type: DocType, created_at: DateTime<Utc>) -> Document {
		Document::new(id, doc_type, "Title", created_at, created_at, BTreeSet::from(["author".to_string()]), "body", ContentType::Markdown, None, None, Map::new())
			.unwrap()
	}

	#[tokio::test]
	async fn upsert_then_get_round_trips() {
		let repo = in_memory_repo().await;
		let d = doc("post-1", DocType::Post, DateTime::from_timestamp(0, 0).unwrap());
		repo.upsert(&d).await.unwrap();

		let fetched = repo.get("post-1", DocType::Post).await.unwrap().unwrap();
		assert_eq!(fetched.title, "Title");
	}

	#[tokio::test]
	async fn upsert_is_idempotent_and_replaces_fields() {
		let repo = in_memory_repo().await;
		let ts = DateTime::from_timestamp(0, 0).unwrap();
		let mut d = doc("post-1", DocType::Post, ts);
		repo.upsert(&d).await.unwrap();

		d.title = "Updated Title".to_string();
		repo.upsert(&d).await.unwrap();

		let all = repo.list(&DocumentFilter::new().doc_type(DocType::Post)).await.unwrap();
		assert_eq!(all.len(), 1);
		assert_eq!(all[0].title, "Updated Title");
	}

	#[tokio::test]
	async fn same_id_different_doc_type_is_a_distinct_row() {
		let repo = in_memory_repo().await;
		let ts = DateTime::from_timestamp(0, 0).unwrap();
		repo.upsert(&doc("shared-id", DocType::Post, ts)).await.unwrap();
		repo.upsert(&doc("shared-id", DocType::Media, ts)).await.unwrap();

		assert!(repo.get("shared-id", DocType::Post).await.unwrap().is_some());
		assert!(repo.get("shared-id", DocType::Media).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn list_pushes_down_order_and_limit() {
		let repo = in_memory_repo().await;
		for i in 0..5 {
			repo.upsert(&doc(&format!("post-{i}"), DocType::Post, DateTime::from_timestamp(i, 0).unwrap())).await.unwrap();
		}

		let newest_two = repo
			.list(&DocumentFilter::new().doc_type(DocType::Post).order_by(OrderBy::CreatedAtDesc).limit(2))
			.await
			.unwrap();

		assert_eq!(newest_two.len(), 2);
		assert_eq!(newest_two[0].id, "post-4");
		assert_eq!(newest_two[1].id, "post-3");
	}

	#[tokio::test]
	async fn get_missing_document_is_none() {
		let repo = in_memory_repo().await;
		assert!(repo.get("nope", DocType::Post).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn delete_removes_the_document() {
		let repo = in_memory_repo().await;
		let ts = DateTime::from_timestamp(0, 0).unwrap();
		repo.upsert(&doc("post-1", DocType::Post, ts)).await.unwrap();

		repo.delete("post-1", DocType::Post).await.unwrap();

		assert!(repo.get("post-1", DocType::Post).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn delete_missing_document_is_not_an_error() {
		let repo = in_memory_repo().await;
		repo.delete("nope", DocType::Post).await.unwrap();
	}

	#[tokio::test]
	async fn recent_posts_orders_by_updated_at_desc_and_excludes_other_types() {
		let repo = in_memory_repo().await;
		for i in 0..3 {
			repo.upsert(&doc(&format!("post-{i}"), DocType::Post, DateTime::from_timestamp(i, 0).unwrap())).await.unwrap();
		}
		repo.upsert(&doc("media-1", DocType::Media, DateTime::from_timestamp(99, 0).unwrap())).await.unwrap();

		let recent = repo.recent_posts(2).await.unwrap();

		assert_eq!(recent.len(), 2);
		assert_eq!(recent[0].id, "post-2");
		assert_eq!(recent[1].id, "post-1");
	}
}
