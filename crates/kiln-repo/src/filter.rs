//! Listing predicate pushed down into SQL rather than applied after
//! loading the whole table: `list` never materializes more rows than the
//! filter and limit allow.

use chrono::{DateTime, Utc};
use kiln_model::document::DocType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
	CreatedAtAsc,
	CreatedAtDesc,
}

/// Filters applied server-side by [`crate::DocumentRepository::list`].
/// Every field is optional; an empty filter lists everything subject to
/// `order_by` and `limit`.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
	pub doc_type: Option<DocType>,
	pub parent_id: Option<String>,
	pub source_window: Option<String>,
	pub created_after: Option<DateTime<Utc>>,
	pub order_by: Option<OrderBy>,
	pub limit: Option<i64>,
}

impl DocumentFilter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn doc_type(mut self, doc_type: DocType) -> Self {
		self.doc_type = Some(doc_type);
		self
	}

	pub fn parent_id(mut self, parent_id: impl Into<String>) -> Self {
		self.parent_id = Some(parent_id.into());
		self
	}

	pub fn source_window(mut self, source_window: impl Into<String>) -> Self {
		self.source_window = Some(source_window.into());
		self
	}

	pub fn created_after(mut self, created_after: DateTime<Utc>) -> Self {
		self.created_after = Some(created_after);
		self
	}

	pub fn order_by(mut self, order_by: OrderBy) -> Self {
		self.order_by = Some(order_by);
		self
	}

	pub fn limit(mut self, limit: i64) -> Self {
		self.limit = Some(limit);
		self
	}

	/// Builds the `WHERE ... ORDER BY ... LIMIT ...` tail and the bind
	/// values in the order they appear, for use with `sqlx::query_as`'s
	/// positional `.bind` chain.
	pub(crate) fn to_sql(&self) -> (String, Vec<FilterValue>) {
		let mut clauses = Vec::new();
		let mut binds = Vec::new();

		if let Some(doc_type) = self.doc_type {
			clauses.push("doc_type = ?".to_string());
			binds.push(FilterValue::Text(doc_type.as_str().to_string()));
		}
		if let Some(parent_id) = &self.parent_id {
			clauses.push("parent_id = ?".to_string());
			binds.push(FilterValue::Text(parent_id.clone()));
		}
		if let Some(source_window) = &self.source_window {
			clauses.push("source_window = ?".to_string());
			binds.push(FilterValue::Text(source_window.clone()));
		}
		if let Some(created_after) = self.created_after {
			clauses.push("created_at > ?".to_string());
			binds.push(FilterValue::Timestamp(created_after));
		}

		let mut sql = String::new();
		if !clauses.is_empty() {
			sql.push_str(" WHERE ");
			sql.push_str(&clauses.join(" AND "));
		}
		match self.order_by {
			Some(OrderBy::CreatedAtAsc) => sql.push_str(" ORDER BY created_at ASC"),
			Some(OrderBy::CreatedAtDesc) => sql.push_str(" ORDER BY created_at DESC"),
			None => {}
		}
		if let Some(limit) = self.limit {
			sql.push_str(" LIMIT ?");
			binds.push(FilterValue::Limit(limit));
		}

		(sql, binds)
	}
}

pub(crate) enum FilterValue {
	Text(String),
	Timestamp(DateTime<Utc>),
	Limit(i64),
}
