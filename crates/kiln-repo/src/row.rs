//! Projection between the storage row shape and [`Document`]. Kept as
//! pure, separately-testable functions rather than inline in the query
//! call sites, so the SQL and the mapping can each be read on their own.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use kiln_model::document::{ContentType, DocType, Document};
use serde_json::{Map, Value};
use sqlx::FromRow;

use crate::error::RepositoryError;

#[derive(Debug, FromRow)]
pub(crate) struct DocumentRow {
	pub id: String,
	pub doc_type: String,
	pub title: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub authors: String,
	pub content_body: String,
	pub content_type: String,
	pub parent_id: Option<String>,
	pub source_window: Option<String>,
	pub metadata: String,
	pub vector: Option<Vec<u8>>,
}

impl DocumentRow {
	pub fn from_document(doc: &Document) -> Result<Self, RepositoryError> {
		Ok(Self {
			id: doc.id.clone(),
			doc_type: doc.doc_type.as_str().to_string(),
			title: doc.title.clone(),
			created_at: doc.created_at,
			updated_at: doc.updated_at,
			authors: serde_json::to_string(&doc.authors).map_err(|e| RepositoryError::Corrupt(e.to_string()))?,
			content_body: doc.content_body.clone(),
			content_type: encode_content_type(&doc.content_type),
			parent_id: doc.parent_id.clone(),
			source_window: doc.source_window.clone(),
			metadata: serde_json::to_string(&doc.metadata).map_err(|e| RepositoryError::Corrupt(e.to_string()))?,
			vector: doc.vector.as_ref().map(|v| encode_vector(v)),
		})
	}

	pub fn into_document(self) -> Result<Document, RepositoryError> {
		let doc_type = DocType::parse(&self.doc_type)
			.ok_or_else(|| RepositoryError::Corrupt(format!("unknown doc_type tag {:?}", self.doc_type)))?;
		let authors: BTreeSet<String> =
			serde_json::from_str(&self.authors).map_err(|e| RepositoryError::Corrupt(e.to_string()))?;
		let metadata: Map<String, Value> =
			serde_json::from_str(&self.metadata).map_err(|e| RepositoryError::Corrupt(e.to_string()))?;
		let content_type = decode_content_type(&self.content_type)?;

		let mut doc = Document::new(
			self.id,
			doc_type,
			self.title,
			self.created_at,
			self.updated_at,
			authors,
			self.content_body,
			content_type,
			self.parent_id,
			self.source_window,
			metadata,
		)
		.map_err(|e| RepositoryError::Corrupt(e.to_string()))?;

		if let Some(bytes) = self.vector {
			doc = doc.with_vector(decode_vector(&bytes)?);
		}
		Ok(doc)
	}
}

fn encode_content_type(content_type: &ContentType) -> String {
	match content_type {
		ContentType::Text => "text".to_string(),
		ContentType::Markdown => "markdown".to_string(),
		ContentType::BinaryHandle(handle) => format!("binary:{handle}"),
	}
}

fn decode_content_type(tag: &str) -> Result<ContentType, RepositoryError> {
	match tag {
		"text" => Ok(ContentType::Text),
		"markdown" => Ok(ContentType::Markdown),
		other => other
			.strip_prefix("binary:")
			.map(|handle| ContentType::BinaryHandle(handle.to_string()))
			.ok_or_else(|| RepositoryError::Corrupt(format!("unknown content_type tag {other:?}"))),
	}
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
	vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>, RepositoryError> {
	if bytes.len() % 4 != 0 {
		return Err(RepositoryError::Corrupt(format!("vector blob length {} is not a multiple of 4", bytes.len())));
	}
	Ok(bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect())
}

#[cfg(test)]
mod tests {
	use chrono::TimeZone;

	use super::*;

	fn sample_document() -> Document {
		let mut authors = BTreeSet::new();
		authors.insert("alice".to_string());
		let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
		Document::new("post-1", DocType::Post, "Title", ts, ts, authors, "body", ContentType::Markdown, None, Some("w0000".to_string()), Map::new())
			.unwrap()
			.with_vector(vec![0.5, -0.25, 1.0])
	}

	#[test]
	fn round_trips_through_row() {
		let doc = sample_document();
		let row = DocumentRow::from_document(&doc).unwrap();
		let restored = row.into_document().unwrap();

		assert_eq!(restored.id, doc.id);
		assert_eq!(restored.authors, doc.authors);
		assert_eq!(restored.content_type, doc.content_type);
		assert_eq!(restored.vector, doc.vector);
	}

	#[test]
	fn binary_handle_round_trips() {
		let tag = encode_content_type(&ContentType::BinaryHandle("blob/abc".to_string()));
		assert_eq!(decode_content_type(&tag).unwrap(), ContentType::BinaryHandle("blob/abc".to_string()));
	}

	#[test]
	fn rejects_unknown_doc_type_tag() {
		let mut row = DocumentRow::from_document(&sample_document()).unwrap();
		row.doc_type = "bogus".to_string();
		let err = row.into_document().unwrap_err();
		assert!(matches!(err, RepositoryError::Corrupt(_)));
	}

	#[test]
	fn rejects_truncated_vector_blob() {
		let err = decode_vector(&[0u8, 1, 2]).unwrap_err();
		assert!(matches!(err, RepositoryError::Corrupt(_)));
	}
}
