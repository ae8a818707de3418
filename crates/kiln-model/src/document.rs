//! The persisted artifact the pipeline core produces and owns: posts,
//! media, enrichments, profiles, banners.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tagged variant distinguishing the kinds of document the repository
/// persists. Replaces the source's runtime `doc_type` string checks
/// (`SPEC_FULL.md` §9) with an exhaustive Rust enum: every `match` on
/// `DocType` is checked by the compiler, standing in for a dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
	Post,
	Media,
	Enrichment,
	Profile,
	Banner,
}

impl DocType {
	/// Stable lowercase tag used as the storage-layer discriminant column
	/// value and in cache keys.
	pub fn as_str(self) -> &'static str {
		match self {
			DocType::Post => "post",
			DocType::Media => "media",
			DocType::Enrichment => "enrichment",
			DocType::Profile => "profile",
			DocType::Banner => "banner",
		}
	}

	/// Parses the storage-layer tag back into a `DocType`.
	pub fn parse(tag: &str) -> Option<Self> {
		match tag {
			"post" => Some(DocType::Post),
			"media" => Some(DocType::Media),
			"enrichment" => Some(DocType::Enrichment),
			"profile" => Some(DocType::Profile),
			"banner" => Some(DocType::Banner),
			_ => None,
		}
	}
}

/// MIME-ish content type for a document's body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
	Text,
	Markdown,
	/// Opaque binary content addressed by a handle (e.g. a path or URI
	/// into blob storage) rather than inlined.
	BinaryHandle(String),
}

impl ContentType {
	pub fn as_mime(&self) -> &str {
		match self {
			ContentType::Text => "text/plain",
			ContentType::Markdown => "text/markdown",
			ContentType::BinaryHandle(_) => "application/octet-stream",
		}
	}
}

/// An artifact persisted by the document repository.
///
/// `(id, doc_type)` is the stable identity. Mutation always rewrites the
/// whole record: there is no partial-update API anywhere in the
/// repository contract (`kiln-repo`), so `Document` has no "dirty field"
/// tracking to get out of sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
	pub id: String,
	pub doc_type: DocType,
	pub title: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub authors: BTreeSet<String>,
	pub content_body: String,
	pub content_type: ContentType,
	/// Optional link to a related document, e.g. enrichment -> media,
	/// banner -> post. Resolved by lookup through the repository, never
	/// walked as an in-memory graph (`SPEC_FULL.md` §9).
	pub parent_id: Option<String>,
	/// Window label this document was produced from, if any.
	pub source_window: Option<String>,
	pub metadata: Map<String, Value>,
	/// Embedding, present only once this document has been indexed by the
	/// RAG index. Its dimensionality must equal the active index's
	/// dimensionality (`kiln-rag` enforces this at insert and query time).
	pub vector: Option<Vec<f32>>,
}

/// Errors raised by [`Document::new`]'s validation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DocumentValidationError {
	/// A document was constructed with no explicit identifier. There is no
	/// smart default: posts must go through [`crate::slug::slugify`] and
	/// other kinds must supply their own stable id.
	#[error("document id must not be empty")]
	EmptyId,
	/// `updated_at` preceded `created_at`.
	#[error("updated_at ({updated_at}) precedes created_at ({created_at})")]
	UpdatedBeforeCreated {
		created_at: DateTime<Utc>,
		updated_at: DateTime<Utc>,
	},
}

impl Document {
	/// Constructs a `Document`, enforcing the identifier and timestamp
	/// invariants from `spec.md` §3.
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		id: impl Into<String>,
		doc_type: DocType,
		title: impl Into<String>,
		created_at: DateTime<Utc>,
		updated_at: DateTime<Utc>,
		authors: BTreeSet<String>,
		content_body: impl Into<String>,
		content_type: ContentType,
		parent_id: Option<String>,
		source_window: Option<String>,
		metadata: Map<String, Value>,
	) -> Result<Self, DocumentValidationError> {
		let id = id.into();
		if id.is_empty() {
			return Err(DocumentValidationError::EmptyId);
		}
		if updated_at < created_at {
			return Err(DocumentValidationError::UpdatedBeforeCreated {
				created_at,
				updated_at,
			});
		}

		Ok(Self {
			id,
			doc_type,
			title: title.into(),
			created_at,
			updated_at,
			authors,
			content_body: content_body.into(),
			content_type,
			parent_id,
			source_window,
			metadata,
			vector: None,
		})
	}

	/// Returns a copy of this document with `vector` attached, validating
	/// that its dimensionality is non-zero. Dimensionality-vs-index-width
	/// agreement is the RAG index's responsibility, not this type's.
	pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
		self.vector = if vector.is_empty() { None } else { Some(vector) };
		self
	}

	/// The `(id, doc_type)` compound key that uniquely identifies this
	/// document (`spec.md` §8 property 2).
	pub fn key(&self) -> (String, DocType) {
		(self.id.clone(), self.doc_type)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn ts(secs: i64) -> DateTime<Utc> {
		DateTime::from_timestamp(secs, 0).unwrap()
	}

	#[test]
	fn rejects_empty_id() {
		let err = Document::new(
			"",
			DocType::Post,
			"t",
			ts(0),
			ts(0),
			BTreeSet::new(),
			"body",
			ContentType::Markdown,
			None,
			None,
			Map::new(),
		)
		.unwrap_err();
		assert_eq!(err, DocumentValidationError::EmptyId);
	}

	#[test]
	fn rejects_updated_before_created() {
		let err = Document::new(
			"id1",
			DocType::Post,
			"t",
			ts(10),
			ts(5),
			BTreeSet::new(),
			"body",
			ContentType::Markdown,
			None,
			None,
			Map::new(),
		)
		.unwrap_err();
		assert!(matches!(
			err,
			DocumentValidationError::UpdatedBeforeCreated { .. }
		));
	}

	#[rstest::rstest]
	#[case::post(DocType::Post)]
	#[case::media(DocType::Media)]
	#[case::enrichment(DocType::Enrichment)]
	#[case::profile(DocType::Profile)]
	#[case::banner(DocType::Banner)]
	fn doc_type_round_trips_through_tag(#[case] dt: DocType) {
		assert_eq!(DocType::parse(dt.as_str()), Some(dt));
	}

	#[test]
	fn with_vector_drops_empty_vectors() {
		let doc = Document::new(
			"id1",
			DocType::Post,
			"t",
			ts(0),
			ts(0),
			BTreeSet::new(),
			"body",
			ContentType::Markdown,
			None,
			None,
			Map::new(),
		)
		.unwrap()
		.with_vector(vec![]);
		assert!(doc.vector.is_none());
	}
}
