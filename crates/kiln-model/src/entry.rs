//! The atomic input unit consumed from a source adapter.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single atomic input item from an adapter, modeled on the Atom entry.
///
/// Entries are produced exclusively by [`crate::error`]-fallible adapter
/// code (see `kiln-adapter`); this type itself performs no anonymization —
/// by the time an `Entry` exists, its `author_id` is already the adapter's
/// anonymized identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
	/// Stable string identifier, unique within `source`.
	pub id: String,
	/// Identifier of the originating adapter plus its namespace, e.g.
	/// `"whatsapp:family-group"`.
	pub source: String,
	/// Timezone-aware instant, always UTC.
	pub timestamp: DateTime<Utc>,
	/// Opaque identifier produced by the adapter's anonymization boundary.
	pub author_id: String,
	/// Optional alias; never carries raw PII beyond what the adapter chose
	/// to expose.
	pub author_display: Option<String>,
	/// Entry text, may contain inline tokens such as mention references.
	pub content: String,
	/// Ordered references to media assets (URIs or content-addressed
	/// handles).
	pub media_refs: Vec<String>,
	/// Links extracted from `content`.
	pub links: Vec<String>,
	/// Opaque, source-specific fields that don't fit the canonical model.
	pub extensions: BTreeMap<String, Value>,
}

/// Errors raised by [`Entry::new`]'s validation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EntryValidationError {
	/// `id` was empty.
	#[error("entry id must not be empty")]
	EmptyId,
	/// `source` was empty.
	#[error("entry source must not be empty")]
	EmptySource,
	/// `author_id` was empty.
	#[error("entry author_id must not be empty")]
	EmptyAuthorId,
}

impl Entry {
	/// Constructs an `Entry`, validating the required identifier fields.
	///
	/// There is no "smart default" path: callers that omit `id`, `source`,
	/// or `author_id` get a validation error rather than a generated
	/// placeholder, matching the `Document` factory's rejection of
	/// implicit identifiers (see [`crate::document::Document::new`]).
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		id: impl Into<String>,
		source: impl Into<String>,
		timestamp: DateTime<Utc>,
		author_id: impl Into<String>,
		author_display: Option<String>,
		content: impl Into<String>,
		media_refs: Vec<String>,
		links: Vec<String>,
		extensions: BTreeMap<String, Value>,
	) -> Result<Self, EntryValidationError> {
		let id = id.into();
		let source = source.into();
		let author_id = author_id.into();

		if id.is_empty() {
			return Err(EntryValidationError::EmptyId);
		}
		if source.is_empty() {
			return Err(EntryValidationError::EmptySource);
		}
		if author_id.is_empty() {
			return Err(EntryValidationError::EmptyAuthorId);
		}

		Ok(Self {
			id,
			source,
			timestamp,
			author_id,
			author_display,
			content: content.into(),
			media_refs,
			links,
			extensions,
		})
	}

	/// Approximate byte size of this entry's textual content, used by the
	/// windowing engine's `bytes` unit (character count, per
	/// `SPEC_FULL.md` §9's resolution of the source's "bytes" ambiguity).
	pub fn char_len(&self) -> usize {
		self.content.chars().count()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample() -> Entry {
		Entry::new(
			"m1",
			"whatsapp:family",
			Utc::now(),
			"author-1",
			Some("Alice".into()),
			"hello world",
			vec![],
			vec![],
			BTreeMap::new(),
		)
		.unwrap()
	}

	#[test]
	fn rejects_empty_id() {
		let err = Entry::new(
			"",
			"src",
			Utc::now(),
			"a",
			None,
			"x",
			vec![],
			vec![],
			BTreeMap::new(),
		)
		.unwrap_err();
		assert_eq!(err, EntryValidationError::EmptyId);
	}

	#[test]
	fn rejects_empty_author_id() {
		let err = Entry::new(
			"m1",
			"src",
			Utc::now(),
			"",
			None,
			"x",
			vec![],
			vec![],
			BTreeMap::new(),
		)
		.unwrap_err();
		assert_eq!(err, EntryValidationError::EmptyAuthorId);
	}

	#[test]
	fn char_len_counts_chars_not_bytes() {
		let mut e = sample();
		e.content = "héllo".into();
		assert_eq!(e.char_len(), 5);
	}
}
