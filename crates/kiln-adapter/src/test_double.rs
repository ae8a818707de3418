//! Test-double adapters. Neither parses a real export format; they exist
//! so `kiln-runner`'s integration tests can drive the full pipeline
//! without depending on a source-format parser, which stays out of this
//! workspace's scope.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use kiln_model::document::Document;
use kiln_model::entry::Entry;

use crate::adapter::SourceAdapter;
use crate::error::AdapterError;
use crate::metadata::AdapterMetadata;

/// An adapter with no entries and no media. Useful for exercising the
/// runner's empty-source path (an empty run should still create and
/// terminate a `Run` record cleanly).
#[derive(Debug, Clone, Default)]
pub struct NullAdapter;

#[async_trait]
impl SourceAdapter for NullAdapter {
	fn read_entries(&self) -> Result<Box<dyn Iterator<Item = Entry> + Send + '_>, AdapterError> {
		Ok(Box::new(std::iter::empty()))
	}

	fn get_metadata(&self) -> AdapterMetadata {
		AdapterMetadata::new("null", "0.0.0", "1")
	}
}

/// A fixed, in-memory set of entries, sorted by timestamp at construction
/// time so `read_entries` upholds the ordering contract regardless of the
/// order the caller supplied them in.
#[derive(Debug, Clone)]
pub struct InMemoryAdapter {
	entries: Vec<Entry>,
	metadata: AdapterMetadata,
	media: BTreeMap<String, Document>,
}

impl InMemoryAdapter {
	pub fn new(mut entries: Vec<Entry>, metadata: AdapterMetadata) -> Self {
		entries.sort_by_key(|e| e.timestamp);
		Self { entries, metadata, media: BTreeMap::new() }
	}

	/// Attaches the documents `extract_media` should return, keyed by the
	/// media reference an entry's `media_refs` names.
	pub fn with_media(mut self, media: BTreeMap<String, Document>) -> Self {
		self.media = media;
		self
	}
}

#[async_trait]
impl SourceAdapter for InMemoryAdapter {
	fn read_entries(&self) -> Result<Box<dyn Iterator<Item = Entry> + Send + '_>, AdapterError> {
		Ok(Box::new(self.entries.iter().cloned()))
	}

	fn get_metadata(&self) -> AdapterMetadata {
		self.metadata.clone()
	}

	async fn extract_media(&self, _root: &Path, _target_dir: &Path) -> Result<BTreeMap<String, Document>, AdapterError> {
		Ok(self.media.clone())
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use chrono::{DateTime, Utc};
	use pretty_assertions::assert_eq;

	use super::*;

	fn entry(id: &str, secs: i64) -> Entry {
		Entry::new(id, "test", DateTime::from_timestamp(secs, 0).unwrap(), "author-1", None, "hello", vec![], vec![], BTreeMap::new()).unwrap()
	}

	#[test]
	fn null_adapter_yields_no_entries() {
		let adapter = NullAdapter;
		assert_eq!(adapter.read_entries().unwrap().count(), 0);
	}

	#[test]
	fn in_memory_adapter_sorts_entries_by_timestamp() {
		let adapter = InMemoryAdapter::new(vec![entry("b", 20), entry("a", 10), entry("c", 30)], AdapterMetadata::new("test", "1", "1"));

		let ids: Vec<String> = adapter.read_entries().unwrap().map(|e| e.id).collect();
		assert_eq!(ids, vec!["a", "b", "c"]);
	}

	#[tokio::test]
	async fn in_memory_adapter_extract_media_defaults_to_empty() {
		let adapter = InMemoryAdapter::new(vec![], AdapterMetadata::new("test", "1", "1"));
		let media = adapter.extract_media(Path::new("/root"), Path::new("/target")).await.unwrap();
		assert!(media.is_empty());
	}
}
