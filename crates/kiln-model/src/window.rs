//! The ephemeral work unit the runner drives through enrichment and
//! generation. Windows are created and split by `kiln-window`'s windowing
//! engine and owned by the pipeline runner for their lifetime; this module
//! only defines the shared shape.

use chrono::{DateTime, Utc};

use crate::entry::Entry;

/// A bounded slice of an entry stream.
///
/// `entries` is materialized eagerly once a window is carved out of the
/// source stream by `kiln-window::create_windows` — the "lazy sequence
/// reference" language in `spec.md` §3 describes how windows are produced
/// (one at a time from an iterator, not all at once) rather than how their
/// contents are stored once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
	/// Deterministic string derived from the window's time range or index.
	pub label: String,
	pub start_time: DateTime<Utc>,
	pub end_time: DateTime<Utc>,
	pub entries: Vec<Entry>,
}

impl Window {
	pub fn new(label: impl Into<String>, start_time: DateTime<Utc>, end_time: DateTime<Utc>, entries: Vec<Entry>) -> Self {
		Self {
			label: label.into(),
			start_time,
			end_time,
			entries,
		}
	}

	/// Entry count.
	pub fn size(&self) -> usize {
		self.entries.len()
	}

	/// Total character count across all entries' content, the "bytes" unit
	/// per `SPEC_FULL.md` §9.
	pub fn byte_size(&self) -> usize {
		self.entries.iter().map(Entry::char_len).sum()
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use super::*;

	fn entry(id: &str, content: &str) -> Entry {
		Entry::new(
			id,
			"src",
			Utc::now(),
			"author",
			None,
			content,
			vec![],
			vec![],
			BTreeMap::new(),
		)
		.unwrap()
	}

	#[test]
	fn size_and_byte_size_reflect_entries() {
		let w = Window::new("w0", Utc::now(), Utc::now(), vec![entry("1", "ab"), entry("2", "cde")]);
		assert_eq!(w.size(), 2);
		assert_eq!(w.byte_size(), 5);
	}
}
