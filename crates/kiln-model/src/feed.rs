//! The ordered collection of documents rendered for syndication.
//!
//! Serialization is driven by a declarative `askama` template
//! (`templates/feed.xml`) rather than hand-built string concatenation —
//! `spec.md` §4.1 calls this out explicitly as "a single source of truth
//! for output format". Nothing here builds XML by pushing onto a
//! `String`.

use askama::Template;
use chrono::{DateTime, Utc};

use crate::document::{DocType, Document};

/// One rendered entry in the feed's output. A flattened, template-friendly
/// view over a [`Document`]; kept separate from `Document` so the template
/// never has to reach into repository- or vector-specific fields.
struct FeedEntryView {
	id: String,
	title: String,
	created_at: String,
	updated_at: String,
	authors: Vec<String>,
	content_kind: &'static str,
	content_body: String,
}

#[derive(Template)]
#[template(path = "feed.xml")]
struct FeedTemplate<'a> {
	feed: &'a FeedView,
}

struct FeedView {
	title: String,
	id: String,
	updated_at: String,
	entries: Vec<FeedEntryView>,
}

/// An ordered collection of posts assembled for syndication.
pub struct Feed {
	pub title: String,
	pub id: String,
	pub updated_at: DateTime<Utc>,
	pub posts: Vec<Document>,
}

/// Errors raised while assembling or serializing a [`Feed`].
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
	#[error("feed must contain only post documents, found {0:?}")]
	NonPostDocument(DocType),
	#[error("template rendering failed: {0}")]
	Render(#[from] askama::Error),
}

impl Feed {
	/// Assembles a feed from an ordered collection of already-generated
	/// `Post` documents. Rejects any document that isn't a post: a feed is
	/// a view over posts, not a generic document dump.
	pub fn from_documents(
		title: impl Into<String>,
		id: impl Into<String>,
		updated_at: DateTime<Utc>,
		posts: Vec<Document>,
	) -> Result<Self, FeedError> {
		for post in &posts {
			if post.doc_type != DocType::Post {
				return Err(FeedError::NonPostDocument(post.doc_type));
			}
		}
		Ok(Self {
			title: title.into(),
			id: id.into(),
			updated_at,
			posts,
		})
	}

	/// Serializes the feed as an Atom XML document. Deterministic: the
	/// same `Feed` value always produces byte-identical output
	/// (`spec.md` §8's round-trip property), since the template has no
	/// access to the clock, randomness, or environment.
	pub fn to_atom_xml(&self) -> Result<String, FeedError> {
		let view = FeedView {
			title: self.title.clone(),
			id: self.id.clone(),
			updated_at: self.updated_at.to_rfc3339(),
			entries: self
				.posts
				.iter()
				.map(|doc| FeedEntryView {
					id: doc.id.clone(),
					title: doc.title.clone(),
					created_at: doc.created_at.to_rfc3339(),
					updated_at: doc.updated_at.to_rfc3339(),
					authors: doc.authors.iter().cloned().collect(),
					content_kind: doc.content_type.as_mime(),
					content_body: doc.content_body.clone(),
				})
				.collect(),
		};
		let tpl = FeedTemplate { feed: &view };
		Ok(tpl.render()?)
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;

	use serde_json::Map;

	use super::*;
	use crate::document::ContentType;

	fn ts(secs: i64) -> DateTime<Utc> {
		DateTime::from_timestamp(secs, 0).unwrap()
	}

	fn post(id: &str, title: &str) -> Document {
		Document::new(
			id,
			DocType::Post,
			title,
			ts(0),
			ts(0),
			BTreeSet::from(["author-1".to_string()]),
			"body & <text>",
			ContentType::Markdown,
			None,
			None,
			Map::new(),
		)
		.unwrap()
	}

	#[test]
	fn rejects_non_post_documents() {
		let media = Document::new(
			"m1",
			DocType::Media,
			"m",
			ts(0),
			ts(0),
			BTreeSet::new(),
			"",
			ContentType::BinaryHandle("blob://x".into()),
			None,
			None,
			Map::new(),
		)
		.unwrap();
		let err = Feed::from_documents("Feed", "feed-id", ts(0), vec![media]).unwrap_err();
		assert!(matches!(err, FeedError::NonPostDocument(DocType::Media)));
	}

	#[test]
	fn serialization_is_deterministic() {
		let feed = Feed::from_documents("Feed", "feed-id", ts(0), vec![post("p1", "Hello")]).unwrap();
		let a = feed.to_atom_xml().unwrap();
		let b = feed.to_atom_xml().unwrap();
		assert_eq!(a, b);
	}

	#[test]
	fn escapes_reserved_xml_characters() {
		let feed = Feed::from_documents("Feed", "feed-id", ts(0), vec![post("p1", "Hello")]).unwrap();
		let xml = feed.to_atom_xml().unwrap();
		assert!(xml.contains("&amp;"));
		assert!(!xml.contains("body & <text>"));
	}

	#[test]
	fn atom_xml_matches_known_snapshot() {
		let feed = Feed::from_documents("Feed", "feed-id", ts(0), vec![post("p1", "Hello")]).unwrap();
		let xml = feed.to_atom_xml().unwrap();
		insta::assert_snapshot!(xml, @r###"
		<?xml version="1.0" encoding="utf-8"?>
		<feed xmlns="http://www.w3.org/2005/Atom">
			<title>Feed</title>
			<id>feed-id</id>
			<updated>1970-01-01T00:00:00+00:00</updated>
			<entry>
				<id>p1</id>
				<title>Hello</title>
				<updated>1970-01-01T00:00:00+00:00</updated>
				<published>1970-01-01T00:00:00+00:00</published>
				<author><name>author-1</name></author>
				<content type="text/markdown">body &amp; &lt;text&gt;</content>
			</entry>
		</feed>
		"###);
	}
}
