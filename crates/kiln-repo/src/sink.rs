//! The concrete [`OutputSink`] this workspace ships: documents live in the
//! same sqlx-backed store as [`DocumentRepository`], and a feed snapshot
//! is published by writing its rendered Atom XML to a file, replaced
//! wholesale on every publish (no partial-write path to reconcile).

use kiln_model::document::Document;
use kiln_model::feed::Feed;
use kiln_model::sink::OutputSink;
use std::path::PathBuf;

use crate::error::RepositoryError;
use crate::filter::DocumentFilter;
use crate::DocumentRepository;

/// An [`OutputSink`] backed by a [`DocumentRepository`] plus a single
/// target path for the published feed file.
#[derive(Debug, Clone)]
pub struct FeedSink {
	repo: DocumentRepository,
	feed_path: PathBuf,
}

impl FeedSink {
	pub fn new(repo: DocumentRepository, feed_path: impl Into<PathBuf>) -> Self {
		Self { repo, feed_path: feed_path.into() }
	}

	pub fn repo(&self) -> &DocumentRepository {
		&self.repo
	}
}

#[async_trait::async_trait]
impl OutputSink for FeedSink {
	type Error = RepositoryError;

	async fn persist(&self, document: &Document) -> Result<(), Self::Error> {
		self.repo.upsert(document).await
	}

	async fn documents(&self) -> Result<Vec<Document>, Self::Error> {
		self.repo.list(&DocumentFilter::new()).await
	}

	async fn publish(&self, feed: &Feed) -> Result<(), Self::Error> {
		let xml = feed.to_atom_xml().map_err(|e| RepositoryError::Corrupt(e.to_string()))?;
		tokio::fs::write(&self.feed_path, xml).await.map_err(|e| RepositoryError::Corrupt(e.to_string()))?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;

	use chrono::{DateTime, Utc};
	use kiln_model::document::{ContentType, DocType};
	use serde_json::Map;
	use tempfile::tempdir;

	use super::*;

	fn post(id: &str) -> Document {
		let ts: DateTime<Utc> = DateTime::from_timestamp(0, 0).unwrap();
		Document::new(id, DocType::Post, "Title", ts, ts, BTreeSet::from(["author".to_string()]), "body", ContentType::Markdown, None, None, Map::new()).unwrap()
	}

	#[tokio::test]
	async fn publish_writes_the_rendered_feed_to_disk() {
		let dir = tempdir().unwrap();
		let feed_path = dir.path().join("feed.xml");
		let repo = DocumentRepository::connect(":memory:").await.unwrap();
		let sink = FeedSink::new(repo, &feed_path);

		let doc = post("post-1");
		sink.persist(&doc).await.unwrap();
		assert_eq!(sink.documents().await.unwrap().len(), 1);

		let feed = Feed::from_documents("My Feed", "feed-id", Utc::now(), vec![doc]).unwrap();
		sink.publish(&feed).await.unwrap();

		let written = tokio::fs::read_to_string(&feed_path).await.unwrap();
		assert!(written.contains("My Feed"));
	}

	#[tokio::test]
	async fn republishing_overwrites_the_previous_snapshot() {
		let dir = tempdir().unwrap();
		let feed_path = dir.path().join("feed.xml");
		let repo = DocumentRepository::connect(":memory:").await.unwrap();
		let sink = FeedSink::new(repo, &feed_path);

		let feed_a = Feed::from_documents("Feed A", "feed-id", Utc::now(), vec![]).unwrap();
		sink.publish(&feed_a).await.unwrap();
		let feed_b = Feed::from_documents("Feed B", "feed-id", Utc::now(), vec![]).unwrap();
		sink.publish(&feed_b).await.unwrap();

		let written = tokio::fs::read_to_string(&feed_path).await.unwrap();
		assert!(written.contains("Feed B"));
		assert!(!written.contains("Feed A"));
	}
}
