//! The output contract the core publishes through (`spec.md` §6). A sink
//! persists documents one at a time and publishes materialized feed
//! snapshots; it never mutates a [`Document`] it's handed.
//!
//! This trait only names the contract. `kiln-repo` provides the concrete
//! sqlx-backed implementation; this crate stays free of storage
//! dependencies.

use async_trait::async_trait;

use crate::document::Document;
use crate::feed::Feed;

#[async_trait]
pub trait OutputSink: Send + Sync {
	type Error;

	/// Idempotent overwrite by `(id, doc_type)`.
	async fn persist(&self, document: &Document) -> Result<(), Self::Error>;

	/// Every document currently held by the sink.
	async fn documents(&self) -> Result<Vec<Document>, Self::Error>;

	/// Publishes a materialized feed snapshot.
	async fn publish(&self, feed: &Feed) -> Result<(), Self::Error>;
}
