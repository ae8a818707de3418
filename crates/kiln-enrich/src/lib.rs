//! Enrichment workers: plain async functions/structs that take durable
//! [`task::EnrichmentTask`]s in and produce documents out, sitting
//! between window ingestion and the writer (`spec.md` §4.7).
//!
//! Two worker kinds share this crate's infrastructure but nothing else:
//! [`url_media::UrlMediaEnricher`] describes links and media assets, and
//! [`profile::ProfileWorker`] aggregates an author's recent
//! contributions into a profile document. Both take an already-built
//! `Arc<LlmClient<P>>` rather than constructing their own, so rate
//! limiting and key rotation stay centralized in `kiln-llm`.

mod error;
mod profile;
mod task;
mod url_media;

pub use error::EnrichError;
pub use profile::{ProfileInput, ProfileWorker};
pub use task::{EnrichmentKind, EnrichmentTask, TaskStatus, TaskStore};
pub use url_media::{EnrichmentPrompts, UrlMediaEnricher};
