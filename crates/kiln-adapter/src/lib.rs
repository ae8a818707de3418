//! The input adapter contract: the boundary between a source-format
//! parser (WhatsApp export, Slack export, ...) and the pipeline core.
//!
//! An adapter is the *only* place privacy/PII policy for its source is
//! encoded (`spec.md` §4.11) — the core treats every [`kiln_model::entry::Entry`]
//! it receives as already anonymized and trusts the ordering
//! `SourceAdapter::read_entries` promises. This crate ships the contract,
//! the shared [`Anonymizer`] every real adapter is expected to call at
//! its boundary, and test-double adapters for integration tests; it does
//! not ship a real source-format parser.

mod adapter;
mod anonymize;
mod error;
mod metadata;
mod test_double;

pub use adapter::SourceAdapter;
pub use anonymize::Anonymizer;
pub use error::AdapterError;
pub use metadata::AdapterMetadata;
pub use test_double::{InMemoryAdapter, NullAdapter};
