//! Canonical types for the Kiln pipeline core: entries ingested from a
//! source adapter, documents produced by the pipeline, the syndication
//! feed assembled from published posts, windows and runs.
//!
//! This crate is pure data + pure transformations. It performs no I/O and
//! depends on no storage, network, or async runtime crates, so every other
//! crate in the workspace can depend on it without pulling in machinery it
//! doesn't need.

pub mod document;
pub mod entry;
pub mod error;
pub mod feed;
pub mod run;
pub mod sink;
pub mod slug;
pub mod window;

pub use document::{DocType, Document};
pub use entry::Entry;
pub use error::PipelineError;
pub use feed::Feed;
pub use run::{Run, RunStatus};
pub use sink::OutputSink;
pub use window::Window;
