//! Pipeline orchestrator (C10, `spec.md` §4.10): the one crate that
//! depends on every other `kiln-*` crate and drives them through a full
//! invocation — windowing, per-window enrichment and retrieval, the
//! writer's tool-calling loop, the window-splitting queue on prompt
//! overflow, and the run/checkpoint commit boundary.
//!
//! Every downstream crate owns its own error type; this crate's
//! [`error`] module is where each of those converts into
//! [`kiln_model::error::PipelineError`], the kind-level taxonomy the
//! runner uses to decide commit/retry/abort policy (`spec.md` §7).

mod context;
mod error;
mod state;

mod runner;

pub use kiln_model::error::PipelineError;
pub use runner::{PipelineRunner, RunSummary};
pub use state::QueuedWindow;
