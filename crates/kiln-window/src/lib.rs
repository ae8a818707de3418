//! Pure, synchronous transformations over an ordered entry stream: carve it
//! into bounded [`kiln_model::Window`]s, split an overflowing window into
//! equal parts, and durably checkpoint the last completed window.
//!
//! Nothing here performs network or LLM I/O — the only I/O is the
//! checkpoint file, and even that is a single atomic rename.

mod checkpoint;
mod split;
mod windows;

pub use checkpoint::{Checkpoint, CheckpointError, load_checkpoint, save_checkpoint};
pub use split::split_into_n_parts;
pub use windows::create_windows;

use thiserror::Error;

/// Failures from this crate's pure transformations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
	#[error("invalid window spec: {0}")]
	InvalidWindowSpec(String),
}
