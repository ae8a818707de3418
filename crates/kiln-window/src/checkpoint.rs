//! Durable cursor: the last *completed* window's label and the timestamp
//! immediately following its last entry. Resuming a run re-derives windows
//! from the full entry stream and skips everything up to the cursor, rather
//! than persisting window contents themselves.

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
	#[error("checkpoint io error: {0}")]
	Io(#[from] io::Error),
	#[error("checkpoint serialization error: {0}")]
	Serde(#[from] serde_json::Error),
}

/// Records the cursor position a run can resume from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
	/// Label of the last window fully committed (documents persisted,
	/// run tracker advanced).
	pub last_completed_window: String,
	/// Timestamp of the entry immediately after that window's last entry.
	/// Resuming re-windows from here, not from `last_completed_window`'s
	/// own boundary, so overlap re-derivation stays consistent.
	pub resume_after: DateTime<Utc>,
}

impl Checkpoint {
	pub fn new(last_completed_window: impl Into<String>, resume_after: DateTime<Utc>) -> Self {
		Self { last_completed_window: last_completed_window.into(), resume_after }
	}
}

/// Loads a checkpoint from `path`. Returns `Ok(None)` if the file doesn't
/// exist yet (a fresh run), rather than treating that as an error.
pub fn load_checkpoint(path: &Path) -> Result<Option<Checkpoint>, CheckpointError> {
	match std::fs::read(path) {
		Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(e.into()),
	}
}

/// Persists `checkpoint` to `path` via write-to-temp-then-rename, so a
/// crash mid-write never leaves a half-written checkpoint for the next
/// run to trip over.
pub fn save_checkpoint(path: &Path, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
	let bytes = serde_json::to_vec_pretty(checkpoint)?;
	let tmp_path = tmp_path_for(path);
	std::fs::write(&tmp_path, &bytes)?;
	std::fs::rename(&tmp_path, path)?;
	Ok(())
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
	let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("checkpoint");
	path.with_file_name(format!("{file_name}.tmp"))
}
