//! The shape of the configuration the pipeline core consumes.
//!
//! Parsing that shape out of a config file or CLI flags is an explicit
//! non-goal (`spec.md` §1) and lives outside this workspace. What the core
//! does own is the *type* callers must hand it, and a deterministic
//! fingerprint of that type used for run identity (`kiln-runtracker`) and
//! woven into the writer-output cache key (`kiln-cache`).

use kiln_model::DocType;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The unit a window's `size` is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowUnit {
	Messages,
	Days,
	Hours,
	/// Character count, per `SPEC_FULL.md` §9's resolution of the
	/// source's "bytes" ambiguity (not a token estimate).
	Bytes,
}

/// Window-spec overrides, exposed on the control surface (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
	pub size: u32,
	pub unit: WindowUnit,
	pub overlap_ratio: f64,
}

impl Default for WindowSpec {
	fn default() -> Self {
		Self {
			size: 50,
			unit: WindowUnit::Messages,
			overlap_ratio: 0.0,
		}
	}
}

/// Which cache tier(s) to cascade-invalidate upward before this run, per
/// the `--refresh=<tier|all>` control in `spec.md` §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshScope {
	None,
	Writer,
	Retrieval,
	Enrichment,
	All,
}

/// Whether to resume from the latest run with a matching fingerprint or
/// start over, per the `resume`/`from-scratch` control in `spec.md` §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeMode {
	Resume,
	FromScratch,
}

/// Rate limiter configuration for `kiln-llm`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
	pub requests_per_minute: u32,
	pub burst: u32,
}

impl Default for RateLimitConfig {
	fn default() -> Self {
		Self {
			requests_per_minute: 60,
			burst: 5,
		}
	}
}

/// The configuration a `PipelineRunner` is constructed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
	/// Opaque handle identifying the source adapter + archive to process.
	pub source: String,
	pub window: WindowSpec,
	pub refresh: RefreshScope,
	pub resume: ResumeMode,
	/// Document kinds the RAG index covers (default: posts only).
	pub indexable_types: Vec<DocType>,
	/// Split-budget floor: a window below this size is never split
	/// further (`spec.md` §4.10).
	pub min_window_size: usize,
	/// Split-budget ceiling: recursion depth beyond which a window is
	/// failed rather than split again.
	pub max_split_depth: u32,
	/// Number of parts a window is split into on overflow.
	pub split_parts: u32,
	/// Character-count ceiling a window's content must stay under before
	/// the writer is invoked. The runner checks this pre-call (no
	/// `Provider` in this corpus surfaces a distinct context-length error
	/// to retry against) and raises `PromptTooLarge` itself when a window
	/// exceeds it, driving the same split state machine spec.md §4.10
	/// describes for an overflow the writer reports after the fact.
	pub max_prompt_size: usize,
	/// Consecutive windows a run tolerates aborting (a window-scoped,
	/// non-fatal `PipelineError`) without committing one in between before
	/// the whole run is finished `Failed` instead of left `running` for the
	/// next invocation to retry (`spec.md` §7's "abort threshold exceeded").
	pub window_abort_threshold: u32,
	pub rate_limit: RateLimitConfig,
	/// Versions are tracked independently per prompt so that a prompt
	/// change invalidates only the caches that depend on it, without
	/// forcing a new run identity — see the Open Question resolution in
	/// `DESIGN.md`.
	pub writer_prompt_version: String,
	pub enrichment_prompt_version: String,
}

impl Default for PipelineConfig {
	fn default() -> Self {
		Self {
			source: String::new(),
			window: WindowSpec::default(),
			refresh: RefreshScope::None,
			resume: ResumeMode::Resume,
			indexable_types: vec![DocType::Post],
			min_window_size: 5,
			max_split_depth: 5,
			split_parts: 2,
			max_prompt_size: 20_000,
			window_abort_threshold: 3,
			rate_limit: RateLimitConfig::default(),
			writer_prompt_version: "v1".to_string(),
			enrichment_prompt_version: "v1".to_string(),
		}
	}
}

/// The subset of `PipelineConfig` that participates in run identity.
///
/// `writer_prompt_version` is deliberately excluded — the Open Question in
/// `spec.md` §9 is resolved in `DESIGN.md`: a prompt revision should not by
/// itself force a fresh run/resumption identity, only invalidate the L3
/// cache key that already carries the prompt version on its own.
#[derive(Serialize)]
struct FingerprintView<'a> {
	source: &'a str,
	window: WindowSpec,
	indexable_types: &'a [DocType],
	min_window_size: usize,
	max_split_depth: u32,
	split_parts: u32,
	max_prompt_size: usize,
	window_abort_threshold: u32,
	rate_limit: RateLimitConfig,
	enrichment_prompt_version: &'a str,
}

impl PipelineConfig {
	/// Deterministic hash over the identity-relevant subset of this
	/// config. The same inputs always produce the same fingerprint
	/// (`spec.md` §8 property 6, applied to run identity rather than a
	/// cache key).
	pub fn fingerprint(&self) -> String {
		let view = FingerprintView {
			source: &self.source,
			window: self.window,
			indexable_types: &self.indexable_types,
			min_window_size: self.min_window_size,
			max_split_depth: self.max_split_depth,
			split_parts: self.split_parts,
			max_prompt_size: self.max_prompt_size,
			window_abort_threshold: self.window_abort_threshold,
			rate_limit: self.rate_limit,
			enrichment_prompt_version: &self.enrichment_prompt_version,
		};
		let bytes = serde_json::to_vec(&view).expect("FingerprintView always serializes");
		let digest = Sha256::digest(&bytes);
		hex_encode(&digest)
	}
}

fn hex_encode(bytes: &[u8]) -> String {
	use std::fmt::Write;
	let mut out = String::with_capacity(bytes.len() * 2);
	for b in bytes {
		write!(out, "{b:02x}").expect("writing to a String cannot fail");
	}
	out
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn fingerprint_is_deterministic() {
		let cfg = PipelineConfig::default();
		assert_eq!(cfg.fingerprint(), cfg.fingerprint());
	}

	#[test]
	fn fingerprint_ignores_writer_prompt_version() {
		let mut a = PipelineConfig::default();
		let mut b = PipelineConfig::default();
		a.writer_prompt_version = "v1".to_string();
		b.writer_prompt_version = "v2".to_string();
		assert_eq!(a.fingerprint(), b.fingerprint());
	}

	#[test]
	fn fingerprint_changes_with_source() {
		let mut a = PipelineConfig::default();
		let mut b = PipelineConfig::default();
		a.source = "source-a".to_string();
		b.source = "source-b".to_string();
		assert_ne!(a.fingerprint(), b.fingerprint());
	}

	#[test]
	fn fingerprint_changes_with_enrichment_prompt_version() {
		let mut a = PipelineConfig::default();
		let mut b = PipelineConfig::default();
		a.enrichment_prompt_version = "v1".to_string();
		b.enrichment_prompt_version = "v2".to_string();
		assert_ne!(a.fingerprint(), b.fingerprint());
	}

	#[test]
	fn fingerprint_changes_with_max_prompt_size() {
		let mut a = PipelineConfig::default();
		let mut b = PipelineConfig::default();
		a.max_prompt_size = 10_000;
		b.max_prompt_size = 20_000;
		assert_ne!(a.fingerprint(), b.fingerprint());
	}

	#[test]
	fn fingerprint_changes_with_window_abort_threshold() {
		let mut a = PipelineConfig::default();
		let mut b = PipelineConfig::default();
		a.window_abort_threshold = 3;
		b.window_abort_threshold = 5;
		assert_ne!(a.fingerprint(), b.fingerprint());
	}
}
