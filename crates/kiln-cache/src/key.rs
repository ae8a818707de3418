//! Deterministic cache keys. Every constructor hashes its component parts
//! with `sha2::Sha256` in a fixed order, so the same inputs always
//! produce the same key and distinct inputs essentially never collide.

use sha2::{Digest, Sha256};

/// A content-addressed cache key: a hex-encoded SHA-256 digest plus the
/// tier it names, so keys from different tiers never alias each other
/// on disk even if their digests happened to coincide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
	pub tier: Tier,
	digest_hex: String,
}

/// The three cache tiers, ordered from most upstream (L1) to most
/// downstream (L3, which fingerprints over the other two).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
	Enrichment,
	Retrieval,
	WriterOutput,
}

impl Tier {
	pub fn as_str(self) -> &'static str {
		match self {
			Tier::Enrichment => "l1-enrichment",
			Tier::Retrieval => "l2-retrieval",
			Tier::WriterOutput => "l3-writer",
		}
	}
}

impl CacheKey {
	/// L1: keyed by the asset's content hash plus the enrichment prompt
	/// version, so a prompt revision invalidates cached enrichments
	/// without an explicit cascade.
	pub fn for_enrichment(asset_uri: &str, enrichment_prompt_version: &str) -> Self {
		let mut hasher = Sha256::new();
		hasher.update(asset_uri.as_bytes());
		hasher.update(b"\0");
		hasher.update(enrichment_prompt_version.as_bytes());
		Self { tier: Tier::Enrichment, digest_hex: hex_encode(&hasher.finalize()) }
	}

	/// L2: keyed by the query embedding's hash plus the index version
	/// hash, so any document change that bumps the index version
	/// naturally misses without a cascading delete.
	pub fn for_retrieval(query_embedding_hash: &str, index_version_hash: &str) -> Self {
		let mut hasher = Sha256::new();
		hasher.update(query_embedding_hash.as_bytes());
		hasher.update(b"\0");
		hasher.update(index_version_hash.as_bytes());
		Self { tier: Tier::Retrieval, digest_hex: hex_encode(&hasher.finalize()) }
	}

	/// L3: a semantic hash over everything that could change the
	/// writer's output for one window.
	pub fn for_writer_output(window_fingerprint: &str, enrichments_fingerprint: &str, retrieval_fingerprint: &str, writer_prompt_version: &str) -> Self {
		let mut hasher = Sha256::new();
		for part in [window_fingerprint, enrichments_fingerprint, retrieval_fingerprint, writer_prompt_version] {
			hasher.update(part.as_bytes());
			hasher.update(b"\0");
		}
		Self { tier: Tier::WriterOutput, digest_hex: hex_encode(&hasher.finalize()) }
	}

	/// The on-disk file stem within this key's tier directory.
	pub fn digest_hex(&self) -> &str {
		&self.digest_hex
	}
}

fn hex_encode(bytes: &[u8]) -> String {
	use std::fmt::Write;
	bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
		write!(acc, "{b:02x}").unwrap();
		acc
	})
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn same_inputs_produce_same_key() {
		let a = CacheKey::for_enrichment("https://example.com/x.png", "v1");
		let b = CacheKey::for_enrichment("https://example.com/x.png", "v1");
		assert_eq!(a, b);
	}

	#[test]
	fn prompt_version_changes_the_key() {
		let a = CacheKey::for_enrichment("https://example.com/x.png", "v1");
		let b = CacheKey::for_enrichment("https://example.com/x.png", "v2");
		assert_ne!(a, b);
	}

	#[test]
	fn component_order_is_not_confusable_via_concatenation() {
		// "ab" + "" vs "a" + "b": a naive concat-then-hash would collide.
		let a = CacheKey::for_retrieval("ab", "");
		let b = CacheKey::for_retrieval("a", "b");
		assert_ne!(a, b);
	}

	#[test]
	fn different_tiers_carry_distinct_tier_tags() {
		let enrichment = CacheKey::for_enrichment("x", "v1");
		let retrieval = CacheKey::for_retrieval("x", "v1");
		assert_ne!(enrichment.tier, retrieval.tier);
	}
}
