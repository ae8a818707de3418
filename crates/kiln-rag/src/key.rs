//! Content address for a cached embedding: `sha2::Sha256` over the role
//! and text, shared in spirit with `kiln-cache`'s L1/L2 keys so retrieval
//! caching can be layered on top of this index without re-deriving a
//! hashing scheme.

use kiln_llm::EmbeddingRole;
use sha2::{Digest, Sha256};

/// Deterministic hex digest identifying `(role, text)`. Two calls with
/// the same role and text produce the same digest; a `Document`-role
/// embedding and a `Query`-role embedding of identical text produce
/// different digests, since they are never interchangeable.
pub fn embedding_cache_digest(role: EmbeddingRole, text: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(role_tag(role).as_bytes());
	hasher.update(b"\0");
	hasher.update(text.as_bytes());
	hex_encode(&hasher.finalize())
}

fn role_tag(role: EmbeddingRole) -> &'static str {
	match role {
		EmbeddingRole::Document => "document",
		EmbeddingRole::Query => "query",
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
	use super::*;

	#[test]
	fn same_role_and_text_produce_same_digest() {
		assert_eq!(embedding_cache_digest(EmbeddingRole::Document, "hello"), embedding_cache_digest(EmbeddingRole::Document, "hello"));
	}

	#[test]
	fn document_and_query_roles_never_collide_for_the_same_text() {
		assert_ne!(embedding_cache_digest(EmbeddingRole::Document, "hello"), embedding_cache_digest(EmbeddingRole::Query, "hello"));
	}
}
