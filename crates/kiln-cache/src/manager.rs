//! Routes keys to their tier and implements the two invalidation
//! operations the cache exposes: a single-tier `invalidate`, and the
//! scoped upward `refresh` that a `--refresh=<tier|all>` control drives.

use std::path::Path;
use std::time::Duration;

use kiln_config::RefreshScope;

use crate::error::CacheError;
use crate::key::{CacheKey, Tier};
use crate::tier::{CacheTier, FileSystemCacheTier};

/// Owns the three cache tiers and routes operations to the right one by
/// the key's own `tier` tag, so callers never pick a tier by hand.
pub struct CacheManager {
	enrichment: Box<dyn CacheTier>,
	retrieval: Box<dyn CacheTier>,
	writer_output: Box<dyn CacheTier>,
}

impl CacheManager {
	/// Opens a three-tier cache rooted at `root`, one subdirectory per
	/// tier.
	pub fn open(root: impl AsRef<Path>) -> Self {
		let root = root.as_ref();
		Self {
			enrichment: Box::new(FileSystemCacheTier::new(root.join(Tier::Enrichment.as_str()))),
			retrieval: Box::new(FileSystemCacheTier::new(root.join(Tier::Retrieval.as_str()))),
			writer_output: Box::new(FileSystemCacheTier::new(root.join(Tier::WriterOutput.as_str()))),
		}
	}

	fn tier_for(&self, tier: Tier) -> &dyn CacheTier {
		match tier {
			Tier::Enrichment => self.enrichment.as_ref(),
			Tier::Retrieval => self.retrieval.as_ref(),
			Tier::WriterOutput => self.writer_output.as_ref(),
		}
	}

	pub async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
		let hit = self.tier_for(key.tier).get(key).await?;
		tracing::debug!(tier = ?key.tier, hit = hit.is_some(), "cache lookup");
		Ok(hit)
	}

	pub async fn put(&self, key: &CacheKey, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError> {
		self.tier_for(key.tier).put(key, value, ttl).await
	}

	/// Drops every entry in exactly one tier. No cascade: downstream
	/// tiers naturally miss once their own fingerprinted inputs change,
	/// they are never recursively cleared by this call.
	pub async fn invalidate(&self, tier: Tier) -> Result<(), CacheError> {
		self.tier_for(tier).clear().await
	}

	/// Clears `scope`'s named tier and every tier downstream of it
	/// (enrichment feeds retrieval and writer output; retrieval feeds
	/// writer output), the explicit upward cascade a `--refresh` control
	/// asks for.
	pub async fn refresh(&self, scope: RefreshScope) -> Result<(), CacheError> {
		let tiers: &[Tier] = match scope {
			RefreshScope::None => &[],
			RefreshScope::Writer => &[Tier::WriterOutput],
			RefreshScope::Retrieval => &[Tier::Retrieval, Tier::WriterOutput],
			RefreshScope::Enrichment => &[Tier::Enrichment, Tier::Retrieval, Tier::WriterOutput],
			RefreshScope::All => &[Tier::Enrichment, Tier::Retrieval, Tier::WriterOutput],
		};
		for tier in tiers {
			self.invalidate(*tier).await?;
		}
		Ok(())
	}
}
