//! Three-tier content-addressed cache: enrichment results (L1), retrieval
//! results (L2), and writer output (L3). Each tier is a directory of
//! files named by a deterministic hash of its inputs, with a TTL sidecar.
//!
//! Invalidation cascades *downward* implicitly, through fingerprinting:
//! a changed L1 entry changes the fingerprint an L3 key is built from,
//! so L3 naturally misses without anyone deleting it. Explicit deletion
//! only ever cascades *upward*, via [`CacheManager::refresh`].

mod error;
mod key;
mod manager;
mod tier;

pub use error::CacheError;
pub use key::{CacheKey, Tier};
pub use manager::CacheManager;
pub use tier::{CacheTier, FileSystemCacheTier};
