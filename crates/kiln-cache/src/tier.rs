//! A single cache tier: a directory of content-addressed files, each with
//! a sidecar `.meta.json` carrying its TTL and write time.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::key::CacheKey;

#[derive(Debug, Serialize, Deserialize)]
struct Meta {
	written_at: DateTime<Utc>,
	ttl_secs: Option<u64>,
}

impl Meta {
	fn is_expired(&self, now: DateTime<Utc>) -> bool {
		match self.ttl_secs {
			Some(secs) => now.signed_duration_since(self.written_at).num_seconds() >= secs as i64,
			None => false,
		}
	}
}

/// One content-addressed cache tier, rooted at a single directory.
/// `get`/`put`/`invalidate_key` act on one key; `clear` drops every
/// entry this tier holds (used by [`crate::CacheManager::refresh`]'s
/// upward cascade and by [`crate::CacheManager::invalidate`]).
#[async_trait]
pub trait CacheTier: Send + Sync {
	async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError>;
	async fn put(&self, key: &CacheKey, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError>;
	async fn invalidate_key(&self, key: &CacheKey) -> Result<(), CacheError>;
	async fn clear(&self) -> Result<(), CacheError>;
}

/// Filesystem-backed [`CacheTier`], rooted at `<root>`: entries live at
/// `<root>/<digest>` plus a `<root>/<digest>.meta.json` sidecar. One
/// instance is scoped to exactly one tier (the root directory), mirroring
/// [`crate::manager::CacheManager`]'s one-directory-per-tier layout.
pub struct FileSystemCacheTier {
	root: PathBuf,
}

impl FileSystemCacheTier {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	fn value_path(&self, key: &CacheKey) -> PathBuf {
		self.root.join(key.digest_hex())
	}

	fn meta_path(&self, key: &CacheKey) -> PathBuf {
		let mut p = self.value_path(key).into_os_string();
		p.push(".meta.json");
		PathBuf::from(p)
	}
}

#[async_trait]
impl CacheTier for FileSystemCacheTier {
	async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
		let meta_bytes = match tokio::fs::read(self.meta_path(key)).await {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(e.into()),
		};
		let meta: Meta = serde_json::from_slice(&meta_bytes)?;
		if meta.is_expired(Utc::now()) {
			self.invalidate_key(key).await?;
			return Ok(None);
		}

		match tokio::fs::read(self.value_path(key)).await {
			Ok(bytes) => Ok(Some(bytes)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	async fn put(&self, key: &CacheKey, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError> {
		tokio::fs::create_dir_all(&self.root).await?;
		let meta = Meta { written_at: Utc::now(), ttl_secs: ttl.map(|d| d.as_secs()) };
		tokio::fs::write(self.value_path(key), value).await?;
		tokio::fs::write(self.meta_path(key), serde_json::to_vec(&meta)?).await?;
		Ok(())
	}

	async fn invalidate_key(&self, key: &CacheKey) -> Result<(), CacheError> {
		remove_if_present(self.value_path(key)).await?;
		remove_if_present(self.meta_path(key)).await?;
		Ok(())
	}

	async fn clear(&self) -> Result<(), CacheError> {
		match tokio::fs::remove_dir_all(&self.root).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e.into()),
		}
	}
}

async fn remove_if_present(path: PathBuf) -> Result<(), CacheError> {
	match tokio::fs::remove_file(&path).await {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(e.into()),
	}
}
