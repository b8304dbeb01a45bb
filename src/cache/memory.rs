//! Thread-safe in-memory [`TokenCache`] for tests and embedding.

// std
use std::{
	collections::HashMap,
	sync::atomic::{AtomicU64, Ordering},
};
// self
use crate::{
	_prelude::*,
	auth::Token,
	cache::{CacheError, CacheFuture, TokenCache},
};

type CacheMap = Arc<RwLock<HashMap<PathBuf, Token>>>;

/// Keeps tokens in-process and counts every read and write it serves.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenCache {
	map: CacheMap,
	reads: Arc<AtomicU64>,
	writes: Arc<AtomicU64>,
}
impl MemoryTokenCache {
	/// Creates a cache pre-seeded with `token` under `key`.
	pub fn seeded(key: impl Into<PathBuf>, token: Token) -> Self {
		let cache = Self::default();

		cache.map.write().insert(key.into(), token);

		cache
	}

	/// Returns a copy of the token stored under `key`, without counting it as a read.
	pub fn get(&self, key: &Path) -> Option<Token> {
		self.map.read().get(key).cloned()
	}

	/// Number of [`TokenCache::read`] calls served.
	pub fn reads(&self) -> u64 {
		self.reads.load(Ordering::Relaxed)
	}

	/// Number of [`TokenCache::write`] calls served.
	pub fn writes(&self) -> u64 {
		self.writes.load(Ordering::Relaxed)
	}

	fn read_now(&self, key: &Path) -> Result<Token, CacheError> {
		self.reads.fetch_add(1, Ordering::Relaxed);

		Ok(self.map.read().get(key).cloned().unwrap_or_default())
	}

	fn write_now(&self, key: &Path, token: &Token) -> Result<(), CacheError> {
		self.writes.fetch_add(1, Ordering::Relaxed);
		self.map.write().insert(key.to_path_buf(), token.clone());

		Ok(())
	}
}
impl TokenCache for MemoryTokenCache {
	fn read<'a>(&'a self, key: &'a Path) -> CacheFuture<'a, Token> {
		Box::pin(async move { self.read_now(key) })
	}

	fn write<'a>(&'a self, key: &'a Path, token: &'a Token) -> CacheFuture<'a, ()> {
		Box::pin(async move { self.write_now(key, token) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::token_for;

	#[tokio::test]
	async fn counts_reads_and_writes() {
		let cache = MemoryTokenCache::default();
		let key = PathBuf::from("token.json");

		assert!(cache.read(&key).await.expect("Read should succeed.").is_zero());

		cache
			.write(&key, &token_for("server", "a", Duration::hours(1)))
			.await
			.expect("Write should succeed.");

		let stored = cache.read(&key).await.expect("Read should succeed.");

		assert_eq!(stored.access_token.expose(), "a");
		assert_eq!((cache.reads(), cache.writes()), (2, 1));
		assert!(cache.get(&key).is_some());
		assert_eq!(cache.reads(), 2, "Inspection must not count as a read.");
	}
}
