//! Token cache contract and built-in cache implementations.
//!
//! A cache tracks at most one [`Token`] per key. Reading a key that was never written yields a
//! zero token rather than an error, so callers can tell "nothing cached yet" apart from a
//! corrupt or unreadable record. Writes replace the whole record atomically.

pub mod file;
pub mod memory;

pub use file::FileTokenCache;
pub use memory::MemoryTokenCache;

// self
use crate::{_prelude::*, auth::Token};

/// Boxed future returned by [`TokenCache`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Storage contract implemented by token caches.
pub trait TokenCache
where
	Self: Send + Sync,
{
	/// Reads the token stored under `key`, returning [`Token::default`] when nothing is cached.
	fn read<'a>(&'a self, key: &'a Path) -> CacheFuture<'a, Token>;

	/// Atomically replaces the token stored under `key`.
	fn write<'a>(&'a self, key: &'a Path, token: &'a Token) -> CacheFuture<'a, ()>;
}

/// Error type produced by [`TokenCache`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CacheError {
	/// The stored record could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure (I/O, permissions).
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as _;
	// self
	use super::*;

	#[test]
	fn cache_error_is_the_source_of_wrapped_errors() {
		let cache_error = CacheError::Backend { message: "permission denied".into() };
		let err = Error::CacheWrite { path: PathBuf::from("cache.json"), source: cache_error.clone() };
		let source = err.source().expect("Cache write errors should expose their cause.");

		assert_eq!(source.to_string(), cache_error.to_string());
		assert_eq!(source.to_string(), "Backend failure: permission denied.");
	}
}
