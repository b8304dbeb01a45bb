//! JSON-file [`TokenCache`] that replaces records through a temp file + rename.

// std
use std::{
	fs::{self, OpenOptions},
	io::{ErrorKind, Write},
	process,
};
// self
use crate::{
	_prelude::*,
	auth::Token,
	cache::{CacheError, CacheFuture, TokenCache},
};

/// Persists one token per file path, readable only by the current user.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileTokenCache;
impl FileTokenCache {
	fn read_now(path: &Path) -> Result<Token, CacheError> {
		let bytes = match fs::read(path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Token::default()),
			Err(e) => {
				return Err(CacheError::Backend {
					message: format!("Failed to read {}: {e}", path.display()),
				});
			},
		};

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(Token::default());
		}

		serde_json::from_slice(&bytes).map_err(|e| CacheError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn write_now(path: &Path, token: &Token) -> Result<(), CacheError> {
		Self::ensure_parent_exists(path)?;

		let serialized = serde_json::to_vec(token).map_err(|e| CacheError::Serialization {
			message: format!("Failed to serialize token: {e}"),
		})?;
		let tmp_path = Self::temp_path(path);
		let result = Self::write_temp(&tmp_path, &serialized).and_then(|()| {
			fs::rename(&tmp_path, path).map_err(|e| CacheError::Backend {
				message: format!("Failed to replace {}: {e}", path.display()),
			})
		});

		if result.is_err() {
			let _ = fs::remove_file(&tmp_path);
		}

		result
	}

	fn write_temp(tmp_path: &Path, contents: &[u8]) -> Result<(), CacheError> {
		let mut options = OpenOptions::new();

		options.write(true).create_new(true);

		#[cfg(unix)]
		{
			use std::os::unix::fs::OpenOptionsExt;

			options.mode(0o600);
		}

		let mut file = options.open(tmp_path).map_err(|e| CacheError::Backend {
			message: format!("Failed to create {}: {e}", tmp_path.display()),
		})?;

		file.write_all(contents).map_err(|e| CacheError::Backend {
			message: format!("Failed to write {}: {e}", tmp_path.display()),
		})?;
		file.sync_all().map_err(|e| CacheError::Backend {
			message: format!("Failed to sync {}: {e}", tmp_path.display()),
		})
	}

	// Unique per process and instant so concurrent invocations never share a temp file.
	fn temp_path(path: &Path) -> PathBuf {
		let file_name = path.file_name().map(|name| name.to_string_lossy()).unwrap_or_default();
		let unique = format!(
			".{file_name}.{}.{}.tmp",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos()
		);

		path.with_file_name(unique)
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), CacheError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			let mut builder = fs::DirBuilder::new();

			builder.recursive(true);

			#[cfg(unix)]
			{
				use std::os::unix::fs::DirBuilderExt;

				builder.mode(0o700);
			}

			builder.create(parent).map_err(|e| CacheError::Backend {
				message: format!("Failed to create cache directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}
}
impl TokenCache for FileTokenCache {
	fn read<'a>(&'a self, key: &'a Path) -> CacheFuture<'a, Token> {
		Box::pin(async move { Self::read_now(key) })
	}

	fn write<'a>(&'a self, key: &'a Path, token: &'a Token) -> CacheFuture<'a, ()> {
		Box::pin(async move { Self::write_now(key, token) })
	}
}
