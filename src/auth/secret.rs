//! Access tokens, refresh tokens, client secrets, and passwords.

// crates.io
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Secret string that never prints its value.
///
/// `Debug` shows a short SHA-256 fingerprint so two log lines can be matched to the same token
/// without leaking it. `Display` prints `<redacted>`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	const FINGERPRINT_BYTES: usize = 4;

	/// Wraps `value`.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// The raw value, for request bodies and the emitted credential only.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when no secret material is present.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// First bytes of the SHA-256 digest, hex encoded.
	pub fn fingerprint(&self) -> String {
		Sha256::digest(self.0.as_bytes())
			.iter()
			.take(Self::FINGERPRINT_BYTES)
			.map(|byte| format!("{byte:02x}"))
			.collect()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		if self.is_empty() {
			f.write_str("TokenSecret(<empty>)")
		} else {
			write!(f, "TokenSecret(sha256:{})", self.fingerprint())
		}
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn formatting_never_leaks_the_value() {
		let secret = TokenSecret::new("super-secret");
		let debug = format!("{secret:?}");

		assert!(!debug.contains("super-secret"));
		assert_eq!(debug, format!("TokenSecret(sha256:{})", secret.fingerprint()));
		assert_eq!(secret.fingerprint().len(), 8);
		assert_eq!(format!("{secret}"), "<redacted>");
		assert_eq!(format!("{:?}", TokenSecret::default()), "TokenSecret(<empty>)");
	}

	#[test]
	fn fingerprint_tells_tokens_apart() {
		// sha256("abc") = ba7816bf...
		assert_eq!(TokenSecret::new("abc").fingerprint(), "ba7816bf");
		assert_ne!(TokenSecret::new("a").fingerprint(), TokenSecret::new("b").fingerprint());
	}

	#[test]
	fn serializes_as_the_plain_value() {
		assert_eq!(
			serde_json::to_string(&TokenSecret::new("value")).expect("Secret should serialize."),
			"\"value\""
		);
	}
}
