//! The token value carried through the exec credential flow, plus its builder.
//!
//! [`Token`] doubles as the on-disk cache record. Its serde form mirrors the JSON that Azure AD
//! token endpoints emit (`access_token`, `refresh_token`, `expires_on`, `resource`,
//! `token_type`), so timestamps are written as strings of Unix seconds and read back from either
//! strings or numbers.

// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, UnverifiedClaims, claims::ClaimsError},
};

const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Errors produced by [`TokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TokenBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_on or expires_in.")]
	MissingExpiry,
}

/// OAuth access token with its optional refresh token, audience, and expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
	/// Bearer credential handed to kubectl; callers must avoid logging it.
	#[serde(default)]
	pub access_token: TokenSecret,
	/// Refresh token, if the login method issued one.
	#[serde(
		default,
		deserialize_with = "lenient::optional_secret",
		skip_serializing_if = "Option::is_none"
	)]
	pub refresh_token: Option<TokenSecret>,
	/// Audience the token was issued for.
	#[serde(default)]
	pub resource: String,
	/// Absolute expiry instant.
	#[serde(default = "unix_epoch", with = "lenient::unix_seconds")]
	pub expires_on: OffsetDateTime,
	/// Token type reported by the issuer.
	#[serde(default = "default_token_type")]
	pub token_type: String,
}
impl Token {
	/// Returns a builder for a token issued for `resource`.
	pub fn builder(resource: impl Into<String>) -> TokenBuilder {
		TokenBuilder::new(resource)
	}

	/// Returns `true` when no token has been acquired yet.
	pub fn is_zero(&self) -> bool {
		self.access_token.is_empty()
	}

	/// Returns `true` if the token expires within `delta` of `now`.
	pub fn will_expire_within_at(&self, delta: Duration, now: OffsetDateTime) -> bool {
		self.expires_on - now <= delta
	}

	/// Returns `true` if the token expires within `delta` of the current clock.
	pub fn will_expire_within(&self, delta: Duration) -> bool {
		self.will_expire_within_at(delta, OffsetDateTime::now_utc())
	}

	/// Time left before expiry; negative once the token has expired.
	pub fn expires_in(&self) -> Duration {
		self.expires_on - OffsetDateTime::now_utc()
	}

	/// Returns the refresh token when one is present and non-empty.
	pub fn refresh_secret(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref().filter(|secret| !secret.is_empty())
	}

	/// Decodes the access token payload without verifying its signature.
	///
	/// The result is only fit for diagnostics; it must never drive a trust decision.
	pub fn unverified_claims(&self) -> Result<UnverifiedClaims, ClaimsError> {
		UnverifiedClaims::decode(self.access_token.expose())
	}
}
impl Default for Token {
	fn default() -> Self {
		Self {
			access_token: TokenSecret::default(),
			refresh_token: None,
			resource: String::new(),
			expires_on: OffsetDateTime::UNIX_EPOCH,
			token_type: default_token_type(),
		}
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("access_token", &self.access_token)
			.field("refresh_token", &self.refresh_token)
			.field("resource", &self.resource)
			.field("expires_on", &self.expires_on)
			.field("token_type", &self.token_type)
			.finish()
	}
}

/// Builder for [`Token`].
#[derive(Clone, Debug)]
pub struct TokenBuilder {
	resource: String,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	expires_on: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	token_type: Option<String>,
}
impl TokenBuilder {
	fn new(resource: impl Into<String>) -> Self {
		Self {
			resource: resource.into(),
			access_token: None,
			refresh_token: None,
			expires_on: None,
			expires_in: None,
			token_type: None,
		}
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_on(mut self, instant: OffsetDateTime) -> Self {
		self.expires_on = Some(instant);

		self
	}

	/// Sets a relative expiry measured from the moment [`build`](Self::build) runs.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Overrides the token type (defaults to `Bearer`).
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Consumes the builder and produces a [`Token`].
	pub fn build(self) -> Result<Token, TokenBuilderError> {
		let access_token = self
			.access_token
			.filter(|secret| !secret.is_empty())
			.ok_or(TokenBuilderError::MissingAccessToken)?;
		let expires_on = match (self.expires_on, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => OffsetDateTime::now_utc() + delta,
			(None, None) => return Err(TokenBuilderError::MissingExpiry),
		};

		Ok(Token {
			access_token,
			refresh_token: self.refresh_token.filter(|secret| !secret.is_empty()),
			resource: self.resource,
			expires_on,
			token_type: self.token_type.unwrap_or_else(default_token_type),
		})
	}
}

fn default_token_type() -> String {
	DEFAULT_TOKEN_TYPE.into()
}

fn unix_epoch() -> OffsetDateTime {
	OffsetDateTime::UNIX_EPOCH
}

/// Deserializers tolerant of the string-encoded numbers Azure AD endpoints return.
pub(crate) mod lenient {
	// crates.io
	use serde::{Deserializer, de::Error as DeError};
	// self
	use crate::{_prelude::*, auth::TokenSecret};

	#[derive(Deserialize)]
	#[serde(untagged)]
	enum IntOrString {
		Int(i64),
		Float(f64),
		Str(String),
	}
	impl IntOrString {
		fn into_i64<E>(self) -> Result<Option<i64>, E>
		where
			E: DeError,
		{
			match self {
				Self::Int(value) => Ok(Some(value)),
				Self::Float(value) => Ok(Some(value as i64)),
				Self::Str(raw) if raw.trim().is_empty() => Ok(None),
				Self::Str(raw) => raw
					.trim()
					.parse::<i64>()
					.map(Some)
					.map_err(|_| E::custom(format!("expected an integer, found `{raw}`"))),
			}
		}
	}

	/// Reads an optional integer encoded as a JSON number or string.
	pub(crate) fn option_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
	where
		D: Deserializer<'de>,
	{
		match Option::<IntOrString>::deserialize(deserializer)? {
			Some(value) => value.into_i64(),
			None => Ok(None),
		}
	}

	/// Reads an optional secret, treating empty strings as absent.
	pub(crate) fn optional_secret<'de, D>(deserializer: D) -> Result<Option<TokenSecret>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = Option::<String>::deserialize(deserializer)?;

		Ok(raw.filter(|value| !value.is_empty()).map(TokenSecret::new))
	}

	/// Unix-second timestamps written as strings and read from strings or numbers.
	pub(crate) mod unix_seconds {
		// crates.io
		use serde::{Deserializer, Serializer, de::Error as DeError};
		// self
		use crate::_prelude::*;

		pub(crate) fn serialize<S>(instant: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			serializer.serialize_str(&instant.unix_timestamp().to_string())
		}

		pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
		where
			D: Deserializer<'de>,
		{
			let seconds = super::option_i64(deserializer)?.unwrap_or_default();

			OffsetDateTime::from_unix_timestamp(seconds).map_err(D::Error::custom)
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn fixture(expires_on: OffsetDateTime) -> Token {
		Token::builder("6dae42f8-4368-4678-94ff-3960e28e3630")
			.access_token("access")
			.refresh_token("refresh")
			.expires_on(expires_on)
			.build()
			.expect("Token fixture should build successfully.")
	}

	#[test]
	fn expiry_window_is_inclusive() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let token = fixture(macros::datetime!(2025-01-01 00:01 UTC));

		assert!(token.will_expire_within_at(Duration::seconds(60), now));
		assert!(!token.will_expire_within_at(Duration::seconds(59), now));
		assert!(token.will_expire_within_at(Duration::ZERO, now + Duration::minutes(2)));
	}

	#[test]
	fn default_token_is_zero() {
		assert!(Token::default().is_zero());
		assert!(!fixture(OffsetDateTime::now_utc()).is_zero());
	}

	#[test]
	fn builder_requires_access_token_and_expiry() {
		assert_eq!(
			Token::builder("aud").expires_in(Duration::minutes(5)).build().unwrap_err(),
			TokenBuilderError::MissingAccessToken
		);
		assert_eq!(
			Token::builder("aud").access_token("a").build().unwrap_err(),
			TokenBuilderError::MissingExpiry
		);
	}

	#[test]
	fn builder_drops_empty_refresh_token() {
		let token = Token::builder("aud")
			.access_token("a")
			.refresh_token("")
			.expires_in(Duration::minutes(5))
			.build()
			.expect("Token with an empty refresh token should still build.");

		assert!(token.refresh_token.is_none());
		assert!(token.refresh_secret().is_none());
	}

	#[test]
	fn cache_format_accepts_string_and_number_timestamps() {
		let from_string: Token = serde_json::from_str(
			r#"{"access_token":"a","refresh_token":"","expires_on":"1735689600","resource":"aud","token_type":"Bearer"}"#,
		)
		.expect("String timestamps should deserialize.");
		let from_number: Token = serde_json::from_str(
			r#"{"access_token":"a","expires_on":1735689600,"resource":"aud"}"#,
		)
		.expect("Numeric timestamps should deserialize.");

		assert_eq!(from_string.expires_on, macros::datetime!(2025-01-01 00:00 UTC));
		assert_eq!(from_string.expires_on, from_number.expires_on);
		assert!(from_string.refresh_token.is_none());
		assert_eq!(from_number.token_type, "Bearer");
	}

	#[test]
	fn cache_format_writes_unix_seconds_as_string() {
		let token = fixture(macros::datetime!(2025-01-01 00:00 UTC));
		let value = serde_json::to_value(&token).expect("Token should serialize.");

		assert_eq!(value["expires_on"], "1735689600");
		assert_eq!(value["refresh_token"], "refresh");
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let rendered = format!("{:?}", fixture(OffsetDateTime::now_utc()));

		assert!(!rendered.contains("access\""));
		assert!(rendered.contains("TokenSecret(sha256:"));
	}
}
