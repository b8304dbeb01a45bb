//! Unverified JWT payload decoding used only for diagnostic logging.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::_prelude::*;

/// Errors raised while decoding an access token payload.
#[derive(Debug, ThisError)]
pub enum ClaimsError {
	/// The token does not have the `header.payload.signature` shape.
	#[error("Access token is not a JWT.")]
	NotAJwt,
	/// The payload segment is not valid base64url.
	#[error("Access token payload is not valid base64url.")]
	Base64(#[from] base64::DecodeError),
	/// The payload is not a JSON object with the expected claim types.
	#[error("Access token payload is not valid JSON.")]
	Json(#[from] serde_json::Error),
}

/// Claims read from an access token without signature verification.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct UnverifiedClaims {
	/// Group memberships (object IDs, or names when the app emits `sAMAccountName`).
	#[serde(default)]
	pub groups: Vec<String>,
	/// Object ID of the signed-in principal.
	pub oid: Option<String>,
	/// Tenant that issued the token.
	pub tid: Option<String>,
	/// User principal name, present for user tokens.
	pub upn: Option<String>,
	/// Expiry as Unix seconds.
	pub exp: Option<i64>,
	/// Every other claim, untouched.
	#[serde(flatten)]
	pub extra: BTreeMap<String, serde_json::Value>,
}
impl UnverifiedClaims {
	/// Decodes the payload segment of `jwt`.
	pub fn decode(jwt: &str) -> Result<Self, ClaimsError> {
		let mut segments = jwt.split('.');
		let payload = match (segments.next(), segments.next(), segments.next()) {
			(Some(_), Some(payload), Some(_)) if !payload.is_empty() => payload,
			_ => return Err(ClaimsError::NotAJwt),
		};
		let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;

		Ok(serde_json::from_slice(&bytes)?)
	}

	/// Returns `true` when every group entry is an object ID that still needs resolving.
	pub fn groups_are_object_ids(&self) -> bool {
		!self.groups.is_empty()
			&& self.groups.iter().all(|group| uuid::Uuid::parse_str(group).is_ok())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn jwt(payload: &str) -> String {
		format!("eyJhbGciOiJub25lIn0.{}.sig", URL_SAFE_NO_PAD.encode(payload))
	}

	#[test]
	fn decodes_groups_and_keeps_unknown_claims() {
		let claims = UnverifiedClaims::decode(&jwt(
			r#"{"groups":["00000000-0000-0000-0000-000000000001"],"oid":"o","aud":"server","exp":1735689600}"#,
		))
		.expect("Well-formed payload should decode.");

		assert_eq!(claims.groups, vec!["00000000-0000-0000-0000-000000000001".to_owned()]);
		assert_eq!(claims.oid.as_deref(), Some("o"));
		assert_eq!(claims.exp, Some(1_735_689_600));
		assert_eq!(claims.extra.get("aud"), Some(&serde_json::json!("server")));
		assert!(claims.groups_are_object_ids());
	}

	#[test]
	fn group_names_are_not_object_ids() {
		let claims = UnverifiedClaims::decode(&jwt(r#"{"groups":["cluster-admins"]}"#))
			.expect("Well-formed payload should decode.");

		assert!(!claims.groups_are_object_ids());
		assert!(!UnverifiedClaims::default().groups_are_object_ids());
	}

	#[test]
	fn rejects_opaque_tokens() {
		assert!(matches!(UnverifiedClaims::decode("opaque"), Err(ClaimsError::NotAJwt)));
		assert!(matches!(UnverifiedClaims::decode("a.!!.c"), Err(ClaimsError::Base64(_))));
		assert!(matches!(
			UnverifiedClaims::decode(&format!("a.{}.c", URL_SAFE_NO_PAD.encode("[]"))),
			Err(ClaimsError::Json(_))
		));
	}
}
