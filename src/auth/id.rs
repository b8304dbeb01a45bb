//! Azure AD identifiers for the tenant, the client application, and the target server.
//!
//! Every identifier is either a GUID or a name: tenants accept aliases (`organizations`) and
//! verified domains, servers accept application ID URIs. The GUID form is parsed once at
//! construction so callers can branch on it without re-parsing.

// std
use std::ops::Deref;
// crates.io
use uuid::Uuid;
// self
use crate::_prelude::*;

const MAX_LEN: usize = 128;

/// Which identifier a value was meant to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdKind {
	/// Directory (tenant).
	Tenant,
	/// Client application.
	Client,
	/// API server application (token audience).
	Server,
}
impl IdKind {
	/// Validates `raw` for this kind and returns its GUID form, if any.
	fn parse(self, raw: &str) -> Result<Option<Uuid>, IdentifierError> {
		if raw.is_empty() {
			return Err(IdentifierError::Empty { kind: self });
		}
		if raw.chars().any(char::is_whitespace) {
			return Err(IdentifierError::ContainsWhitespace { kind: self });
		}
		if raw.len() > MAX_LEN {
			return Err(IdentifierError::TooLong { kind: self, max: MAX_LEN });
		}
		// Only the hyphenated form counts; `urn:uuid:` and braced forms stay names.
		if let Some(guid) = Some(raw).filter(|raw| raw.len() == 36).and_then(|raw| Uuid::parse_str(raw).ok()) {
			return Ok(Some(guid));
		}

		// Tenants become a path segment of the authority URL.
		let path_unsafe = raw.chars().find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')));

		match path_unsafe {
			Some(character) if self == Self::Tenant => Err(IdentifierError::InvalidTenant { character }),
			_ => Ok(None),
		}
	}
}
impl Display for IdKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(match self {
			Self::Tenant => "Tenant",
			Self::Client => "Client",
			Self::Server => "Server",
		})
	}
}

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} ID cannot be empty.")]
	Empty {
		/// Identifier being parsed.
		kind: IdKind,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} ID contains whitespace.")]
	ContainsWhitespace {
		/// Identifier being parsed.
		kind: IdKind,
	},
	/// The identifier exceeded the allowed length.
	#[error("{kind} ID exceeds {max} characters.")]
	TooLong {
		/// Identifier being parsed.
		kind: IdKind,
		/// Maximum permitted length.
		max: usize,
	},
	/// The tenant is neither a GUID nor a domain-like name.
	#[error("Tenant ID contains `{character}`; expected a GUID, a domain, or an alias.")]
	InvalidTenant {
		/// First offending character.
		character: char,
	},
}

macro_rules! azure_id {
	($(#[$meta:meta])* $name:ident => $kind:expr) => {
		$(#[$meta])*
		#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name {
			raw: String,
			guid: Option<Uuid>,
		}
		impl $name {
			/// Validates `value` and records whether it is a GUID.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				let raw = value.into();
				let guid = $kind.parse(&raw)?;

				Ok(Self { raw, guid })
			}

			/// The GUID form, when the value was written as one.
			pub fn guid(&self) -> Option<Uuid> {
				self.guid
			}

			/// Returns `true` when the value is a GUID rather than a name.
			pub fn is_guid(&self) -> bool {
				self.guid.is_some()
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				&self.raw
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.raw
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.raw
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({})", $kind, self.raw)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.raw)
			}
		}
	};
}

azure_id! {
	/// Directory identifier: a GUID, a verified domain, or an alias such as `organizations`.
	TenantId => IdKind::Tenant
}
azure_id! {
	/// Application (client) ID registered with Azure AD.
	ClientId => IdKind::Client
}
azure_id! {
	/// Application ID or ID URI of the cluster API server (the token audience).
	ServerId => IdKind::Server
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn guid_form_is_detected_once() {
		let tenant = TenantId::new("72f988bf-86f1-41af-91ab-2d7cd011db47")
			.expect("GUID tenant should be valid.");
		let alias = TenantId::new("organizations").expect("Alias tenant should be valid.");

		assert!(tenant.is_guid());
		assert_eq!(tenant.guid().map(|g| g.to_string()).as_deref(), Some(tenant.as_ref()));
		assert!(!alias.is_guid());
		assert_eq!(format!("{tenant:?}"), "Tenant(72f988bf-86f1-41af-91ab-2d7cd011db47)");
	}

	#[test]
	fn tenants_must_be_path_safe() {
		TenantId::new("contoso.onmicrosoft.com").expect("Domain tenant should be valid.");

		assert_eq!(
			TenantId::new("contoso/../common"),
			Err(IdentifierError::InvalidTenant { character: '/' })
		);
		assert_eq!(TenantId::new("a?b"), Err(IdentifierError::InvalidTenant { character: '?' }));
		ServerId::new("api://aks-server/.default").expect("Server ID URIs should be valid.");

		let urn = ClientId::new("urn:uuid:80faf920-1908-4b52-b5ef-a8e7bedfc67a")
			.expect("URN client IDs should be valid names.");

		assert!(!urn.is_guid());
	}

	#[test]
	fn blank_and_oversized_values_are_rejected() {
		assert_eq!(ClientId::new(""), Err(IdentifierError::Empty { kind: IdKind::Client }));
		assert_eq!(
			TenantId::new(" tenant"),
			Err(IdentifierError::ContainsWhitespace { kind: IdKind::Tenant })
		);
		assert!(ServerId::new("with space").is_err());
		ClientId::new("a".repeat(MAX_LEN)).expect("Exact length should succeed.");
		assert_eq!(
			ClientId::new("a".repeat(MAX_LEN + 1)),
			Err(IdentifierError::TooLong { kind: IdKind::Client, max: MAX_LEN })
		);
	}

	#[test]
	fn deserialization_validates() {
		let server: ServerId = serde_json::from_str("\"6dae42f8-4368-4678-94ff-3960e28e3630\"")
			.expect("Server ID should deserialize.");

		assert!(server.is_guid());
		assert!(serde_json::from_str::<TenantId>("\"a/b\"").is_err());
	}
}
