//! Exec credential output contract.
//!
//! kubectl reads exactly one `ExecCredential` JSON document from the helper's stdout. The writer
//! renders the whole document into memory first and hands it to the sink in a single write, so a
//! failure never leaves a truncated document behind.

// std
use std::io::Write;
// crates.io
use time::format_description::well_known::Rfc3339;
// self
use crate::{_prelude::*, auth::Token, error::ConfigError};

/// Environment variable kubectl uses to describe the exec request.
pub const KUBERNETES_EXEC_INFO: &str = "KUBERNETES_EXEC_INFO";

const EXEC_CREDENTIAL_KIND: &str = "ExecCredential";

/// Failure to render or emit the credential document.
#[derive(Debug, ThisError)]
pub enum OutputError {
	/// The expiry could not be rendered as RFC 3339.
	#[error("Unable to format the credential expiry.")]
	Timestamp(#[from] time::error::Format),
	/// The document could not be serialized.
	#[error("Unable to serialize the exec credential.")]
	Serialize(#[from] serde_json::Error),
	/// The output sink rejected the write.
	#[error("Unable to write the exec credential to stdout.")]
	Io(#[from] std::io::Error),
}

/// `client.authentication.k8s.io` versions the helper can emit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecApiVersion {
	/// `client.authentication.k8s.io/v1beta1`.
	#[default]
	V1Beta1,
	/// `client.authentication.k8s.io/v1`.
	V1,
}
impl ExecApiVersion {
	/// Full `apiVersion` string.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::V1Beta1 => "client.authentication.k8s.io/v1beta1",
			Self::V1 => "client.authentication.k8s.io/v1",
		}
	}

	/// Picks the version requested through `KUBERNETES_EXEC_INFO`, defaulting to `v1beta1`.
	pub fn from_exec_info(raw: Option<&str>) -> Result<Self, ConfigError> {
		#[derive(Deserialize)]
		#[serde(rename_all = "camelCase")]
		struct ExecInfo {
			#[serde(default)]
			api_version: Option<String>,
		}

		let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
			return Ok(Self::default());
		};
		let info: ExecInfo = serde_json::from_str(raw).map_err(ConfigError::ExecInfo)?;

		match info.api_version.as_deref() {
			None | Some("") => Ok(Self::default()),
			Some(version) => version.parse(),
		}
	}
}
impl Display for ExecApiVersion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ExecApiVersion {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"client.authentication.k8s.io/v1beta1" => Ok(Self::V1Beta1),
			"client.authentication.k8s.io/v1" => Ok(Self::V1),
			other => Err(ConfigError::UnsupportedApiVersion { version: other.to_owned() }),
		}
	}
}

/// The document written to stdout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredential {
	/// `client.authentication.k8s.io/<version>`.
	pub api_version: String,
	/// Always `ExecCredential`.
	pub kind: String,
	/// Credential payload.
	pub status: ExecCredentialStatus,
}
impl ExecCredential {
	/// Builds the document for `token`.
	pub fn new(api_version: ExecApiVersion, token: &Token) -> Result<Self, OutputError> {
		Ok(Self {
			api_version: api_version.as_str().to_owned(),
			kind: EXEC_CREDENTIAL_KIND.to_owned(),
			status: ExecCredentialStatus {
				token: token.access_token.expose().to_owned(),
				expiration_timestamp: format_expiry(token.expires_on)?,
			},
		})
	}
}

/// `status` block of an [`ExecCredential`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredentialStatus {
	/// Bearer token.
	pub token: String,
	/// RFC 3339 expiry in UTC.
	pub expiration_timestamp: String,
}
impl Debug for ExecCredentialStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ExecCredentialStatus")
			.field("token", &"<redacted>")
			.field("expiration_timestamp", &self.expiration_timestamp)
			.finish()
	}
}

/// Serializes a token into the credential document and writes it to a sink.
pub trait CredentialWriter: Send + Sync {
	/// Writes exactly one complete document, or nothing at all when rendering fails.
	fn write(&self, token: &Token, out: &mut dyn Write) -> Result<(), OutputError>;
}

/// Default [`CredentialWriter`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ExecCredentialWriter {
	api_version: ExecApiVersion,
}
impl ExecCredentialWriter {
	/// Creates a writer emitting `api_version`.
	pub fn new(api_version: ExecApiVersion) -> Self {
		Self { api_version }
	}

	/// Version this writer emits.
	pub fn api_version(&self) -> ExecApiVersion {
		self.api_version
	}
}
impl CredentialWriter for ExecCredentialWriter {
	fn write(&self, token: &Token, out: &mut dyn Write) -> Result<(), OutputError> {
		let credential = ExecCredential::new(self.api_version, token)?;
		let mut buf = serde_json::to_vec(&credential)?;

		buf.push(b'\n');
		out.write_all(&buf)?;
		out.flush()?;

		Ok(())
	}
}

fn format_expiry(expires_on: OffsetDateTime) -> Result<String, OutputError> {
	let whole_seconds = OffsetDateTime::from_unix_timestamp(expires_on.unix_timestamp())
		.unwrap_or(expires_on);

	Ok(whole_seconds.format(&Rfc3339)?)
}
