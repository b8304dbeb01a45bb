//! Crate-level error types shared by the orchestrator, login methods, caches, and output.

// self
use crate::{_prelude::*, login::LoginMethod};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error surfaced by public APIs.
///
/// The first group of variants carries the orchestrator's context (which stage failed), the
/// rest describe what went wrong underneath.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The cache exists but cannot be read or decoded.
	#[error("Unable to read from token cache {}.", .path.display())]
	CacheRead {
		/// Cache location that failed.
		path: PathBuf,
		/// Underlying cache failure.
		#[source]
		source: crate::cache::CacheError,
	},
	/// A freshly acquired token could not be persisted.
	#[error("Unable to write to token cache {}.", .path.display())]
	CacheWrite {
		/// Cache location that failed.
		path: PathBuf,
		/// Underlying cache failure.
		#[source]
		source: crate::cache::CacheError,
	},
	/// The configured login method failed to produce a token.
	#[error("Failed to get token via {method} login.")]
	Login {
		/// Login method that was attempted.
		method: LoginMethod,
		/// Provider failure.
		#[source]
		source: Box<Error>,
	},
	/// The credential could not be serialized or written.
	#[error(transparent)]
	Output(#[from] crate::exec::OutputError),

	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Identity provider rejected the grant (e.g., expired refresh token or bad password).
	#[error("Identity provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or helper-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or helper-supplied reason string.
		reason: String,
	},
	/// A login method could not obtain its underlying credential.
	#[error("Credential is unavailable: {reason}.")]
	CredentialUnavailable {
		/// Human-readable explanation.
		reason: String,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// An endpoint URL could not be derived.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Unknown cloud environment name.
	#[error("Unknown Azure environment `{name}`.")]
	UnknownEnvironment {
		/// Name supplied by the caller.
		name: String,
	},
	/// Unknown login method name.
	#[error("Unknown login method `{name}`; expected one of devicecode, spn, ropc, msi, workloadidentity, azurecli.")]
	UnknownLoginMethod {
		/// Name supplied by the caller.
		name: String,
	},
	/// A login method needs an option that was not supplied.
	#[error("The {method} login requires {option}.")]
	MissingOption {
		/// Login method being configured.
		method: LoginMethod,
		/// Flag (or environment variable) that is missing.
		option: &'static str,
	},
	/// An identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Token builder validation failed.
	#[error("Unable to build token.")]
	TokenBuild(#[from] crate::auth::TokenBuilderError),
	/// Token endpoint response carried neither `expires_on` nor `expires_in`.
	#[error("Token endpoint response is missing its expiry.")]
	MissingExpiry,
	/// Token endpoint returned an expiry outside the supported range.
	#[error("The token expiry `{value}` is out of range.")]
	ExpiryOutOfRange {
		/// Raw value returned by the endpoint.
		value: i64,
	},
	/// `KUBERNETES_EXEC_INFO` could not be parsed.
	#[error("KUBERNETES_EXEC_INFO is malformed.")]
	ExecInfo(#[source] serde_json::Error),
	/// The client asked for an exec credential version this helper cannot produce.
	#[error("Unsupported exec credential apiVersion `{version}`.")]
	UnsupportedApiVersion {
		/// Version requested by the client.
		version: String,
	},
	/// The home directory could not be resolved for the default cache location.
	#[error("Unable to resolve the home directory for the default token cache.")]
	MissingHomeDir,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the identity endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the identity endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
