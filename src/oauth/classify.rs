//! Error classification for identity endpoint failures.
//!
//! Structured OAuth fields (`error`, `error_description`) win, then hints in a non-JSON body,
//! then the HTTP status code.

// self
use crate::oauth::EndpointCall;

/// Canonical categories an endpoint failure maps onto.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
	/// The grant (refresh token, password, device code, assertion) was rejected.
	InvalidGrant,
	/// Client authentication failed.
	InvalidClient,
	/// Failure is temporary and may succeed later.
	Transient,
}

/// Primitive facts about a failed endpoint call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorContext {
	/// Operation that failed.
	pub call: EndpointCall,
	/// HTTP status code, when available.
	pub http_status: Option<u16>,
	/// OAuth `error` field.
	pub oauth_error: Option<String>,
	/// OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Preview of a non-JSON body.
	pub body_preview: Option<String>,
	/// Azure request ID, for correlating with sign-in logs.
	pub request_id: Option<String>,
}
impl ErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates an empty context for `call`.
	pub fn new(call: EndpointCall) -> Self {
		Self {
			call,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
			request_id: None,
		}
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth `error` code.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description`.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a truncated preview of a body that was not an OAuth error document.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		let body = body.into();

		if !body.trim().is_empty() {
			self.body_preview = Some(truncate_preview(body));
		}

		self
	}

	/// Adds the request ID reported by the endpoint.
	pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
		self.request_id = Some(request_id.into());

		self
	}

	/// Classifies the failure.
	pub fn classify(&self) -> ErrorKind {
		self.oauth_error
			.as_deref()
			.and_then(match_exact_value)
			.or_else(|| self.error_description.as_deref().and_then(match_exact_value))
			.or_else(|| classify_body(self.error_description.as_deref()))
			.or_else(|| classify_body(self.body_preview.as_deref()))
			.unwrap_or_else(|| classify_status(self.http_status))
	}

	/// One-line message suitable for an error's `reason`.
	pub fn summary(&self) -> String {
		let detail = self
			.error_description
			.as_deref()
			.or(self.oauth_error.as_deref())
			.or(self.body_preview.as_deref());

		let summary = match (detail, self.http_status) {
			(Some(detail), _) => format!("{} failed: {}", self.call, detail.trim()),
			(None, Some(status)) => format!("{} failed with HTTP {status}", self.call),
			(None, None) => format!("{} failed", self.call),
		};

		match &self.request_id {
			Some(request_id) => format!("{summary} (request ID {request_id})"),
			None => summary,
		}
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = body.chars().take(ErrorContext::BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

fn match_exact_value(value: &str) -> Option<ErrorKind> {
	const INVALID_GRANT: &[&str] =
		&["invalid_grant", "access_denied", "authorization_declined", "expired_token", "bad_verification_code"];
	const INVALID_CLIENT: &[&str] = &["invalid_client", "unauthorized_client"];
	const TRANSIENT: &[&str] = &["temporarily_unavailable", "server_error"];

	let matches = |set: &[&str]| set.iter().any(|known| value.eq_ignore_ascii_case(known));

	if matches(INVALID_GRANT) {
		Some(ErrorKind::InvalidGrant)
	} else if matches(INVALID_CLIENT) {
		Some(ErrorKind::InvalidClient)
	} else if matches(TRANSIENT) {
		Some(ErrorKind::Transient)
	} else {
		None
	}
}

fn classify_body(body: Option<&str>) -> Option<ErrorKind> {
	let lowered = body?.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant") => Some(ErrorKind::InvalidGrant),
		text if text.contains("invalid_client") => Some(ErrorKind::InvalidClient),
		text if text.contains("temporarily_unavailable") || text.contains("retry") =>
			Some(ErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> ErrorKind {
	match status {
		Some(400 | 404 | 410) => ErrorKind::InvalidGrant,
		Some(401) => ErrorKind::InvalidClient,
		_ => ErrorKind::Transient,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn oauth_fields_take_priority_over_status() {
		let ctx = ErrorContext::new(EndpointCall::RefreshToken)
			.with_http_status(503)
			.with_oauth_error("invalid_grant");

		assert_eq!(ctx.classify(), ErrorKind::InvalidGrant);
	}

	#[test]
	fn aad_description_hints_are_honoured() {
		let ctx = ErrorContext::new(EndpointCall::ClientCredentials)
			.with_oauth_error("unknown_error")
			.with_error_description("AADSTS7000215: invalid_client secret provided.");

		assert_eq!(ctx.classify(), ErrorKind::InvalidClient);
		assert!(ctx.summary().starts_with("client_credentials failed: AADSTS7000215"));
	}

	#[test]
	fn status_fallback_and_preview_truncation() {
		let ctx = ErrorContext::new(EndpointCall::ManagedIdentity)
			.with_http_status(401)
			.with_body_preview("x".repeat(300));

		assert_eq!(ctx.classify(), ErrorKind::InvalidClient);
		assert_eq!(ctx.body_preview.as_deref().map(|p| p.chars().count()), Some(257));
		assert_eq!(
			ErrorContext::new(EndpointCall::DirectoryLookup).with_http_status(429).classify(),
			ErrorKind::Transient
		);
		assert_eq!(
			ErrorContext::new(EndpointCall::Password).with_http_status(500).summary(),
			"password failed with HTTP 500"
		);
	}
}
