//! Transport seam for identity endpoint calls (token endpoints, IMDS, Microsoft Graph).
//!
//! [`TokenHttpClient`] hands out short-lived [`AsyncHttpClient`] handles that each carry a
//! [`ResponseMetadataSlot`]. Handles clear the slot before dispatching and record the status and
//! `Retry-After` hint once a response arrives, so error mapping can classify failures with the
//! same metadata no matter which transport sits underneath.

// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use reqwest::{
	header::{HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::ConfigError};

/// Abstraction over HTTP transports able to execute identity endpoint requests while
/// publishing response metadata.
///
/// Implementations must be `Send + Sync + 'static`, and the futures their handles return must be
/// `Send`, so the facade can box request futures without borrowing the transport.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds a handle that records response metadata in `slot`.
	///
	/// Handles call [`ResponseMetadataSlot::take`] before sending and
	/// [`ResponseMetadataSlot::store`] once a status is known.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Metadata captured from the most recent HTTP response.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code, if a response arrived.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
	/// Azure request ID (`x-ms-request-id` on Azure AD and IMDS, `request-id` on Graph).
	pub request_id: Option<String>,
}
impl ResponseMetadata {
	const REQUEST_ID_HEADERS: [&'static str; 2] = ["x-ms-request-id", "request-id"];

	fn from_response(status: u16, headers: &HeaderMap) -> Self {
		let request_id = Self::REQUEST_ID_HEADERS
			.iter()
			.find_map(|name| headers.get(*name)?.to_str().ok())
			.map(|value| value.trim().to_owned())
			.filter(|value| !value.is_empty());

		Self { status: Some(status), retry_after: parse_retry_after(headers), request_id }
	}
}

/// Thread-safe slot sharing [`ResponseMetadata`] between transport and error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Reqwest-backed transport. Identity endpoints answer directly, so redirects are not followed.
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(ReqwestClient);
impl ReqwestHttpClient {
	const DEFAULT_TIMEOUT: Duration = Duration::seconds(30);

	/// Builds a client with the given overall request timeout and redirects disabled.
	pub fn with_timeout(timeout: Duration) -> Result<Self, ConfigError> {
		let client =
			ReqwestClient::builder().redirect(Policy::none()).timeout(timeout.unsigned_abs()).build()?;

		Ok(Self(client))
	}
}
impl Default for ReqwestHttpClient {
	fn default() -> Self {
		Self::with_timeout(Self::DEFAULT_TIMEOUT)
			.unwrap_or_else(|_| Self(ReqwestClient::default()))
	}
}
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = ReqwestHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ReqwestHandle { client: self.0.clone(), slot }
	}
}

/// Handle returned by [`ReqwestHttpClient`]; records each response into its slot.
#[derive(Clone, Debug)]
pub struct ReqwestHandle {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}
impl<'c> AsyncHttpClient<'c> for ReqwestHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let response =
				self.client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			self.slot.store(ResponseMetadata::from_response(status.as_u16(), &headers));

			let mut converted =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
	let delta = match raw.parse::<u32>() {
		Ok(secs) => Duration::seconds(i64::from(secs)),
		Err(_) => OffsetDateTime::parse(raw, &Rfc2822).ok()? - OffsetDateTime::now_utc(),
	};

	Some(delta).filter(|delta| delta.is_positive())
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	// self
	use super::*;

	#[test]
	fn retry_after_accepts_delta_seconds() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));

		assert_eq!(parse_retry_after(&headers), Some(Duration::seconds(7)));
	}

	#[test]
	fn retry_after_ignores_past_dates_and_garbage() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));

		assert_eq!(parse_retry_after(&headers), None);

		headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));

		assert_eq!(parse_retry_after(&headers), None);
	}

	#[test]
	fn request_id_prefers_the_azure_ad_header() {
		let mut headers = HeaderMap::new();

		headers.insert("request-id", HeaderValue::from_static("graph-id"));

		assert_eq!(
			ResponseMetadata::from_response(404, &headers).request_id.as_deref(),
			Some("graph-id")
		);

		headers.insert("x-ms-request-id", HeaderValue::from_static("aad-id"));

		let meta = ResponseMetadata::from_response(400, &headers);

		assert_eq!(meta.request_id.as_deref(), Some("aad-id"));
		assert_eq!(meta.status, Some(400));
	}

	#[test]
	fn metadata_slot_is_consumed_on_take() {
		let slot = ResponseMetadataSlot::default();

		slot.store(ResponseMetadata { status: Some(429), ..Default::default() });

		assert_eq!(slot.take().and_then(|meta| meta.status), Some(429));
		assert!(slot.take().is_none());
	}
}
