//! Azure AD endpoint facade.
//!
//! [`AadFacade`] owns the transport and its error mapper, builds form and GET requests, parses
//! the token responses Azure AD, IMDS, and workload identity endpoints return, and translates
//! failures into the crate's error taxonomy. Token responses are parsed leniently because the v1
//! endpoints encode numbers as strings, which rules out the typed `oauth2` client responses.

pub mod classify;

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	basic::BasicErrorResponse,
	http::{
		Method,
		header::{ACCEPT, CONTENT_TYPE, HeaderName},
	},
};
use serde::de::DeserializeOwned;
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{Token, TokenSecret, token::lenient},
	error::{ConfigError, TransientError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	oauth::classify::{ErrorContext, ErrorKind},
};

/// Boxed future returned by facade calls.
pub type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Identity endpoint operations the facade performs; used for error context and span labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EndpointCall {
	/// `grant_type=refresh_token` exchange.
	RefreshToken,
	/// Client credentials with a secret or a federated assertion.
	ClientCredentials,
	/// Resource owner password credentials.
	Password,
	/// Device authorization request.
	DeviceAuthorization,
	/// Device code polling.
	DeviceCode,
	/// Instance metadata service token request.
	ManagedIdentity,
	/// Directory object lookup against Microsoft Graph.
	DirectoryLookup,
}
impl EndpointCall {
	/// Stable label for logs and metrics.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::RefreshToken => "refresh_token",
			Self::ClientCredentials => "client_credentials",
			Self::Password => "password",
			Self::DeviceAuthorization => "device_authorization",
			Self::DeviceCode => "device_code",
			Self::ManagedIdentity => "managed_identity",
			Self::DirectoryLookup => "directory_lookup",
		}
	}
}
impl Display for EndpointCall {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(
		&self,
		call: EndpointCall,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		call: EndpointCall,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(call, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => TransientError::TokenEndpoint {
				message: format!("HTTP client error during {call}: {message}"),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
			_ => TransientError::TokenEndpoint {
				message: format!("HTTP client error during {call}"),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
		}
	}
}

/// Result of one device code poll.
#[derive(Debug)]
pub enum PollOutcome {
	/// The user finished signing in.
	Issued(Token),
	/// Sign-in has not completed yet.
	Pending,
	/// The endpoint asked for a longer polling interval.
	SlowDown,
}

/// Facade over a [`TokenHttpClient`] for Azure AD style endpoints.
pub struct AadFacade<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> AadFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a facade from a transport and its error mapper.
	pub fn new(http_client: impl Into<Arc<C>>, error_mapper: impl Into<Arc<M>>) -> Self {
		Self { http_client: http_client.into(), error_mapper: error_mapper.into() }
	}

	/// Posts `form` to a token endpoint and parses the issued token.
	///
	/// Responses that omit `resource` are stamped with `resource`.
	pub fn exchange<'a>(
		&'a self,
		call: EndpointCall,
		endpoint: &'a Url,
		form: &'a [(&'a str, &'a str)],
		resource: &'a str,
	) -> FacadeFuture<'a, Token> {
		Box::pin(async move {
			let request = form_request(endpoint, form)?;

			self.request_token(call, request, resource).await
		})
	}

	/// Sends a prepared request and parses the issued token.
	pub fn request_token<'a>(
		&'a self,
		call: EndpointCall,
		request: HttpRequest,
		resource: &'a str,
	) -> FacadeFuture<'a, Token> {
		Box::pin(async move {
			let (meta, response) = self.dispatch(call, request).await?;

			if !response.status().is_success() {
				return Err(map_error_response(call, meta.as_ref(), response.body()));
			}

			parse_token_response(response.body(), meta_status(meta.as_ref()))?.into_token(resource)
		})
	}

	/// Polls a device code grant once.
	pub fn poll<'a>(
		&'a self,
		endpoint: &'a Url,
		form: &'a [(&'a str, &'a str)],
		resource: &'a str,
	) -> FacadeFuture<'a, PollOutcome> {
		Box::pin(async move {
			let request = form_request(endpoint, form)?;
			let (meta, response) = self.dispatch(EndpointCall::DeviceCode, request).await?;

			if response.status().is_success() {
				let token = parse_token_response(response.body(), meta_status(meta.as_ref()))?
					.into_token(resource)?;

				return Ok(PollOutcome::Issued(token));
			}

			match serde_json::from_slice::<BasicErrorResponse>(response.body()) {
				Ok(body) if body.error().as_ref() == "authorization_pending" =>
					Ok(PollOutcome::Pending),
				Ok(body) if body.error().as_ref() == "slow_down" => Ok(PollOutcome::SlowDown),
				_ => Err(map_error_response(EndpointCall::DeviceCode, meta.as_ref(), response.body())),
			}
		})
	}

	/// Posts `form` and deserializes an arbitrary JSON body.
	pub fn post_json<'a, T>(
		&'a self,
		call: EndpointCall,
		endpoint: &'a Url,
		form: &'a [(&'a str, &'a str)],
	) -> FacadeFuture<'a, T>
	where
		T: 'a + Send + DeserializeOwned,
	{
		Box::pin(async move {
			let request = form_request(endpoint, form)?;

			self.request_json(call, request).await
		})
	}

	/// Sends a prepared request and deserializes an arbitrary JSON body.
	pub fn request_json<'a, T>(&'a self, call: EndpointCall, request: HttpRequest) -> FacadeFuture<'a, T>
	where
		T: 'a + Send + DeserializeOwned,
	{
		Box::pin(async move {
			let (meta, response) = self.dispatch(call, request).await?;

			if !response.status().is_success() {
				return Err(map_error_response(call, meta.as_ref(), response.body()));
			}

			parse_json(response.body(), meta_status(meta.as_ref()))
		})
	}

	async fn dispatch(
		&self,
		call: EndpointCall,
		request: HttpRequest,
	) -> Result<(Option<ResponseMetadata>, HttpResponse)> {
		let slot = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(slot.clone());

		tracing::debug!(call = call.as_str(), uri = %request.uri(), "Calling identity endpoint.");

		match handle.call(request).await {
			Ok(response) => Ok((slot.take(), response)),
			Err(e) => Err(self.error_mapper.map_transport_error(call, slot.take().as_ref(), e)),
		}
	}
}
impl Default for AadFacade {
	fn default() -> Self {
		Self::new(ReqwestHttpClient::default(), ReqwestTransportErrorMapper)
	}
}
impl<C, M> Debug for AadFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AadFacade").finish_non_exhaustive()
	}
}

/// Token response shared by the v1/v2 token endpoints and IMDS.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
	/// Issued access token.
	pub access_token: TokenSecret,
	/// Issued refresh token, if any.
	#[serde(default, deserialize_with = "lenient::optional_secret")]
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime in seconds.
	#[serde(default, deserialize_with = "lenient::option_i64")]
	pub expires_in: Option<i64>,
	/// Absolute expiry as Unix seconds.
	#[serde(default, deserialize_with = "lenient::option_i64")]
	pub expires_on: Option<i64>,
	/// Audience echoed by v1 endpoints.
	#[serde(default)]
	pub resource: Option<String>,
	/// Token type.
	#[serde(default)]
	pub token_type: Option<String>,
}
impl TokenResponse {
	/// Converts the response into a [`Token`], preferring `expires_on` over `expires_in`.
	pub fn into_token(self, requested_resource: &str) -> Result<Token> {
		let resource = self
			.resource
			.filter(|value| !value.is_empty())
			.unwrap_or_else(|| requested_resource.to_owned());
		let mut builder = Token::builder(resource).access_token(self.access_token.expose());

		match (self.expires_on, self.expires_in) {
			(Some(seconds), _) => {
				let instant = OffsetDateTime::from_unix_timestamp(seconds)
					.map_err(|_| ConfigError::ExpiryOutOfRange { value: seconds })?;

				builder = builder.expires_on(instant);
			},
			(None, Some(seconds)) => {
				if !(0..=i64::from(u32::MAX)).contains(&seconds) {
					return Err(ConfigError::ExpiryOutOfRange { value: seconds }.into());
				}

				builder = builder.expires_in(Duration::seconds(seconds));
			},
			(None, None) => return Err(ConfigError::MissingExpiry.into()),
		}

		if let Some(refresh) = self.refresh_token {
			builder = builder.refresh_token(refresh.expose());
		}
		if let Some(token_type) = self.token_type.filter(|value| !value.is_empty()) {
			builder = builder.token_type(token_type);
		}

		builder.build().map_err(|e| ConfigError::from(e).into())
	}
}

/// Builds a `application/x-www-form-urlencoded` POST request.
pub fn form_request(endpoint: &Url, form: &[(&str, &str)]) -> Result<HttpRequest> {
	let body = form_urlencoded::Serializer::new(String::new()).extend_pairs(form).finish();

	oauth2::http::Request::builder()
		.method(Method::POST)
		.uri(endpoint.as_str())
		.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
		.header(ACCEPT, "application/json")
		.body(body.into_bytes())
		.map_err(|e| ConfigError::from(e).into())
}

/// Builds a GET request carrying the extra `headers`.
pub fn get_request(endpoint: &Url, headers: &[(HeaderName, &str)]) -> Result<HttpRequest> {
	let mut builder = oauth2::http::Request::builder()
		.method(Method::GET)
		.uri(endpoint.as_str())
		.header(ACCEPT, "application/json");

	for (name, value) in headers {
		builder = builder.header(name, *value);
	}

	builder.body(Vec::new()).map_err(|e| ConfigError::from(e).into())
}

/// Builds a JSON POST request carrying the extra `headers`.
pub fn json_request(
	endpoint: &Url,
	headers: &[(HeaderName, &str)],
	body: &serde_json::Value,
) -> Result<HttpRequest> {
	let mut builder = oauth2::http::Request::builder()
		.method(Method::POST)
		.uri(endpoint.as_str())
		.header(CONTENT_TYPE, "application/json")
		.header(ACCEPT, "application/json");

	for (name, value) in headers {
		builder = builder.header(name, *value);
	}

	builder.body(body.to_string().into_bytes()).map_err(|e| ConfigError::from(e).into())
}

fn parse_token_response(body: &[u8], status: Option<u16>) -> Result<TokenResponse> {
	parse_json(body, status)
}

fn parse_json<T>(body: &[u8], status: Option<u16>) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| TransientError::TokenResponseParse { source, status }.into())
}

fn map_error_response(call: EndpointCall, meta: Option<&ResponseMetadata>, body: &[u8]) -> Error {
	let mut ctx = ErrorContext::new(call);

	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}
	if let Some(request_id) = meta.and_then(|value| value.request_id.as_deref()) {
		ctx = ctx.with_request_id(request_id);
	}

	match serde_json::from_slice::<BasicErrorResponse>(body) {
		Ok(response) => {
			ctx = ctx.with_oauth_error(response.error().as_ref());

			if let Some(description) = response.error_description() {
				ctx = ctx.with_error_description(description.as_str());
			}
		},
		Err(_) => ctx = ctx.with_body_preview(String::from_utf8_lossy(body)),
	}

	let message = ctx.summary();

	match ctx.classify() {
		ErrorKind::InvalidGrant => Error::InvalidGrant { reason: message },
		ErrorKind::InvalidClient => Error::InvalidClient { reason: message },
		ErrorKind::Transient => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_reqwest_error(call: EndpointCall, meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: format!("Request timed out during {call}"),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::from(err).into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
