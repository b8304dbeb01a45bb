//! Device code login against the Azure AD v1 endpoints.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, TenantId, Token, token::lenient},
	cloud::OAuthConfig,
	config::Options,
	error::ConfigError,
	http::TokenHttpClient,
	login::{LoginFuture, TokenProvider},
	oauth::{AadFacade, EndpointCall, PollOutcome, TransportErrorMapper},
};

const DEFAULT_INTERVAL_SECS: i64 = 5;
const DEFAULT_EXPIRES_IN_SECS: i64 = 900;
const SLOW_DOWN_STEP: Duration = Duration::seconds(5);

/// Device authorization response.
#[derive(Clone, Debug, Deserialize)]
pub struct DeviceAuthorization {
	/// Code the user types at the verification page.
	pub user_code: String,
	/// Code the client polls with.
	pub device_code: String,
	/// Verification page (`verification_url` on v1, `verification_uri` on v2).
	#[serde(default, alias = "verification_uri")]
	pub verification_url: Option<String>,
	/// Seconds until the device code expires.
	#[serde(default, deserialize_with = "lenient::option_i64")]
	pub expires_in: Option<i64>,
	/// Minimum polling interval in seconds.
	#[serde(default, deserialize_with = "lenient::option_i64")]
	pub interval: Option<i64>,
	/// Human-readable instructions.
	#[serde(default)]
	pub message: Option<String>,
}
impl DeviceAuthorization {
	/// Instructions to show the user.
	pub fn instructions(&self) -> String {
		match (&self.message, &self.verification_url) {
			(Some(message), _) if !message.is_empty() => message.clone(),
			(_, Some(url)) => format!(
				"To sign in, use a web browser to open the page {url} and enter the code {} to authenticate.",
				self.user_code
			),
			_ => format!("To sign in, enter the code {} to authenticate.", self.user_code),
		}
	}

	/// Instant after which polling stops, rejecting lifetimes outside `0..=u32::MAX` seconds.
	pub fn deadline(&self, now: OffsetDateTime) -> Result<OffsetDateTime> {
		let seconds = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);

		if !(0..=i64::from(u32::MAX)).contains(&seconds) {
			return Err(ConfigError::ExpiryOutOfRange { value: seconds }.into());
		}

		now.checked_add(Duration::seconds(seconds))
			.ok_or(Error::Config(ConfigError::ExpiryOutOfRange { value: seconds }))
	}

	/// Initial polling interval, clamped to `0..=u32::MAX` seconds.
	pub fn poll_interval(&self) -> Duration {
		Duration::seconds(
			self.interval.unwrap_or(DEFAULT_INTERVAL_SECS).clamp(0, i64::from(u32::MAX)),
		)
	}
}

/// Device code [`TokenProvider`]. Instructions go to stderr.
pub struct DeviceCodeLogin<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: Arc<AadFacade<C, M>>,
	oauth: OAuthConfig,
	client_id: ClientId,
	tenant_id: TenantId,
	server_id: String,
	audience: String,
}
impl<C, M> DeviceCodeLogin<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the provider from `options`.
	pub fn new(facade: Arc<AadFacade<C, M>>, options: &Options) -> Result<Self> {
		Ok(Self {
			facade,
			oauth: options.oauth_config()?,
			client_id: options.require_client_id()?.clone(),
			tenant_id: options.require_tenant_id()?.clone(),
			server_id: options.server_id.to_string(),
			audience: options.target_audience(),
		})
	}

	async fn login(&self) -> Result<Token> {
		let form = [("client_id", self.client_id.as_ref()), ("resource", self.server_id.as_str())];
		let authorization: DeviceAuthorization = self
			.facade
			.post_json(EndpointCall::DeviceAuthorization, &self.oauth.device_code_endpoint, &form)
			.await?;

		eprintln!("{}", authorization.instructions());

		let poll_form = [
			("grant_type", "device_code"),
			("client_id", self.client_id.as_ref()),
			("code", authorization.device_code.as_str()),
			("resource", self.server_id.as_str()),
		];
		let mut interval = authorization.poll_interval();
		let deadline = authorization.deadline(OffsetDateTime::now_utc())?;

		loop {
			tokio::time::sleep(interval.unsigned_abs()).await;

			match self.facade.poll(&self.oauth.token_endpoint, &poll_form, &self.audience).await? {
				PollOutcome::Issued(mut token) => {
					token.resource = self.audience.clone();

					return Ok(token);
				},
				PollOutcome::Pending => tracing::trace!("Device code authorization pending."),
				PollOutcome::SlowDown => {
					interval = interval.saturating_add(SLOW_DOWN_STEP);

					tracing::debug!(interval_secs = interval.whole_seconds(), "Device code polling slowed down.");
				},
			}

			if OffsetDateTime::now_utc() >= deadline {
				return Err(Error::InvalidGrant { reason: "the device code expired before sign-in completed".into() });
			}
		}
	}
}
impl<C, M> TokenProvider for DeviceCodeLogin<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn token(&self) -> LoginFuture<'_> {
		Box::pin(self.login())
	}

	fn tenant_id(&self) -> Option<&TenantId> {
		Some(&self.tenant_id)
	}
}
