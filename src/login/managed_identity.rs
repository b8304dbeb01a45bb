//! Managed identity login through the instance metadata service.

// crates.io
use oauth2::http::header::HeaderName;
// self
use crate::{
	_prelude::*,
	auth::{TenantId, Token},
	config::Options,
	error::ConfigError,
	http::TokenHttpClient,
	login::{LoginFuture, TokenProvider},
	oauth::{self, AadFacade, EndpointCall, TransportErrorMapper},
};

/// Default IMDS token endpoint.
pub const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const IMDS_API_VERSION: &str = "2018-02-01";

/// IMDS [`TokenProvider`]. Has no tenant of its own.
pub struct ManagedIdentityLogin<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: Arc<AadFacade<C, M>>,
	endpoint: Url,
	audience: String,
}
impl<C, M> ManagedIdentityLogin<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the provider from `options`; a user-assigned identity is selected by client ID or
	/// resource ID when either is set.
	pub fn new(facade: Arc<AadFacade<C, M>>, options: &Options) -> Result<Self> {
		let raw = options.imds_endpoint.as_deref().unwrap_or(IMDS_TOKEN_ENDPOINT);
		let mut endpoint = Url::parse(raw).map_err(|source| ConfigError::InvalidEndpoint { source })?;

		{
			let mut query = endpoint.query_pairs_mut();

			query.append_pair("api-version", IMDS_API_VERSION);
			query.append_pair("resource", &options.server_id);

			if let Some(client_id) = &options.client_id {
				query.append_pair("client_id", client_id);
			}
			if let Some(resource_id) = &options.identity_resource_id {
				query.append_pair("msi_res_id", resource_id);
			}
		}

		Ok(Self { facade, endpoint, audience: options.target_audience() })
	}

	/// Fully qualified request URL.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	async fn login(&self) -> Result<Token> {
		let request =
			oauth::get_request(&self.endpoint, &[(HeaderName::from_static("metadata"), "true")])?;
		let mut token = self
			.facade
			.request_token(EndpointCall::ManagedIdentity, request, &self.audience)
			.await?;

		token.resource = self.audience.clone();

		Ok(token)
	}
}
impl<C, M> TokenProvider for ManagedIdentityLogin<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn token(&self) -> LoginFuture<'_> {
		Box::pin(self.login())
	}

	fn tenant_id(&self) -> Option<&TenantId> {
		None
	}
}
