//! Service principal login with a client secret.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, TenantId, Token, TokenSecret},
	config::Options,
	http::TokenHttpClient,
	login::{LoginFuture, LoginMethod, TokenProvider, required},
	oauth::{AadFacade, EndpointCall, TransportErrorMapper},
};

/// Client credentials [`TokenProvider`].
pub struct ServicePrincipalLogin<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: Arc<AadFacade<C, M>>,
	token_endpoint: Url,
	client_id: ClientId,
	client_secret: TokenSecret,
	tenant_id: TenantId,
	server_id: String,
	audience: String,
}
impl<C, M> ServicePrincipalLogin<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the provider from `options`.
	pub fn new(facade: Arc<AadFacade<C, M>>, options: &Options) -> Result<Self> {
		let client_secret = required(
			options.client_secret.as_ref(),
			LoginMethod::ServicePrincipal,
			"--client-secret",
		)?;

		Ok(Self {
			facade,
			token_endpoint: options.oauth_config()?.token_endpoint,
			client_id: options.require_client_id()?.clone(),
			client_secret: client_secret.clone(),
			tenant_id: options.require_tenant_id()?.clone(),
			server_id: options.server_id.to_string(),
			audience: options.target_audience(),
		})
	}

	async fn login(&self) -> Result<Token> {
		let form = [
			("grant_type", "client_credentials"),
			("client_id", self.client_id.as_ref()),
			("client_secret", self.client_secret.expose()),
			("resource", self.server_id.as_str()),
		];
		let mut token = self
			.facade
			.exchange(EndpointCall::ClientCredentials, &self.token_endpoint, &form, &self.audience)
			.await?;

		token.resource = self.audience.clone();

		Ok(token)
	}
}
impl<C, M> TokenProvider for ServicePrincipalLogin<C, M>
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
