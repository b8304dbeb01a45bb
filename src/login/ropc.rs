//! Resource owner password credentials login.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, TenantId, Token, TokenSecret},
	config::Options,
	http::TokenHttpClient,
	login::{LoginFuture, LoginMethod, TokenProvider, required},
	oauth::{AadFacade, EndpointCall, TransportErrorMapper},
};

/// Password grant [`TokenProvider`]; the issued refresh token is cached.
pub struct RopcLogin<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: Arc<AadFacade<C, M>>,
	token_endpoint: Url,
	client_id: ClientId,
	tenant_id: TenantId,
	username: String,
	password: TokenSecret,
	server_id: String,
	audience: String,
}
impl<C, M> RopcLogin<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the provider from `options`.
	pub fn new(facade: Arc<AadFacade<C, M>>, options: &Options) -> Result<Self> {
		let username = required(options.username.as_ref(), LoginMethod::Ropc, "--username")?;
		let password = required(options.password.as_ref(), LoginMethod::Ropc, "--password")?;

		Ok(Self {
			facade,
			token_endpoint: options.oauth_config()?.token_endpoint,
			client_id: options.require_client_id()?.clone(),
			tenant_id: options.require_tenant_id()?.clone(),
			username: username.clone(),
			password: password.clone(),
			server_id: options.server_id.to_string(),
			audience: options.target_audience(),
		})
	}

	async fn login(&self) -> Result<Token> {
		let form = [
			("grant_type", "password"),
			("client_id", self.client_id.as_ref()),
			("username", self.username.as_str()),
			("password", self.password.expose()),
			("resource", self.server_id.as_str()),
		];
		let mut token = self
			.facade
			.exchange(EndpointCall::Password, &self.token_endpoint, &form, &self.audience)
			.await?;

		token.resource = self.audience.clone();

		Ok(token)
	}
}
impl<C, M> TokenProvider for RopcLogin<C, M>
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
