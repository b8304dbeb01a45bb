//! Refresh token exchange.
//!
//! The orchestrator never talks to the token endpoint directly; it asks a [`RefresherFactory`] for
//! a [`Refresher`] bound to one cached token and calls it at most once. Constructing the refresher
//! can fail (configuration problem, fatal) separately from the exchange itself (recoverable).

// self
use crate::{
	_prelude::*,
	auth::{ClientId, TenantId, Token, TokenSecret},
	cloud::OAuthConfig,
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{AadFacade, EndpointCall, ReqwestTransportErrorMapper, TransportErrorMapper},
};

/// Boxed future returned by [`Refresher::token`].
pub type RefreshFuture<'a> = Pin<Box<dyn Future<Output = Result<Token>> + 'a + Send>>;

/// Exchanges one refresh token for a new [`Token`].
pub trait Refresher: Send + Sync {
	/// Performs the exchange.
	fn token(&self) -> RefreshFuture<'_>;
}

/// Builds a [`Refresher`] bound to endpoint configuration, client, audience, tenant, and the
/// cached token whose refresh token will be spent.
pub trait RefresherFactory: Send + Sync {
	/// Constructs the refresher; errors here are configuration errors.
	fn create(
		&self,
		oauth: &OAuthConfig,
		client_id: &ClientId,
		audience: &str,
		tenant: &TenantId,
		token: &Token,
	) -> Result<Box<dyn Refresher>>;
}

/// Refresher that calls the Azure AD v1 token endpoint.
pub struct AadRefresher<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: Arc<AadFacade<C, M>>,
	token_endpoint: Url,
	client_id: ClientId,
	audience: String,
	tenant: TenantId,
	refresh_token: TokenSecret,
}
impl<C, M> AadRefresher<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Binds a refresher to `token`'s refresh token.
	pub fn new(
		facade: Arc<AadFacade<C, M>>,
		oauth: &OAuthConfig,
		client_id: &ClientId,
		audience: &str,
		tenant: &TenantId,
		token: &Token,
	) -> Result<Self> {
		let refresh_token = token.refresh_secret().cloned().ok_or_else(|| {
			Error::CredentialUnavailable { reason: "the cached token has no refresh token".into() }
		})?;

		Ok(Self {
			facade,
			token_endpoint: oauth.token_endpoint.clone(),
			client_id: client_id.clone(),
			audience: audience.to_owned(),
			tenant: tenant.clone(),
			refresh_token,
		})
	}

	async fn exchange(&self) -> Result<Token> {
		tracing::debug!(tenant = %self.tenant, audience = %self.audience, "Exchanging refresh token.");

		let form = [
			("grant_type", "refresh_token"),
			("client_id", self.client_id.as_ref()),
			("refresh_token", self.refresh_token.expose()),
			("resource", self.audience.as_str()),
		];
		let mut token = self
			.facade
			.exchange(EndpointCall::RefreshToken, &self.token_endpoint, &form, &self.audience)
			.await?;

		if token.refresh_secret().is_none() {
			token.refresh_token = Some(self.refresh_token.clone());
		}

		token.resource = self.audience.clone();

		Ok(token)
	}
}
impl<C, M> Refresher for AadRefresher<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn token(&self) -> RefreshFuture<'_> {
		Box::pin(self.exchange())
	}
}

/// Factory producing [`AadRefresher`]s that share one facade.
pub struct AadRefresherFactory<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: Arc<AadFacade<C, M>>,
}
impl<C, M> AadRefresherFactory<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a factory over `facade`.
	pub fn new(facade: Arc<AadFacade<C, M>>) -> Self {
		Self { facade }
	}
}
impl<C, M> RefresherFactory for AadRefresherFactory<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn create(
		&self,
		oauth: &OAuthConfig,
		client_id: &ClientId,
		audience: &str,
		tenant: &TenantId,
		token: &Token,
	) -> Result<Box<dyn Refresher>> {
		let refresher =
			AadRefresher::new(Arc::clone(&self.facade), oauth, client_id, audience, tenant, token)?;

		Ok(Box::new(refresher))
	}
}
