//! Workload identity federation: a projected service account token is exchanged as a client
//! assertion on the v2.0 token endpoint.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, TenantId, Token},
	config::Options,
	http::TokenHttpClient,
	login::{LoginFuture, LoginMethod, TokenProvider, required},
	oauth::{AadFacade, EndpointCall, TransportErrorMapper},
};

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Federated credential [`TokenProvider`].
pub struct WorkloadIdentityLogin<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: Arc<AadFacade<C, M>>,
	token_endpoint: Url,
	client_id: ClientId,
	tenant_id: TenantId,
	federated_token_file: PathBuf,
	scope: String,
	audience: String,
}
impl<C, M> WorkloadIdentityLogin<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the provider from `options`.
	pub fn new(facade: Arc<AadFacade<C, M>>, options: &Options) -> Result<Self> {
		let federated_token_file = required(
			options.federated_token_file.as_ref(),
			LoginMethod::WorkloadIdentity,
			"--federated-token-file",
		)?;

		Ok(Self {
			facade,
			token_endpoint: options.oauth_config()?.token_endpoint_v2,
			client_id: options.require_client_id()?.clone(),
			tenant_id: options.require_tenant_id()?.clone(),
			federated_token_file: federated_token_file.clone(),
			scope: format!("{}/.default", options.server_id),
			audience: options.target_audience(),
		})
	}

	async fn read_assertion(&self) -> Result<String> {
		let raw = tokio::fs::read_to_string(&self.federated_token_file).await.map_err(|e| {
			Error::CredentialUnavailable {
				reason: format!(
					"unable to read the federated token file {}: {e}",
					self.federated_token_file.display()
				),
			}
		})?;
		let assertion = raw.trim();

		if assertion.is_empty() {
			return Err(Error::CredentialUnavailable {
				reason: format!("the federated token file {} is empty", self.federated_token_file.display()),
			});
		}

		Ok(assertion.to_owned())
	}

	async fn login(&self) -> Result<Token> {
		let assertion = self.read_assertion().await?;
		let form = [
			("grant_type", "client_credentials"),
			("client_id", self.client_id.as_ref()),
			("client_assertion_type", CLIENT_ASSERTION_TYPE),
			("client_assertion", assertion.as_str()),
			("scope", self.scope.as_str()),
		];
		let mut token = self
			.facade
			.exchange(EndpointCall::ClientCredentials, &self.token_endpoint, &form, &self.audience)
			.await?;

		token.resource = self.audience.clone();

		Ok(token)
	}
}
impl<C, M> TokenProvider for WorkloadIdentityLogin<C, M>
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
