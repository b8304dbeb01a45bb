//! Login methods.
//!
//! Every method implements [`TokenProvider`]. The orchestrator only ever asks one question about
//! the method itself, [`LoginMethod::manages_own_cache`], to decide whether the persistent cache
//! is in play.

pub mod azure_cli;
pub mod device_code;
pub mod managed_identity;
pub mod ropc;
pub mod service_principal;
pub mod workload_identity;

pub use azure_cli::AzureCliLogin;
pub use device_code::DeviceCodeLogin;
pub use managed_identity::ManagedIdentityLogin;
pub use ropc::RopcLogin;
pub use service_principal::ServicePrincipalLogin;
pub use workload_identity::WorkloadIdentityLogin;

// self
use crate::{
	_prelude::*,
	auth::{TenantId, Token},
	config::Options,
	error::ConfigError,
	http::TokenHttpClient,
	oauth::{AadFacade, TransportErrorMapper},
};

/// Boxed future returned by [`TokenProvider::token`].
pub type LoginFuture<'a> = Pin<Box<dyn Future<Output = Result<Token>> + 'a + Send>>;

/// Performs a full login and returns a fresh [`Token`].
pub trait TokenProvider: Send + Sync {
	/// Runs the login. Called at most once per invocation.
	fn token(&self) -> LoginFuture<'_>;

	/// Tenant the provider signs in to, when it has one; used by diagnostics.
	fn tenant_id(&self) -> Option<&TenantId>;
}

/// Supported login methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoginMethod {
	/// Device code flow.
	DeviceCode,
	/// Service principal with a client secret.
	ServicePrincipal,
	/// Resource owner password credentials.
	Ropc,
	/// Managed identity through IMDS.
	Msi,
	/// Workload identity federation.
	WorkloadIdentity,
	/// Azure CLI passthrough.
	AzureCli,
}
impl LoginMethod {
	/// Every method, in CLI order.
	pub const ALL: [Self; 6] = [
		Self::DeviceCode,
		Self::ServicePrincipal,
		Self::Ropc,
		Self::Msi,
		Self::WorkloadIdentity,
		Self::AzureCli,
	];

	/// CLI name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::DeviceCode => "devicecode",
			Self::ServicePrincipal => "spn",
			Self::Ropc => "ropc",
			Self::Msi => "msi",
			Self::WorkloadIdentity => "workloadidentity",
			Self::AzureCli => "azurecli",
		}
	}

	/// Methods whose credentials are renewed by their own provider skip the persistent cache.
	pub const fn manages_own_cache(self) -> bool {
		matches!(self, Self::ServicePrincipal | Self::Msi | Self::WorkloadIdentity | Self::AzureCli)
	}
}
impl Display for LoginMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for LoginMethod {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s.trim().to_ascii_lowercase();

		Self::ALL
			.into_iter()
			.find(|method| method.as_str() == normalized)
			.ok_or_else(|| ConfigError::UnknownLoginMethod { name: s.to_owned() })
	}
}

/// Builds the provider for the configured login method.
pub fn new_token_provider<C, M>(
	options: &Options,
	facade: Arc<AadFacade<C, M>>,
) -> Result<Box<dyn TokenProvider>>
where
	C: 'static + ?Sized + TokenHttpClient,
	M: 'static + ?Sized + TransportErrorMapper<C::TransportError>,
{
	options.validate()?;

	let provider: Box<dyn TokenProvider> = match options.login_method {
		LoginMethod::DeviceCode => Box::new(DeviceCodeLogin::new(facade, options)?),
		LoginMethod::ServicePrincipal => Box::new(ServicePrincipalLogin::new(facade, options)?),
		LoginMethod::Ropc => Box::new(RopcLogin::new(facade, options)?),
		LoginMethod::Msi => Box::new(ManagedIdentityLogin::new(facade, options)?),
		LoginMethod::WorkloadIdentity => Box::new(WorkloadIdentityLogin::new(facade, options)?),
		LoginMethod::AzureCli => Box::new(AzureCliLogin::new(options)),
	};

	Ok(provider)
}

/// Returns the required option or a [`ConfigError::MissingOption`].
pub(crate) fn required<'a, T>(
	value: Option<&'a T>,
	method: LoginMethod,
	option: &'static str,
) -> Result<&'a T, ConfigError>
where
	T: ?Sized,
{
	value.ok_or(ConfigError::MissingOption { method, option })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::test_facade, auth::ServerId};

	#[test]
	fn names_round_trip_and_cache_predicate() {
		for method in LoginMethod::ALL {
			assert_eq!(method.as_str().parse::<LoginMethod>().expect("Name should parse."), method);
		}

		assert_eq!("SPN".parse::<LoginMethod>().expect("Parsing is case-insensitive."), LoginMethod::ServicePrincipal);
		assert!(matches!("interactive".parse::<LoginMethod>(), Err(ConfigError::UnknownLoginMethod { .. })));

		let self_cached = LoginMethod::ALL.into_iter().filter(|method| method.manages_own_cache()).collect::<Vec<_>>();

		assert_eq!(
			self_cached,
			vec![LoginMethod::ServicePrincipal, LoginMethod::Msi, LoginMethod::WorkloadIdentity, LoginMethod::AzureCli]
		);
	}

	#[test]
	fn factory_validates_options() {
		let options = Options::new(
			LoginMethod::DeviceCode,
			ServerId::new("server").expect("Server fixture should be valid."),
		);
		let result = new_token_provider(&options, test_facade());

		assert!(matches!(
			result,
			Err(Error::Config(ConfigError::MissingOption { option: "--client-id", .. }))
		));

		let options = Options::new(
			LoginMethod::Msi,
			ServerId::new("server").expect("Server fixture should be valid."),
		);
		let provider = new_token_provider(&options, test_facade()).expect("MSI needs no options.");

		assert!(provider.tenant_id().is_none());
	}
}
