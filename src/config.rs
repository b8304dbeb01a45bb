//! Resolved configuration handed to the orchestrator and login methods.
//!
//! [`Options`] says who to log in as and where; [`ExecSettings`] carries the per-invocation knobs
//! (force refresh, safety delta, diagnostics) that would otherwise be read from process state.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{ClientId, ServerId, TenantId, TokenSecret},
	cloud::{AzureEnvironment, OAuthConfig},
	error::ConfigError,
	login::LoginMethod,
};

/// Prefix applied to the audience in legacy mode.
pub const LEGACY_AUDIENCE_PREFIX: &str = "spn:";

/// Login configuration for one `get-token` invocation.
#[derive(Clone, Debug)]
pub struct Options {
	/// Login method.
	pub login_method: LoginMethod,
	/// Application ID of the API server; the token audience.
	pub server_id: ServerId,
	/// Client application ID.
	pub client_id: Option<ClientId>,
	/// Client secret for the service principal login.
	pub client_secret: Option<TokenSecret>,
	/// Tenant ID or alias.
	pub tenant_id: Option<TenantId>,
	/// Cloud environment.
	pub environment: AzureEnvironment,
	/// Authority host override (`AZURE_AUTHORITY_HOST`).
	pub authority_host: Option<String>,
	/// Prefix the audience with `spn:` and pin `api-version=1.0`.
	pub is_legacy: bool,
	/// Directory holding the token cache file.
	pub token_cache_dir: PathBuf,
	/// Managed identity resource ID (`msi_res_id`).
	pub identity_resource_id: Option<String>,
	/// IMDS token endpoint override.
	pub imds_endpoint: Option<String>,
	/// Federated token file for workload identity.
	pub federated_token_file: Option<PathBuf>,
	/// Username for the password login.
	pub username: Option<String>,
	/// Password for the password login.
	pub password: Option<TokenSecret>,
	/// Upper bound for the Azure CLI call.
	pub azure_cli_timeout: Duration,
}
impl Options {
	/// Default Azure CLI timeout.
	pub const DEFAULT_AZURE_CLI_TIMEOUT: Duration = Duration::seconds(60);

	/// Creates options for `login_method` against `server_id` with every optional field unset.
	///
	/// `token_cache_dir` starts empty; the CLI fills it with [`default_token_cache_dir`].
	pub fn new(login_method: LoginMethod, server_id: ServerId) -> Self {
		Self {
			login_method,
			server_id,
			client_id: None,
			client_secret: None,
			tenant_id: None,
			environment: AzureEnvironment::default(),
			authority_host: None,
			is_legacy: false,
			token_cache_dir: PathBuf::new(),
			identity_resource_id: None,
			imds_endpoint: None,
			federated_token_file: None,
			username: None,
			password: None,
			azure_cli_timeout: Self::DEFAULT_AZURE_CLI_TIMEOUT,
		}
	}

	/// Audience a cached token must carry to be served.
	pub fn target_audience(&self) -> String {
		if self.is_legacy {
			format!("{LEGACY_AUDIENCE_PREFIX}{}", self.server_id)
		} else {
			self.server_id.to_string()
		}
	}

	/// Cache file for this identity: `<dir>/<environment>-<fingerprint>.json`.
	///
	/// The legacy flag is not part of the key; switching it shows up as an audience mismatch.
	pub fn token_cache_file(&self) -> PathBuf {
		let mut hasher = Sha256::new();

		hasher.update(self.server_id.as_bytes());
		hasher.update(b"|");
		hasher.update(self.client_id.as_deref().unwrap_or_default().as_bytes());
		hasher.update(b"|");
		hasher.update(self.tenant_id.as_deref().unwrap_or_default().as_bytes());

		let fingerprint = URL_SAFE_NO_PAD.encode(hasher.finalize());

		self.token_cache_dir.join(format!("{}-{fingerprint}.json", self.environment))
	}

	/// Tenant-scoped endpoint configuration for the configured cloud.
	pub fn oauth_config(&self) -> Result<OAuthConfig, ConfigError> {
		let host = self.environment.authority_url(self.authority_host.as_deref())?;

		OAuthConfig::new(&host, self.require_tenant_id()?, self.is_legacy)
	}

	/// Client ID, or a [`ConfigError::MissingOption`] naming `--client-id`.
	pub fn require_client_id(&self) -> Result<&ClientId, ConfigError> {
		self.client_id.as_ref().ok_or_else(|| self.missing("--client-id"))
	}

	/// Tenant ID, or a [`ConfigError::MissingOption`] naming `--tenant-id`.
	pub fn require_tenant_id(&self) -> Result<&TenantId, ConfigError> {
		self.tenant_id.as_ref().ok_or_else(|| self.missing("--tenant-id"))
	}

	/// Checks that every option the login method needs is present.
	pub fn validate(&self) -> Result<(), ConfigError> {
		match self.login_method {
			LoginMethod::DeviceCode => {
				self.require_client_id()?;
				self.require_tenant_id()?;
			},
			LoginMethod::ServicePrincipal => {
				self.require_client_id()?;
				self.require_tenant_id()?;
				self.require(self.client_secret.is_some(), "--client-secret")?;
			},
			LoginMethod::Ropc => {
				self.require_client_id()?;
				self.require_tenant_id()?;
				self.require(self.username.is_some(), "--username")?;
				self.require(self.password.is_some(), "--password")?;
			},
			LoginMethod::WorkloadIdentity => {
				self.require_client_id()?;
				self.require_tenant_id()?;
				self.require(self.federated_token_file.is_some(), "--federated-token-file")?;
			},
			LoginMethod::Msi | LoginMethod::AzureCli => {},
		}

		Ok(())
	}

	fn require(&self, present: bool, option: &'static str) -> Result<(), ConfigError> {
		if present { Ok(()) } else { Err(self.missing(option)) }
	}

	fn missing(&self, option: &'static str) -> ConfigError {
		ConfigError::MissingOption { method: self.login_method, option }
	}
}

/// Per-invocation knobs for the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecSettings {
	/// Skip the freshness shortcut and refresh whenever a refresh token exists.
	pub force_refresh: bool,
	/// Tokens expiring within this window are not served as-is.
	pub expiry_delta: Duration,
	/// Log token expiry and group claims after writing the credential.
	pub diagnostics: bool,
	/// Ceiling for the directory lookup behind the group diagnostics.
	pub group_lookup_timeout: Duration,
}
impl ExecSettings {
	/// Default safety delta.
	pub const DEFAULT_EXPIRY_DELTA: Duration = Duration::seconds(60);
	/// Default directory lookup ceiling.
	pub const DEFAULT_GROUP_LOOKUP_TIMEOUT: Duration = Duration::seconds(10);

	/// Sets the force-refresh override.
	pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
		self.force_refresh = force_refresh;

		self
	}

	/// Enables or disables token diagnostics.
	pub fn with_diagnostics(mut self, diagnostics: bool) -> Self {
		self.diagnostics = diagnostics;

		self
	}

	/// Overrides the directory lookup ceiling; negative values clamp to zero.
	pub fn with_group_lookup_timeout(mut self, timeout: Duration) -> Self {
		self.group_lookup_timeout = if timeout.is_negative() { Duration::ZERO } else { timeout };

		self
	}
}
impl Default for ExecSettings {
	fn default() -> Self {
		Self {
			force_refresh: false,
			expiry_delta: Self::DEFAULT_EXPIRY_DELTA,
			diagnostics: false,
			group_lookup_timeout: Self::DEFAULT_GROUP_LOOKUP_TIMEOUT,
		}
	}
}

/// `~/.kube/cache/kubelogin`.
pub fn default_token_cache_dir() -> Result<PathBuf, ConfigError> {
	let home = dirs::home_dir().ok_or(ConfigError::MissingHomeDir)?;

	Ok(home.join(".kube").join("cache").join("kubelogin"))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn options(method: LoginMethod) -> Options {
		let mut options = Options::new(
			method,
			ServerId::new("6dae42f8-4368-4678-94ff-3960e28e3630").expect("Server fixture should be valid."),
		);

		options.client_id = Some(ClientId::new("client").expect("Client fixture should be valid."));
		options.tenant_id = Some(TenantId::new("tenant").expect("Tenant fixture should be valid."));
		options.token_cache_dir = PathBuf::from("/cache");

		options
	}

	#[test]
	fn legacy_mode_prefixes_the_audience() {
		let mut options = options(LoginMethod::DeviceCode);

		assert_eq!(options.target_audience(), "6dae42f8-4368-4678-94ff-3960e28e3630");

		options.is_legacy = true;

		assert_eq!(options.target_audience(), "spn:6dae42f8-4368-4678-94ff-3960e28e3630");
	}

	#[test]
	fn cache_file_depends_on_identity_but_not_legacy_flag() {
		let base = options(LoginMethod::DeviceCode);
		let mut legacy = base.clone();
		let mut other_tenant = base.clone();

		legacy.is_legacy = true;
		other_tenant.tenant_id = Some(TenantId::new("other").expect("Tenant fixture should be valid."));

		let path = base.token_cache_file();

		assert_eq!(path, legacy.token_cache_file());
		assert_ne!(path, other_tenant.token_cache_file());
		assert!(path.starts_with("/cache"));
		assert!(
			path.file_name()
				.and_then(|name| name.to_str())
				.is_some_and(|name| name.starts_with("AzurePublicCloud-") && name.ends_with(".json"))
		);
	}

	#[test]
	fn validation_names_the_missing_option() {
		let mut options = options(LoginMethod::ServicePrincipal);

		assert!(matches!(
			options.validate(),
			Err(ConfigError::MissingOption { option: "--client-secret", .. })
		));

		options.client_secret = Some(TokenSecret::new("secret"));

		assert!(options.validate().is_ok());

		options.login_method = LoginMethod::WorkloadIdentity;
		options.tenant_id = None;

		assert!(matches!(options.validate(), Err(ConfigError::MissingOption { option: "--tenant-id", .. })));
		assert!(Options::new(LoginMethod::Msi, options.server_id.clone()).validate().is_ok());
	}

	#[test]
	fn settings_defaults() {
		let settings = ExecSettings::default();

		assert_eq!(settings.expiry_delta, Duration::seconds(60));
		assert!(!settings.force_refresh);
		assert_eq!(
			settings.with_group_lookup_timeout(Duration::seconds(-1)).group_lookup_timeout,
			Duration::ZERO
		);
	}
}
