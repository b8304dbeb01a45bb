//! Command-line surface.
//!
//! Flags only describe the invocation; [`GetTokenArgs::options`] and [`GetTokenArgs::settings`]
//! turn them into the values the orchestrator consumes.

// crates.io
use clap::{Args, Parser, Subcommand};
// self
use crate::{
	_prelude::*,
	auth::{ClientId, ServerId, TenantId, TokenSecret},
	cloud::AzureEnvironment,
	config::{self, ExecSettings, Options},
	error::ConfigError,
	login::LoginMethod,
	obs::TOKEN_DIAGNOSTICS_VERBOSITY,
};

/// `kubelogin` command line.
#[derive(Clone, Debug, Parser)]
#[command(name = "kubelogin", version, about = "Azure AD credential plugin for kubectl.")]
pub struct Cli {
	/// Log verbosity; 5 and above also logs token diagnostics.
	#[arg(short = 'v', long = "v", global = true, default_value_t = 0, env = "KUBELOGIN_VERBOSE")]
	pub verbosity: u8,
	/// Subcommand to run.
	#[command(subcommand)]
	pub command: Command,
}

/// Subcommands.
#[derive(Clone, Debug, Subcommand)]
pub enum Command {
	/// Print an ExecCredential for kubectl.
	GetToken(GetTokenArgs),
}

/// Flags for `get-token`.
#[derive(Clone, Debug, Args)]
pub struct GetTokenArgs {
	/// Login method.
	#[arg(short = 'l', long = "login", env = "AAD_LOGIN_METHOD", default_value = "devicecode")]
	pub login: LoginMethod,
	/// Application ID of the API server.
	#[arg(long)]
	pub server_id: ServerId,
	/// Application ID of the client; for msi, the user-assigned identity.
	#[arg(long, env = "AZURE_CLIENT_ID")]
	pub client_id: Option<ClientId>,
	/// Client secret for the spn login.
	#[arg(long, env = "AAD_SERVICE_PRINCIPAL_CLIENT_SECRET", hide_env_values = true)]
	pub client_secret: Option<String>,
	/// Tenant ID.
	#[arg(short = 't', long, env = "AZURE_TENANT_ID")]
	pub tenant_id: Option<TenantId>,
	/// Cloud environment.
	#[arg(short = 'e', long, env = "AZURE_ENVIRONMENT", default_value = "AzurePublicCloud")]
	pub environment: AzureEnvironment,
	/// Use the `spn:` audience prefix and `api-version=1.0`.
	#[arg(long)]
	pub legacy: bool,
	/// Token cache directory.
	#[arg(long)]
	pub token_cache_dir: Option<PathBuf>,
	/// Authority host override.
	#[arg(long, env = "AZURE_AUTHORITY_HOST")]
	pub authority_host: Option<String>,
	/// Managed identity resource ID.
	#[arg(long)]
	pub identity_resource_id: Option<String>,
	/// IMDS token endpoint override.
	#[arg(long, hide = true)]
	pub imds_endpoint: Option<String>,
	/// Federated token file for workloadidentity.
	#[arg(long, env = "AZURE_FEDERATED_TOKEN_FILE")]
	pub federated_token_file: Option<PathBuf>,
	/// Username for the ropc login.
	#[arg(long, env = "AAD_USER_PRINCIPAL_NAME")]
	pub username: Option<String>,
	/// Password for the ropc login.
	#[arg(long, env = "AAD_USER_PRINCIPAL_PASSWORD", hide_env_values = true)]
	pub password: Option<String>,
	/// Azure CLI timeout in seconds.
	#[arg(long = "timeout", default_value_t = 60)]
	pub azure_cli_timeout: u64,
	/// Group name lookup timeout in seconds.
	#[arg(long, default_value_t = 10)]
	pub group_lookup_timeout: u64,
	/// Refresh even when the cached token is still fresh.
	#[arg(
		long,
		env = "KUBELOGIN_FORCE_REFRESH",
		num_args = 0..=1,
		default_missing_value = "true",
		value_name = "BOOL"
	)]
	pub force_refresh: Option<String>,
}
impl GetTokenArgs {
	/// Resolves the login options, defaulting the cache directory to `~/.kube/cache/kubelogin`.
	pub fn options(&self) -> Result<Options, ConfigError> {
		let mut options = Options::new(self.login, self.server_id.clone());

		options.client_id = self.client_id.clone();
		options.client_secret = self.client_secret.as_deref().map(TokenSecret::new);
		options.tenant_id = self.tenant_id.clone();
		options.environment = self.environment;
		options.authority_host = self.authority_host.clone().filter(|host| !host.is_empty());
		options.is_legacy = self.legacy;
		options.token_cache_dir = match &self.token_cache_dir {
			Some(dir) => dir.clone(),
			None => config::default_token_cache_dir()?,
		};
		options.identity_resource_id = self.identity_resource_id.clone();
		options.imds_endpoint = self.imds_endpoint.clone();
		options.federated_token_file = self.federated_token_file.clone();
		options.username = self.username.clone();
		options.password = self.password.as_deref().map(TokenSecret::new);
		options.azure_cli_timeout = seconds(self.azure_cli_timeout);

		Ok(options)
	}

	/// Resolves the per-invocation settings for `verbosity`.
	pub fn settings(&self, verbosity: u8) -> ExecSettings {
		ExecSettings::default()
			.with_force_refresh(self.force_refresh.as_deref().is_some_and(|v| !v.is_empty()))
			.with_diagnostics(verbosity >= TOKEN_DIAGNOSTICS_VERBOSITY)
			.with_group_lookup_timeout(seconds(self.group_lookup_timeout))
	}
}

fn seconds(value: u64) -> Duration {
	Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn parse(args: &[&str]) -> (u8, GetTokenArgs) {
		let cli = Cli::try_parse_from(args).expect("Arguments should parse.");
		let Command::GetToken(get_token) = cli.command;

		(cli.verbosity, get_token)
	}

	#[test]
	fn resolves_options_and_settings() {
		let (verbosity, args) = parse(&[
			"kubelogin",
			"get-token",
			"--server-id",
			"server",
			"--client-id",
			"client",
			"-t",
			"tenant",
			"-l",
			"SPN",
			"--client-secret",
			"secret",
			"--environment",
			"AzureChinaCloud",
			"--legacy",
			"--token-cache-dir",
			"/tmp/cache",
			"--force-refresh",
			"-v",
			"5",
		]);
		let options = args.options().expect("Options should resolve.");
		let settings = args.settings(verbosity);

		assert_eq!(options.login_method, LoginMethod::ServicePrincipal);
		assert_eq!(options.environment, AzureEnvironment::AzureChinaCloud);
		assert_eq!(options.target_audience(), "spn:server");
		assert_eq!(options.token_cache_dir, PathBuf::from("/tmp/cache"));
		assert_eq!(options.client_secret.as_ref().map(TokenSecret::expose), Some("secret"));
		assert!(options.validate().is_ok());
		assert!(settings.force_refresh);
		assert!(settings.diagnostics);
		assert_eq!(settings.expiry_delta, Duration::seconds(60));
	}

	#[test]
	fn any_non_empty_force_refresh_value_forces_a_refresh() {
		for value in ["0", "false", "no"] {
			let flag = format!("--force-refresh={value}");
			let (verbosity, args) = parse(&[
				"kubelogin",
				"get-token",
				"--server-id",
				"server",
				"--token-cache-dir",
				"/tmp/cache",
				&flag,
			]);
			let settings = args.settings(verbosity);

			assert!(settings.force_refresh, "`{value}` should force a refresh");
			assert!(!settings.diagnostics);
			assert_eq!(settings.group_lookup_timeout, Duration::seconds(10));
		}

		let (verbosity, args) = parse(&[
			"kubelogin",
			"get-token",
			"--server-id",
			"server",
			"--token-cache-dir",
			"/tmp/cache",
			"--force-refresh=",
		]);

		assert!(!args.settings(verbosity).force_refresh);
	}

	#[test]
	fn rejects_unknown_login_methods_and_empty_identifiers() {
		assert!(
			Cli::try_parse_from(["kubelogin", "get-token", "--server-id", "s", "-l", "interactive"])
				.is_err()
		);
		assert!(Cli::try_parse_from(["kubelogin", "get-token", "--server-id", ""]).is_err());
	}
}
