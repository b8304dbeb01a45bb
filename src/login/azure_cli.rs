//! Azure CLI passthrough: `az account get-access-token`.

// std
use std::{io::ErrorKind, process::Stdio};
// crates.io
use tokio::process::Command;
// self
use crate::{
	_prelude::*,
	auth::{TenantId, Token, TokenSecret, token::lenient},
	config::Options,
	error::ConfigError,
	login::{LoginFuture, TokenProvider},
};

const AZURE_CLI_PROGRAM: &str = "az";

/// JSON printed by `az account get-access-token`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureCliToken {
	/// Access token.
	pub access_token: TokenSecret,
	/// Expiry as Unix seconds (Azure CLI 2.54.0 and later).
	#[serde(default, rename = "expires_on", deserialize_with = "lenient::option_i64")]
	pub expires_on: Option<i64>,
	/// Tenant the token was issued by.
	#[serde(default)]
	pub tenant: Option<String>,
	/// Token type.
	#[serde(default)]
	pub token_type: Option<String>,
}
impl AzureCliToken {
	/// Converts the CLI output into a [`Token`] for `audience`.
	///
	/// `expiresOn` is a local time without an offset, so only `expires_on` is accepted.
	pub fn into_token(self, audience: &str) -> Result<Token> {
		let seconds = self.expires_on.ok_or(ConfigError::MissingExpiry)?;
		let expires_on = OffsetDateTime::from_unix_timestamp(seconds)
			.map_err(|_| ConfigError::ExpiryOutOfRange { value: seconds })?;
		let mut builder =
			Token::builder(audience).access_token(self.access_token.expose()).expires_on(expires_on);

		if let Some(token_type) = self.token_type.filter(|value| !value.is_empty()) {
			builder = builder.token_type(token_type);
		}

		builder.build().map_err(|e| ConfigError::from(e).into())
	}
}

/// Azure CLI [`TokenProvider`].
#[derive(Clone, Debug)]
pub struct AzureCliLogin {
	program: PathBuf,
	server_id: String,
	tenant_id: Option<TenantId>,
	audience: String,
	timeout: Duration,
}
impl AzureCliLogin {
	/// Builds the provider from `options`.
	pub fn new(options: &Options) -> Self {
		let mut login = Self::for_resource(
			options.server_id.to_string(),
			options.tenant_id.clone(),
			options.azure_cli_timeout,
		);

		login.audience = options.target_audience();

		login
	}

	/// Builds a provider for an arbitrary resource, such as Microsoft Graph.
	pub fn for_resource(resource: impl Into<String>, tenant_id: Option<TenantId>, timeout: Duration) -> Self {
		let server_id = resource.into();

		Self {
			program: PathBuf::from(AZURE_CLI_PROGRAM),
			audience: server_id.clone(),
			server_id,
			tenant_id,
			timeout,
		}
	}

	/// Runs `program` instead of `az`.
	pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
		self.program = program.into();

		self
	}

	/// Arguments passed to the CLI.
	pub fn args(&self) -> Vec<String> {
		let mut args = vec![
			"account".to_owned(),
			"get-access-token".to_owned(),
			"--resource".to_owned(),
			self.server_id.clone(),
			"--output".to_owned(),
			"json".to_owned(),
		];

		if let Some(tenant) = &self.tenant_id {
			args.extend(["--tenant".to_owned(), tenant.to_string()]);
		}

		args
	}

	async fn login(&self) -> Result<Token> {
		let mut command = Command::new(&self.program);

		command
			.args(self.args())
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		let output = match tokio::time::timeout(self.timeout.unsigned_abs(), command.output()).await {
			Ok(Ok(output)) => output,
			Ok(Err(e)) if e.kind() == ErrorKind::NotFound =>
				return Err(Error::CredentialUnavailable {
					reason: format!("`{}` was not found on PATH", self.program.display()),
				}),
			Ok(Err(e)) => return Err(crate::error::TransportError::Io(e).into()),
			Err(_) =>
				return Err(Error::CredentialUnavailable {
					reason: format!(
						"Azure CLI did not answer within {}s",
						self.timeout.whole_seconds()
					),
				}),
		};

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);

			return Err(Error::CredentialUnavailable {
				reason: format!("Azure CLI failed ({}): {}", output.status, stderr.trim()),
			});
		}

		let parsed: AzureCliToken = serde_json::from_slice(&output.stdout).map_err(|e| {
			Error::CredentialUnavailable { reason: format!("unexpected Azure CLI output: {e}") }
		})?;

		parsed.into_token(&self.audience)
	}
}
impl TokenProvider for AzureCliLogin {
	fn token(&self) -> LoginFuture<'_> {
		Box::pin(self.login())
	}

	fn tenant_id(&self) -> Option<&TenantId> {
		self.tenant_id.as_ref()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{auth::ServerId, login::LoginMethod};

	fn login(tenant: Option<&str>) -> AzureCliLogin {
		let mut options = Options::new(
			LoginMethod::AzureCli,
			ServerId::new("6dae42f8-4368-4678-94ff-3960e28e3630").expect("Server fixture should be valid."),
		);

		options.tenant_id = tenant.map(|t| TenantId::new(t).expect("Tenant fixture should be valid."));

		AzureCliLogin::new(&options)
	}

	#[test]
	fn args_include_tenant_only_when_configured() {
		assert!(!login(None).args().contains(&"--tenant".to_owned()));
		assert_eq!(login(Some("contoso")).args().last().map(String::as_str), Some("contoso"));
	}

	#[test]
	fn output_requires_unix_expiry() {
		let parsed: AzureCliToken = serde_json::from_str(
			r#"{"accessToken":"a","expiresOn":"2025-01-01 00:00:00.000000","expires_on":1735689600,"tenant":"t","tokenType":"Bearer"}"#,
		)
		.expect("CLI output should parse.");
		let token = parsed.into_token("server").expect("Token should build.");

		assert_eq!(token.expires_on.unix_timestamp(), 1_735_689_600);
		assert_eq!(token.resource, "server");

		let legacy: AzureCliToken =
			serde_json::from_str(r#"{"accessToken":"a","expiresOn":"2025-01-01 00:00:00.000000"}"#)
				.expect("Old CLI output should parse.");

		assert!(matches!(legacy.into_token("server"), Err(Error::Config(ConfigError::MissingExpiry))));
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn missing_program_is_credential_unavailable() {
		let err = login(None)
			.with_program("/nonexistent/kubelogin-test-az")
			.token()
			.await
			.expect_err("Missing CLI must fail.");

		assert!(matches!(err, Error::CredentialUnavailable { .. }));
	}
}
