//! Azure cloud environments and the OAuth endpoint configuration derived from them.

// self
use crate::{_prelude::*, auth::TenantId, error::ConfigError};

/// Sovereign cloud the cluster's identity provider lives in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AzureEnvironment {
	/// Azure public cloud.
	#[default]
	AzurePublicCloud,
	/// Azure operated by 21Vianet.
	AzureChinaCloud,
	/// Azure US Government.
	AzureUSGovernmentCloud,
}
impl AzureEnvironment {
	/// Canonical environment name, also used in cache file names.
	pub fn name(self) -> &'static str {
		match self {
			Self::AzurePublicCloud => "AzurePublicCloud",
			Self::AzureChinaCloud => "AzureChinaCloud",
			Self::AzureUSGovernmentCloud => "AzureUSGovernmentCloud",
		}
	}

	/// Active Directory authority host.
	pub fn authority_host(self) -> &'static str {
		match self {
			Self::AzurePublicCloud => "https://login.microsoftonline.com/",
			Self::AzureChinaCloud => "https://login.chinacloudapi.cn/",
			Self::AzureUSGovernmentCloud => "https://login.microsoftonline.us/",
		}
	}

	/// Microsoft Graph endpoint.
	pub fn graph_endpoint(self) -> &'static str {
		match self {
			Self::AzurePublicCloud => "https://graph.microsoft.com/",
			Self::AzureChinaCloud => "https://microsoftgraph.chinacloudapi.cn/",
			Self::AzureUSGovernmentCloud => "https://graph.microsoft.us/",
		}
	}

	/// Authority host as a URL, honouring an explicit override.
	pub fn authority_url(self, r#override: Option<&str>) -> Result<Url, ConfigError> {
		let raw = r#override.unwrap_or(self.authority_host());

		parse_base_url("authority", raw)
	}

	/// Graph endpoint as a URL.
	pub fn graph_url(self) -> Result<Url, ConfigError> {
		parse_base_url("graph", self.graph_endpoint())
	}
}
impl Display for AzureEnvironment {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.name())
	}
}
impl FromStr for AzureEnvironment {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s.trim().to_ascii_lowercase();

		match normalized.as_str() {
			"" | "azurepubliccloud" | "azurecloud" | "public" => Ok(Self::AzurePublicCloud),
			"azurechinacloud" | "china" => Ok(Self::AzureChinaCloud),
			"azureusgovernmentcloud" | "azureusgovernment" | "usgovernment" =>
				Ok(Self::AzureUSGovernmentCloud),
			_ => Err(ConfigError::UnknownEnvironment { name: s.to_owned() }),
		}
	}
}

/// Tenant-scoped Azure AD endpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OAuthConfig {
	/// `<authority host>/<tenant>/`.
	pub authority: Url,
	/// v1 token endpoint (`oauth2/token`).
	pub token_endpoint: Url,
	/// v1 device code endpoint (`oauth2/devicecode`).
	pub device_code_endpoint: Url,
	/// v2.0 token endpoint (`oauth2/v2.0/token`), used by federated credentials.
	pub token_endpoint_v2: Url,
}
impl OAuthConfig {
	const LEGACY_API_VERSION: &'static str = "1.0";

	/// Derives the endpoints for `tenant` under `authority_host`.
	///
	/// Legacy mode pins `api-version=1.0` on the v1 endpoints.
	pub fn new(authority_host: &Url, tenant: &TenantId, legacy: bool) -> Result<Self, ConfigError> {
		let mut host = authority_host.clone();

		if !host.path().ends_with('/') {
			host.set_path(&format!("{}/", host.path()));
		}

		let authority = join(&host, &format!("{tenant}/"))?;
		let mut token_endpoint = join(&authority, "oauth2/token")?;
		let mut device_code_endpoint = join(&authority, "oauth2/devicecode")?;
		let token_endpoint_v2 = join(&authority, "oauth2/v2.0/token")?;

		if legacy {
			for endpoint in [&mut token_endpoint, &mut device_code_endpoint] {
				endpoint.query_pairs_mut().append_pair("api-version", Self::LEGACY_API_VERSION);
			}
		}

		ensure_secure("token", &token_endpoint)?;

		Ok(Self { authority, token_endpoint, device_code_endpoint, token_endpoint_v2 })
	}
}

/// Rejects non-HTTPS endpoints unless they target a loopback host.
pub fn ensure_secure(endpoint: &'static str, url: &Url) -> Result<(), ConfigError> {
	if url.scheme() == "https" || is_loopback(url) {
		return Ok(());
	}

	Err(ConfigError::InsecureEndpoint { endpoint, url: url.to_string() })
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}

fn parse_base_url(endpoint: &'static str, raw: &str) -> Result<Url, ConfigError> {
	let url = Url::parse(raw).map_err(|source| ConfigError::InvalidEndpoint { source })?;

	ensure_secure(endpoint, &url)?;

	Ok(url)
}

fn join(base: &Url, path: &str) -> Result<Url, ConfigError> {
	base.join(path).map_err(|source| ConfigError::InvalidEndpoint { source })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn tenant() -> TenantId {
		TenantId::new("72f988bf-86f1-41af-91ab-2d7cd011db47").expect("Tenant fixture should be valid.")
	}

	#[test]
	fn builds_v1_endpoints() {
		let host = AzureEnvironment::AzurePublicCloud
			.authority_url(None)
			.expect("Public authority should parse.");
		let config = OAuthConfig::new(&host, &tenant(), false).expect("Config should build.");

		assert_eq!(
			config.token_endpoint.as_str(),
			"https://login.microsoftonline.com/72f988bf-86f1-41af-91ab-2d7cd011db47/oauth2/token"
		);
		assert_eq!(
			config.device_code_endpoint.as_str(),
			"https://login.microsoftonline.com/72f988bf-86f1-41af-91ab-2d7cd011db47/oauth2/devicecode"
		);
		assert!(config.token_endpoint_v2.as_str().ends_with("/oauth2/v2.0/token"));
	}

	#[test]
	fn legacy_mode_pins_api_version() {
		let host = Url::parse("https://login.example.net").expect("Host fixture should parse.");
		let config = OAuthConfig::new(&host, &tenant(), true).expect("Config should build.");

		assert_eq!(config.token_endpoint.query(), Some("api-version=1.0"));
		assert_eq!(config.device_code_endpoint.query(), Some("api-version=1.0"));
		assert_eq!(config.token_endpoint_v2.query(), None);
	}

	#[test]
	fn plain_http_is_only_allowed_on_loopback() {
		let remote = Url::parse("http://login.example.net/").expect("Host fixture should parse.");
		let local = Url::parse("http://127.0.0.1:8080/").expect("Host fixture should parse.");

		assert!(matches!(
			OAuthConfig::new(&remote, &tenant(), false),
			Err(ConfigError::InsecureEndpoint { endpoint: "token", .. })
		));
		assert!(OAuthConfig::new(&local, &tenant(), false).is_ok());
	}

	#[test]
	fn environment_names_parse_case_insensitively() {
		assert_eq!(
			"azurechinacloud".parse::<AzureEnvironment>().expect("China cloud should parse."),
			AzureEnvironment::AzureChinaCloud
		);
		assert_eq!(
			"AzureUSGovernmentCloud".parse::<AzureEnvironment>().expect("US Gov should parse."),
			AzureEnvironment::AzureUSGovernmentCloud
		);
		assert!(matches!(
			"AzureStackCloud".parse::<AzureEnvironment>(),
			Err(ConfigError::UnknownEnvironment { .. })
		));
	}
}
