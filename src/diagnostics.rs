//! Best-effort token diagnostics: time to expiry and group membership.
//!
//! Nothing in here can fail the invocation. Every error stops at [`log_token_info`], which logs it
//! as a warning and returns.

// crates.io
use oauth2::http::header::{AUTHORIZATION, HeaderName};
// self
use crate::{
	_prelude::*,
	auth::{TenantId, Token, TokenSecret, claims::ClaimsError},
	cloud::AzureEnvironment,
	error::ConfigError,
	http::{ReqwestHttpClient, TokenHttpClient},
	login::{AzureCliLogin, TokenProvider},
	oauth::{self, AadFacade, EndpointCall, ReqwestTransportErrorMapper, TransportErrorMapper},
};

/// Boxed future returned by [`GroupResolver::resolve_group_names`].
pub type ResolveFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Vec<String>, DiagnosticError>> + 'a + Send>>;

/// Failures on the diagnostic path. Never converted into [`Error`].
#[derive(Debug, ThisError)]
pub enum DiagnosticError {
	/// The access token could not be decoded.
	#[error("Unable to decode the access token.")]
	Claims(#[from] ClaimsError),
	/// The directory lookup did not finish in time.
	#[error("Group lookup timed out after {}s.", .0.whole_seconds())]
	Timeout(Duration),
	/// The directory lookup failed.
	#[error("Group lookup failed.")]
	Lookup(#[source] Box<Error>),
	/// The directory returned no names for the token's group IDs.
	#[error("Group lookup returned no names for {requested} group ID(s).")]
	EmptyLookup {
		/// Number of group IDs sent to the directory.
		requested: usize,
	},
}
impl From<Error> for DiagnosticError {
	fn from(e: Error) -> Self {
		Self::Lookup(Box::new(e))
	}
}
impl From<ConfigError> for DiagnosticError {
	fn from(e: ConfigError) -> Self {
		Self::Lookup(Box::new(e.into()))
	}
}

/// Resolves group object IDs to display names.
pub trait GroupResolver: Send + Sync {
	/// Looks up `group_ids`, scoped to `tenant` when given.
	fn resolve_group_names<'a>(
		&'a self,
		tenant: Option<&'a TenantId>,
		group_ids: &'a [String],
	) -> ResolveFuture<'a>;
}

/// How [`GraphGroupResolver`] authenticates to Microsoft Graph.
#[derive(Clone, Debug)]
pub enum GraphCredential {
	/// Ask the Azure CLI for a Graph token, scoped to the lookup tenant.
	AzureCli {
		/// Upper bound for the CLI call.
		timeout: Duration,
	},
	/// Use a pre-acquired bearer token.
	Static(TokenSecret),
}

/// [`GroupResolver`] backed by Microsoft Graph `directoryObjects/getByIds`.
pub struct GraphGroupResolver<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: Arc<AadFacade<C, M>>,
	graph_endpoint: Url,
	credential: GraphCredential,
}
impl<C, M> GraphGroupResolver<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a resolver for `environment`'s Graph endpoint authenticated by the Azure CLI.
	pub fn new(facade: Arc<AadFacade<C, M>>, environment: AzureEnvironment) -> Result<Self, ConfigError> {
		Ok(Self {
			facade,
			graph_endpoint: environment.graph_url()?,
			credential: GraphCredential::AzureCli { timeout: Duration::seconds(30) },
		})
	}

	/// Overrides the Graph endpoint.
	pub fn with_graph_endpoint(mut self, endpoint: Url) -> Self {
		self.graph_endpoint = endpoint;

		self
	}

	/// Overrides the credential.
	pub fn with_credential(mut self, credential: GraphCredential) -> Self {
		self.credential = credential;

		self
	}

	async fn bearer(&self, tenant: Option<&TenantId>) -> Result<TokenSecret, DiagnosticError> {
		match &self.credential {
			GraphCredential::Static(secret) => Ok(secret.clone()),
			GraphCredential::AzureCli { timeout } => {
				let resource = self.graph_endpoint.as_str().trim_end_matches('/').to_owned();
				let login = AzureCliLogin::for_resource(resource, tenant.cloned(), *timeout);

				Ok(login.token().await?.access_token)
			},
		}
	}

	async fn resolve(
		&self,
		tenant: Option<&TenantId>,
		group_ids: &[String],
	) -> Result<Vec<String>, DiagnosticError> {
		#[derive(Deserialize)]
		struct DirectoryObjects {
			#[serde(default)]
			value: Vec<DirectoryObject>,
		}
		#[derive(Deserialize)]
		#[serde(rename_all = "camelCase")]
		struct DirectoryObject {
			id: Option<String>,
			display_name: Option<String>,
		}

		let bearer = self.bearer(tenant).await?;
		let authorization = format!("Bearer {}", bearer.expose());
		let endpoint = self
			.graph_endpoint
			.join("v1.0/directoryObjects/getByIds")
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let body = serde_json::json!({ "ids": group_ids, "types": ["group"] });
		let headers: [(HeaderName, &str); 1] = [(AUTHORIZATION, authorization.as_str())];
		let request = oauth::json_request(&endpoint, &headers, &body)?;
		let objects: DirectoryObjects =
			self.facade.request_json(EndpointCall::DirectoryLookup, request).await?;

		Ok(objects
			.value
			.into_iter()
			.filter_map(|object| object.display_name.or(object.id))
			.collect())
	}
}
impl<C, M> GroupResolver for GraphGroupResolver<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn resolve_group_names<'a>(
		&'a self,
		tenant: Option<&'a TenantId>,
		group_ids: &'a [String],
	) -> ResolveFuture<'a> {
		Box::pin(self.resolve(tenant, group_ids))
	}
}

/// Computes the sorted group names to log for `token`.
///
/// Object IDs are resolved only when the provider exposes a tenant; the lookup is tenant-scoped
/// only when that tenant is a GUID. Name-valued claims are returned as-is.
pub async fn group_names(
	token: &Token,
	tenant: Option<&TenantId>,
	resolver: &dyn GroupResolver,
	timeout: Duration,
) -> Result<Vec<String>, DiagnosticError> {
	let claims = token.unverified_claims()?;

	if claims.groups.is_empty() {
		return Ok(Vec::new());
	}

	let mut names = match tenant {
		Some(tenant) if claims.groups_are_object_ids() => {
			let scope = Some(tenant).filter(|tenant| tenant.is_guid());
			let lookup = resolver.resolve_group_names(scope, &claims.groups);
			let names = tokio::time::timeout(timeout.unsigned_abs(), lookup)
				.await
				.map_err(|_| DiagnosticError::Timeout(timeout))??;

			if names.is_empty() {
				return Err(DiagnosticError::EmptyLookup { requested: claims.groups.len() });
			}

			names
		},
		_ => claims.groups,
	};

	names.sort();

	Ok(names)
}

/// Logs time to expiry and group names. Failures are logged and swallowed.
pub async fn log_token_info(
	token: &Token,
	tenant: Option<&TenantId>,
	resolver: &dyn GroupResolver,
	timeout: Duration,
) {
	tracing::debug!(expires_in_secs = token.expires_in().whole_seconds(), "Token expiry.");

	match group_names(token, tenant, resolver, timeout).await {
		Ok(names) if names.is_empty() => {},
		Ok(names) => {
			tracing::debug!("Token group names:");

			for name in names {
				tracing::debug!("  - {name}");
			}
		},
		Err(e) => tracing::warn!(error = %e, "Unable to log token groups."),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	use httpmock::prelude::*;
	// self
	use super::*;
	use crate::_preludet::{test_facade, token_for};

	const GROUP_A: &str = "00000000-0000-0000-0000-00000000000a";
	const GROUP_B: &str = "00000000-0000-0000-0000-00000000000b";

	struct Recording {
		seen: Mutex<Vec<Option<String>>>,
		delay: Option<std::time::Duration>,
	}
	impl GroupResolver for Recording {
		fn resolve_group_names<'a>(
			&'a self,
			tenant: Option<&'a TenantId>,
			group_ids: &'a [String],
		) -> ResolveFuture<'a> {
			Box::pin(async move {
				self.seen.lock().push(tenant.map(ToString::to_string));

				if let Some(delay) = self.delay {
					tokio::time::sleep(delay).await;
				}

				Ok(group_ids.iter().rev().map(|id| format!("name-{id}")).collect())
			})
		}
	}

	fn recording(delay: Option<std::time::Duration>) -> Recording {
		Recording { seen: Mutex::new(Vec::new()), delay }
	}

	fn jwt_with_groups(groups: &[&str]) -> Token {
		let payload = serde_json::json!({ "groups": groups }).to_string();
		let jwt = format!("e30.{}.sig", URL_SAFE_NO_PAD.encode(payload));

		token_for("server", &jwt, Duration::hours(1))
	}

	fn tenant(raw: &str) -> TenantId {
		TenantId::new(raw).expect("Tenant fixture should be valid.")
	}

	#[tokio::test]
	async fn object_ids_are_resolved_and_sorted() {
		let resolver = recording(None);
		let guid = tenant("72f988bf-86f1-41af-91ab-2d7cd011db47");
		let names = group_names(&jwt_with_groups(&[GROUP_A, GROUP_B]), Some(&guid), &resolver, Duration::seconds(5))
			.await
			.expect("Lookup should succeed.");

		assert_eq!(names, vec![format!("name-{GROUP_A}"), format!("name-{GROUP_B}")]);
		assert_eq!(*resolver.seen.lock(), vec![Some(guid.to_string())]);
	}

	#[tokio::test]
	async fn non_guid_tenant_is_unscoped_and_missing_tenant_skips_lookup() {
		let resolver = recording(None);
		let token = jwt_with_groups(&[GROUP_B, GROUP_A]);

		group_names(&token, Some(&tenant("contoso.onmicrosoft.com")), &resolver, Duration::seconds(5))
			.await
			.expect("Lookup should succeed.");

		let raw = group_names(&token, None, &resolver, Duration::seconds(5))
			.await
			.expect("Raw groups should be returned.");

		assert_eq!(*resolver.seen.lock(), vec![None]);
		assert_eq!(raw, vec![GROUP_A.to_owned(), GROUP_B.to_owned()]);
	}

	#[tokio::test]
	async fn empty_lookup_result_is_reported() {
		struct Empty;
		impl GroupResolver for Empty {
			fn resolve_group_names<'a>(
				&'a self,
				_: Option<&'a TenantId>,
				_: &'a [String],
			) -> ResolveFuture<'a> {
				Box::pin(async { Ok(Vec::new()) })
			}
		}

		let token = jwt_with_groups(&[GROUP_A, GROUP_B]);
		let err = group_names(&token, Some(&tenant(GROUP_A)), &Empty, Duration::seconds(1))
			.await
			.expect_err("An empty lookup result must be reported.");

		assert!(matches!(err, DiagnosticError::EmptyLookup { requested: 2 }));

		log_token_info(&token, Some(&tenant(GROUP_A)), &Empty, Duration::seconds(1)).await;
	}

	#[tokio::test]
	async fn slow_lookup_times_out() {
		let resolver = recording(Some(std::time::Duration::from_secs(5)));
		let err = group_names(
			&jwt_with_groups(&[GROUP_A]),
			Some(&tenant("tenant")),
			&resolver,
			Duration::milliseconds(20),
		)
		.await
		.expect_err("Slow lookup must time out.");

		assert!(matches!(err, DiagnosticError::Timeout(_)));
	}

	#[tokio::test]
	async fn opaque_token_is_a_claims_error_and_logging_swallows_it() {
		let token = token_for("server", "opaque", Duration::hours(1));
		let resolver = recording(None);

		assert!(matches!(
			group_names(&token, None, &resolver, Duration::seconds(1)).await,
			Err(DiagnosticError::Claims(_))
		));

		log_token_info(&token, None, &resolver, Duration::seconds(1)).await;
	}

	#[tokio::test]
	async fn graph_resolver_posts_ids_with_bearer() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST)
					.path("/v1.0/directoryObjects/getByIds")
					.header("authorization", "Bearer graph-token");
				then.status(200).header("content-type", "application/json").body(
					r##"{"value":[{"@odata.type":"#microsoft.graph.group","id":"a","displayName":"cluster-admins"}]}"##,
				);
			})
			.await;
		let resolver = GraphGroupResolver::new(test_facade(), AzureEnvironment::AzurePublicCloud)
			.expect("Resolver should build.")
			.with_graph_endpoint(Url::parse(&server.base_url()).expect("Mock URL should parse."))
			.with_credential(GraphCredential::Static(TokenSecret::new("graph-token")));
		let names = resolver
			.resolve_group_names(None, &[GROUP_A.to_owned()])
			.await
			.expect("Graph lookup should succeed.");

		mock.assert_async().await;

		assert_eq!(names, vec!["cluster-admins".to_owned()]);
	}
}
