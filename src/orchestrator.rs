//! The credential decision flow.
//!
//! One [`CredentialOrchestrator::run`] per process: read the cache, serve a still-valid token,
//! otherwise spend the refresh token once, otherwise log in. The cache is written before the
//! credential reaches stdout, and diagnostics run only after the credential was written.

// std
use std::io::Write;
// self
use crate::{
	_prelude::*,
	auth::Token,
	cache::{FileTokenCache, TokenCache},
	config::{ExecSettings, Options},
	diagnostics::{self, GraphGroupResolver, GroupResolver},
	exec::{CredentialWriter, ExecCredentialWriter},
	http::TokenHttpClient,
	login::{self, TokenProvider},
	oauth::{AadFacade, TransportErrorMapper},
	obs::{Stage, StageOutcome, StageSpan},
	refresh::{AadRefresherFactory, RefresherFactory},
};

/// Runs the cache → refresh → login decision flow and writes the result.
pub struct CredentialOrchestrator {
	options: Options,
	settings: ExecSettings,
	cache: Arc<dyn TokenCache>,
	provider: Box<dyn TokenProvider>,
	refreshers: Arc<dyn RefresherFactory>,
	writer: Arc<dyn CredentialWriter>,
	groups: Arc<dyn GroupResolver>,
}
impl CredentialOrchestrator {
	/// Assembles an orchestrator from explicit collaborators.
	///
	/// The cache defaults to [`FileTokenCache`] and the writer to [`ExecCredentialWriter`] with
	/// the default API version.
	pub fn new(
		options: Options,
		provider: Box<dyn TokenProvider>,
		refreshers: Arc<dyn RefresherFactory>,
		groups: Arc<dyn GroupResolver>,
	) -> Self {
		Self {
			options,
			settings: ExecSettings::default(),
			cache: Arc::new(FileTokenCache),
			provider,
			refreshers,
			writer: Arc::new(ExecCredentialWriter::default()),
			groups,
		}
	}

	/// Wires the Azure AD collaborators for `options` around one shared facade.
	pub fn from_options<C, M>(options: Options, facade: Arc<AadFacade<C, M>>) -> Result<Self>
	where
		C: 'static + ?Sized + TokenHttpClient,
		M: 'static + ?Sized + TransportErrorMapper<C::TransportError>,
	{
		let provider = login::new_token_provider(&options, Arc::clone(&facade))?;
		let groups = GraphGroupResolver::new(Arc::clone(&facade), options.environment)?;
		let refreshers = AadRefresherFactory::new(facade);

		Ok(Self::new(options, provider, Arc::new(refreshers), Arc::new(groups)))
	}

	/// Replaces the per-invocation settings.
	pub fn with_settings(mut self, settings: ExecSettings) -> Self {
		self.settings = settings;

		self
	}

	/// Replaces the token cache.
	pub fn with_cache(mut self, cache: Arc<dyn TokenCache>) -> Self {
		self.cache = cache;

		self
	}

	/// Replaces the credential writer.
	pub fn with_writer(mut self, writer: Arc<dyn CredentialWriter>) -> Self {
		self.writer = writer;

		self
	}

	/// Acquires a token and writes exactly one credential to `out`, then logs diagnostics.
	pub async fn run(&self, out: &mut dyn Write) -> Result<()> {
		let token = self.acquire().await?;

		self.writer.write(&token, out)?;

		if self.settings.diagnostics {
			diagnostics::log_token_info(
				&token,
				self.provider.tenant_id(),
				self.groups.as_ref(),
				self.settings.group_lookup_timeout,
			)
			.await;
		}

		Ok(())
	}

	/// Produces the token to emit, persisting it first when caching applies.
	pub async fn acquire(&self) -> Result<Token> {
		if self.options.login_method.manages_own_cache() {
			tracing::debug!(method = %self.options.login_method, "Token cache disabled for login method.");

			return self.login().await;
		}

		let path = self.options.token_cache_file();
		let cached = self
			.cache
			.read(&path)
			.await
			.map_err(|source| Error::CacheRead { path: path.clone(), source })?;
		let audience = self.options.target_audience();

		if cached.resource == audience && !cached.is_zero() {
			if !self.settings.force_refresh
				&& !cached.will_expire_within(self.settings.expiry_delta)
			{
				return Ok(self.serve(cached));
			}

			if let Some(token) = self.refresh(&cached, &audience).await? {
				self.persist(&path, &token).await?;

				return Ok(token);
			}
		} else if !cached.is_zero() {
			tracing::debug!(
				cached = %cached.resource,
				requested = %audience,
				"Cached token audience does not match."
			);
		}

		let token = self.login().await?;

		self.persist(&path, &token).await?;

		Ok(token)
	}

	fn serve(&self, token: Token) -> Token {
		let stage = StageSpan::begin(Stage::Serve, self.options.login_method.as_str());

		{
			let _entered = stage.enter();

			tracing::info!(token = %token.access_token.fingerprint(), "Serving cached token.");
		}

		stage.settle(StageOutcome::Success);

		token
	}

	/// Returns `Ok(None)` when refresh was skipped or the exchange failed.
	async fn refresh(&self, cached: &Token, audience: &str) -> Result<Option<Token>> {
		if cached.refresh_secret().is_none() {
			tracing::debug!("Cached token has no refresh token.");

			return Ok(None);
		}

		let stage = StageSpan::begin(Stage::Refresh, self.options.login_method.as_str());
		let refresher = {
			let _entered = stage.enter();
			let oauth = self.options.oauth_config()?;

			self.refreshers.create(
				&oauth,
				self.options.require_client_id()?,
				audience,
				self.options.require_tenant_id()?,
				cached,
			)?
		};

		match stage.observe(refresher.token()).await {
			Ok(token) => {
				tracing::info!(token = %token.access_token.fingerprint(), "Refreshed cached token.");

				Ok(Some(token))
			},
			Err(e) => {
				tracing::warn!(error = %e, "Token refresh failed; falling back to login.");

				Ok(None)
			},
		}
	}

	async fn login(&self) -> Result<Token> {
		let method = self.options.login_method;

		StageSpan::begin(Stage::Login, method.as_str())
			.observe(self.provider.token())
			.await
			.map_err(|e| Error::Login { method, source: Box::new(e) })
	}

	async fn persist(&self, path: &Path, token: &Token) -> Result<()> {
		self.cache
			.write(path, token)
			.await
			.map_err(|source| Error::CacheWrite { path: path.to_path_buf(), source })
	}
}
impl Debug for CredentialOrchestrator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialOrchestrator")
			.field("options", &self.options)
			.field("settings", &self.settings)
			.finish_non_exhaustive()
	}
}
