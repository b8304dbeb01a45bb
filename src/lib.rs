//! Kubernetes exec credential helper for clusters secured by Azure AD.
//!
//! Serves a cached token while it is fresh, spends the refresh token once when it is not, and
//! falls back to a full login otherwise. kubectl receives exactly one `ExecCredential` document.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod cli;
pub mod cloud;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod exec;
pub mod http;
pub mod login;
pub mod oauth;
pub mod obs;
pub mod orchestrator;
pub mod refresh;
#[cfg(test)]
mod _preludet {
	//! Convenience re-exports and fixtures shared by unit tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::Token,
		http::ReqwestHttpClient,
		oauth::{AadFacade, ReqwestTransportErrorMapper},
	};

	/// Facade type alias used by reqwest-backed unit tests.
	pub type ReqwestTestFacade = AadFacade<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Builds a facade over a plain reqwest client for tests that talk to `httpmock`.
	pub fn test_facade() -> Arc<ReqwestTestFacade> {
		Arc::new(AadFacade::new(ReqwestHttpClient::default(), ReqwestTransportErrorMapper))
	}

	/// Builds a token for `resource` that expires `expires_in` from now.
	pub fn token_for(resource: &str, access: &str, expires_in: Duration) -> Token {
		Token::builder(resource)
			.access_token(access)
			.expires_on(OffsetDateTime::now_utc() + expires_in)
			.build()
			.expect("Token fixture should build successfully.")
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		path::{Path, PathBuf},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
