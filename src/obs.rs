//! Observability for the credential flow.
//!
//! Each orchestrator stage (serve, refresh, login) is wrapped in a [`StageSpan`]: a
//! `kubelogin.stage` span tagged with the stage and login method whose `outcome` field is filled
//! in when the stage settles. With the `metrics` feature the same settlement increments
//! `kubelogin_stage_total{stage,method,outcome}` and records
//! `kubelogin_stage_duration_seconds{stage,method}`.
//!
//! [`init_logging`] installs the stderr subscriber used by the binary.

mod logging;
mod metrics;
mod stage;

pub use logging::*;
pub use metrics::*;
pub use stage::*;

// self
use crate::_prelude::*;

/// Orchestrator stages observed by spans and metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
	/// Serving a still-valid cached token.
	Serve,
	/// Refresh token exchange.
	Refresh,
	/// Full login through the configured method.
	Login,
}
impl Stage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Serve => "serve",
			Self::Refresh => "refresh",
			Self::Login => "login",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// How a stage settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// The stage produced the token that was emitted.
	Success,
	/// The stage failed. For refresh the failure is absorbed by the login fallback.
	Failure,
}
impl StageOutcome {
	/// Classifies a stage result.
	pub fn of<T, E>(result: &Result<T, E>) -> Self {
		if result.is_ok() { Self::Success } else { Self::Failure }
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Success => "success",
			Self::Failure => "failure",
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
