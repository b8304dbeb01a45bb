// crates.io
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
// self
use crate::_prelude::*;

/// Verbosity at which token diagnostics are logged.
pub const TOKEN_DIAGNOSTICS_VERBOSITY: u8 = 5;

/// Logging setup failure.
#[derive(Debug, ThisError)]
#[error("Unable to install the log subscriber: {message}.")]
pub struct LoggingError {
	message: String,
}

/// Maps a klog-style verbosity onto a level filter.
pub fn level_for_verbosity(verbosity: u8) -> LevelFilter {
	match verbosity {
		0 => LevelFilter::WARN,
		1..=4 => LevelFilter::INFO,
		5..=9 => LevelFilter::DEBUG,
		_ => LevelFilter::TRACE,
	}
}

/// Installs a stderr-only subscriber; `RUST_LOG` overrides the verbosity-derived default.
///
/// Stdout stays reserved for the credential document.
pub fn init_logging(verbosity: u8) -> Result<(), LoggingError> {
	let env_filter = EnvFilter::builder()
		.with_default_directive(level_for_verbosity(verbosity).into())
		.from_env_lossy();

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.compact()
		.try_init()
		.map_err(|e| LoggingError { message: e.to_string() })
}
