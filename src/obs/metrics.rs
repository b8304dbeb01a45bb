// std
use std::time::Duration as StdDuration;
// self
use crate::obs::{Stage, StageOutcome};

/// Counts a settled stage via the global metrics recorder (when enabled).
pub fn record_stage_outcome(stage: Stage, method: &'static str, outcome: StageOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"kubelogin_stage_total",
		"stage" => stage.as_str(),
		"method" => method,
		"outcome" => outcome.as_str()
	)
	.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (stage, method, outcome);
}

/// Records how long a stage took to settle (when enabled).
pub fn record_stage_duration(stage: Stage, method: &'static str, elapsed: StdDuration) {
	#[cfg(feature = "metrics")]
	metrics::histogram!(
		"kubelogin_stage_duration_seconds",
		"stage" => stage.as_str(),
		"method" => method
	)
	.record(elapsed.as_secs_f64());

	#[cfg(not(feature = "metrics"))]
	let _ = (stage, method, elapsed);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_without_recorder_is_a_noop() {
		record_stage_outcome(Stage::Login, "devicecode", StageOutcome::Failure);
		record_stage_duration(Stage::Refresh, "ropc", StdDuration::from_millis(12));
	}
}
