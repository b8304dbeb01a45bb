// std
use std::time::Instant;
// crates.io
use tracing::{Instrument, field::Empty, span::Entered};
// self
use crate::{
	_prelude::*,
	obs::{self, Stage, StageOutcome},
};

/// One orchestrator stage in flight.
///
/// The span is opened with `outcome` empty; [`StageSpan::settle`] or [`StageSpan::observe`]
/// records it together with the metrics for the stage.
#[derive(Debug)]
pub struct StageSpan {
	stage: Stage,
	method: &'static str,
	span: tracing::Span,
	started: Instant,
}
impl StageSpan {
	/// Opens the span for `stage` run on behalf of the `method` login method.
	pub fn begin(stage: Stage, method: &'static str) -> Self {
		let span =
			tracing::info_span!("kubelogin.stage", stage = stage.as_str(), method, outcome = Empty);

		Self { stage, method, span, started: Instant::now() }
	}

	/// Enters the span for synchronous work belonging to the stage.
	pub fn enter(&self) -> Entered<'_> {
		self.span.enter()
	}

	/// Drives `fut` inside the span and settles the stage with its result.
	pub async fn observe<T, E, Fut>(self, fut: Fut) -> Result<T, E>
	where
		Fut: Future<Output = Result<T, E>>,
	{
		let result = fut.instrument(self.span.clone()).await;

		self.settle(StageOutcome::of(&result));

		result
	}

	/// Records `outcome` on the span and in the stage metrics.
	pub fn settle(self, outcome: StageOutcome) {
		self.span.record("outcome", outcome.as_str());
		self.span.in_scope(|| tracing::debug!(elapsed = ?self.started.elapsed(), "Stage settled."));

		obs::record_stage_outcome(self.stage, self.method, outcome);
		obs::record_stage_duration(self.stage, self.method, self.started.elapsed());
	}
}
