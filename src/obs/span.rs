// crates.io
use tracing::{Span, instrument::Instrumented};
// self
use crate::{
	_prelude::*,
	obs::{CallKind, CallStage},
};

/// `menu_broker.call` span wrapped around one upstream call.
#[derive(Clone, Debug)]
pub struct CallSpan {
	span: Span,
}
impl CallSpan {
	/// Opens a span for `kind` at pipeline `stage`.
	pub fn new(kind: CallKind, stage: CallStage) -> Self {
		let span =
			tracing::info_span!("menu_broker.call", call = kind.as_str(), stage = stage.as_str());

		Self { span }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		use tracing::Instrument;

		fut.instrument(self.span.clone())
	}
}
