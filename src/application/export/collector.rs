use tracing::warn;

use super::types::{RenderFailure, RenderOutcome, RenderedDiagram};

/// Outcomes of one batch split into archive input and diagnostics.
#[derive(Debug, Default)]
pub struct CollectedOutcomes {
    pub rendered: Vec<RenderedDiagram>,
    pub failures: Vec<RenderFailure>,
}

/// Partition outcomes, logging every failure. Does not depend on the order
/// outcomes arrive in.
pub fn collect(outcomes: Vec<RenderOutcome>) -> CollectedOutcomes {
    let mut collected = CollectedOutcomes::default();
    for outcome in outcomes {
        match outcome {
            RenderOutcome::Rendered(diagram) => collected.rendered.push(diagram),
            RenderOutcome::Failed(failure) => {
                warn!(
                    target = "application::export::collector",
                    category = %failure.category,
                    view_key = %failure.view_key,
                    error = %failure.message,
                    "Failed to render diagram; dropping it from the archive"
                );
                collected.failures.push(failure);
            }
        }
    }
    collected
}
