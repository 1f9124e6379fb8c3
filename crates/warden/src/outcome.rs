//! Step Outcomes
//!
//! Every step of the per-event workflow swallows its own failures so that
//! later steps still run. Instead of inferring degraded paths from log
//! output, each step reports an explicit [`StepOutcome`] that the
//! orchestrator collects into its event report.

/// Outcome of one workflow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step ran and had its intended effect.
    Completed,
    /// The step had nothing to act on (instance vanished, empty roster,
    /// key never appeared). Normal, non-error.
    Absent,
    /// The step failed and the failure was logged and swallowed.
    Failed,
}

impl StepOutcome {
    pub fn is_completed(self) -> bool {
        matches!(self, StepOutcome::Completed)
    }
}
