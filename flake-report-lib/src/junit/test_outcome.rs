use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Outcome of a single test case execution.
///
/// Variants are ordered by severity, so `max()` over a set of outcomes yields the worst one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TestOutcome {
    Passed,
    Skipped,
    Errored,
    Failed,
}

impl TestOutcome {
    /// Whether the outcome counts as a test failure.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Errored)
    }
}
