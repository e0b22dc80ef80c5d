use super::{TestOutcome, TestSuiteResult};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// All test results of one build, keyed by test case name.
///
/// Every test case maps to the set of outcomes observed for it across all merged documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MergedBuildResult {
    cases: BTreeMap<String, BTreeSet<TestOutcome>>,
}

/// A test case that was recorded with more than one distinct outcome within one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeConflict {
    pub test_name: String,
    pub outcomes: BTreeSet<TestOutcome>,
}

impl MergedBuildResult {
    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Iterate over all test cases in name order.
    pub fn cases(&self) -> impl Iterator<Item = (&str, &BTreeSet<TestOutcome>)> {
        self.cases.iter().map(|(name, outcomes)| (name.as_str(), outcomes))
    }

    #[must_use]
    pub fn outcomes(&self, test_name: &str) -> Option<&BTreeSet<TestOutcome>> {
        self.cases.get(test_name)
    }

    /// The single outcome used for counting: the worst outcome observed.
    #[must_use]
    pub fn effective_outcome(&self, test_name: &str) -> Option<TestOutcome> {
        self.cases.get(test_name).and_then(|outcomes| outcomes.last().copied())
    }

    /// Number of test cases whose effective outcome is a failure.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.cases
            .values()
            .filter(|outcomes| outcomes.last().is_some_and(|outcome| outcome.is_failure()))
            .count()
    }

    /// Test cases recorded with conflicting outcomes, in name order.
    #[must_use]
    pub fn conflicts(&self) -> Vec<MergeConflict> {
        self.cases
            .iter()
            .filter(|(_, outcomes)| outcomes.len() > 1)
            .map(|(name, outcomes)| MergeConflict {
                test_name: name.clone(),
                outcomes: outcomes.clone(),
            })
            .collect()
    }

    /// Add the cases of a single parsed document.
    pub fn add_suite(&mut self, suite: &TestSuiteResult) {
        for case in &suite.cases {
            let _ = self.cases.entry(case.name.clone()).or_default().insert(case.outcome);
        }
    }

    /// Union another merged result into this one.
    pub fn extend(&mut self, other: &Self) {
        for (name, outcomes) in &other.cases {
            self.cases.entry(name.clone()).or_default().extend(outcomes.iter().copied());
        }
    }
}

/// Merge the documents of one build.
///
/// Returns the merged result together with the cases that ended up with more than one outcome. An empty input
/// yields an empty result.
#[must_use]
pub fn merge<'a>(suites: impl IntoIterator<Item = &'a TestSuiteResult>) -> (MergedBuildResult, Vec<MergeConflict>) {
    let mut merged = MergedBuildResult::default();
    for suite in suites {
        merged.add_suite(suite);
    }

    let conflicts = merged.conflicts();
    (merged, conflicts)
}
