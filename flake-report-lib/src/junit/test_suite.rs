use super::TestOutcome;
use core::time::Duration;

/// A single test case as found in a JUnit document.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub classname: Option<String>,
    pub duration: Duration,
    pub outcome: TestOutcome,
}

impl TestCase {
    #[must_use]
    pub fn new(name: impl Into<String>, outcome: TestOutcome) -> Self {
        Self {
            name: name.into(),
            classname: None,
            duration: Duration::ZERO,
            outcome,
        }
    }
}

/// The test cases of one JUnit document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSuiteResult {
    pub name: String,
    pub cases: Vec<TestCase>,
}

impl TestSuiteResult {
    #[must_use]
    pub fn new(name: impl Into<String>, cases: Vec<TestCase>) -> Self {
        Self { name: name.into(), cases }
    }
}
