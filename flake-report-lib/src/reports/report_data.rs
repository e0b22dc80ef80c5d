use crate::fetch::{JobResult, TimeWindow};
use crate::junit::TestOutcome;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use strum::{Display, EnumIter};

/// How often a test failed relative to how often it ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    /// Classify by the failure ratio `failures / (passed + failures)`, where failures include errored runs.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "counts are far below 2^52")]
    pub fn from_counts(passed: u64, failures: u64) -> Self {
        if failures == 0 {
            return Self::None;
        }

        let ratio = failures as f64 / (passed + failures) as f64;
        if ratio < 0.1 {
            Self::Low
        } else if ratio < 0.3 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

/// The outcome of a test in one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutcome {
    pub build_number: u64,

    /// The worst outcome recorded for the test in this build.
    pub outcome: TestOutcome,

    /// All outcomes recorded for the test in this build.
    pub outcomes: BTreeSet<TestOutcome>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_url: Option<String>,
}

/// The history of one test in one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDetails {
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub errored: u64,
    pub severity: Severity,

    /// Builds in ascending build number order.
    pub builds: Vec<BuildOutcome>,
}

impl TestDetails {
    const fn new() -> Self {
        Self {
            succeeded: 0,
            failed: 0,
            skipped: 0,
            errored: 0,
            severity: Severity::None,
            builds: Vec::new(),
        }
    }

    /// Number of builds in which the test failed or errored.
    #[must_use]
    pub const fn failures(&self) -> u64 {
        self.failed + self.errored
    }

    /// True when the test both passed and failed in the same job.
    #[must_use]
    pub const fn is_flaky(&self) -> bool {
        self.succeeded > 0 && self.failures() > 0
    }

    fn record(&mut self, outcome: TestOutcome) {
        match outcome {
            TestOutcome::Passed => self.succeeded += 1,
            TestOutcome::Failed => self.failed += 1,
            TestOutcome::Errored => self.errored += 1,
            TestOutcome::Skipped => self.skipped += 1,
        }
    }

    fn finish(&mut self) {
        self.builds.sort_by(|a, b| (a.build_number, &a.outcomes).cmp(&(b.build_number, &b.outcomes)));
        self.severity = Severity::from_counts(self.succeeded, self.failures());
    }
}

/// Failed test cases per job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailures {
    /// Sum of the failed test cases over all builds.
    pub total: u64,

    /// Failed test cases per build number.
    pub builds: BTreeMap<u64, u64>,
}

/// The pass/fail matrix over all reported builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    pub window: TimeWindow,

    /// Test name to job name to the test's history in that job.
    pub data: BTreeMap<String, BTreeMap<String, TestDetails>>,

    pub failures_for_jobs: BTreeMap<String, JobFailures>,

    /// Jobs that contributed at least one build, sorted by name.
    pub jobs: Vec<String>,
}

impl ReportData {
    /// Fold job results into the report.
    ///
    /// The result depends only on the multiset of inputs, not on their order.
    #[must_use]
    pub fn aggregate<'a>(results: impl IntoIterator<Item = &'a JobResult>, window: TimeWindow) -> Self {
        let mut data: BTreeMap<String, BTreeMap<String, TestDetails>> = BTreeMap::new();
        let mut failures_for_jobs: BTreeMap<String, JobFailures> = BTreeMap::new();

        for job_result in results {
            let failures = job_result.result.failure_count() as u64;
            let job_failures = failures_for_jobs.entry(job_result.job.clone()).or_default();
            job_failures.total += failures;
            *job_failures.builds.entry(job_result.build_number).or_default() += failures;

            for (test_name, outcomes) in job_result.result.cases() {
                let Some(&outcome) = outcomes.last() else {
                    continue;
                };

                let details = data
                    .entry(test_name.to_string())
                    .or_default()
                    .entry(job_result.job.clone())
                    .or_insert_with(TestDetails::new);

                details.record(outcome);
                details.builds.push(BuildOutcome {
                    build_number: job_result.build_number,
                    outcome,
                    outcomes: outcomes.clone(),
                    build_url: job_result.build_url.clone(),
                });
            }
        }

        for details in data.values_mut().flat_map(BTreeMap::values_mut) {
            details.finish();
        }

        let jobs = failures_for_jobs.keys().cloned().collect();

        Self {
            window,
            data,
            failures_for_jobs,
            jobs,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over every (test, job) pair in test then job name order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &TestDetails)> {
        self.data
            .iter()
            .flat_map(|(test, jobs)| jobs.iter().map(move |(job, details)| (test.as_str(), job.as_str(), details)))
    }

    /// Tests that both passed and failed within the same job.
    pub fn flaky_tests(&self) -> impl Iterator<Item = (&str, &str, &TestDetails)> {
        self.entries().filter(|(_, _, details)| details.is_flaky())
    }

    /// Tests that failed at least once, worst severity first.
    #[must_use]
    pub fn failing_tests(&self) -> Vec<(&str, &str, &TestDetails)> {
        let mut failing: Vec<_> = self.entries().filter(|(_, _, details)| details.failures() > 0).collect();
        failing.sort_by(|a, b| b.2.severity.cmp(&a.2.severity).then_with(|| b.2.failures().cmp(&a.2.failures())));
        failing
    }
}
