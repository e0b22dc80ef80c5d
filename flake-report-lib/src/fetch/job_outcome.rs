use crate::junit::{MergeConflict, MergedBuildResult};
use crate::rating::{BuildRating, ExclusionRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The merged test results of one build that survived the rating filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub job: String,
    pub build_number: u64,

    /// Jenkins page of the build, when the server reported one.
    pub build_url: Option<String>,

    pub result: MergedBuildResult,
}

/// An artifact whose content could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactFailure {
    pub job: String,
    pub build_number: u64,
    pub file_name: String,
    pub reason: String,
}

/// Everything learned about one job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: String,
    pub rating: BuildRating,
    pub results: Vec<JobResult>,
    pub exclusions: Vec<ExclusionRecord>,
    pub artifact_failures: Vec<ArtifactFailure>,

    /// Test cases with more than one outcome, keyed by build number.
    pub conflicts: BTreeMap<u64, Vec<MergeConflict>>,
}

/// A job whose fetch was aborted by a transport or server error.
#[derive(Debug, Clone)]
pub struct JobFailure {
    pub job: String,
    pub error: Arc<ohno::AppError>,
}

/// What a job task reports back to the collector.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Completed(JobReport),
    Failed(JobFailure),
}

impl JobOutcome {
    #[must_use]
    pub fn job(&self) -> &str {
        match self {
            Self::Completed(report) => &report.job,
            Self::Failed(failure) => &failure.job,
        }
    }

    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// All outcomes of a fetch run, ordered by job name.
#[derive(Debug, Clone, Default)]
pub struct FetchSummary {
    pub reports: Vec<JobReport>,
    pub failed_jobs: Vec<JobFailure>,
}

impl FetchSummary {
    pub fn add(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Completed(report) => self.reports.push(report),
            JobOutcome::Failed(failure) => self.failed_jobs.push(failure),
        }
    }

    /// Put reports and failures in job name order, independent of completion order.
    pub fn sort(&mut self) {
        self.reports.sort_by(|a, b| a.job.cmp(&b.job));
        self.failed_jobs.sort_by(|a, b| a.job.cmp(&b.job));
    }

    /// True when no job failed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_jobs.is_empty()
    }

    pub fn job_results(&self) -> impl Iterator<Item = &JobResult> {
        self.reports.iter().flat_map(|report| &report.results)
    }

    pub fn ratings(&self) -> impl Iterator<Item = &BuildRating> {
        self.reports.iter().map(|report| &report.rating)
    }

    pub fn exclusions(&self) -> impl Iterator<Item = &ExclusionRecord> {
        self.reports.iter().flat_map(|report| &report.exclusions)
    }

    pub fn artifact_failures(&self) -> impl Iterator<Item = &ArtifactFailure> {
        self.reports.iter().flat_map(|report| &report.artifact_failures)
    }
}

impl FromIterator<JobOutcome> for FetchSummary {
    fn from_iter<T: IntoIterator<Item = JobOutcome>>(iter: T) -> Self {
        let mut summary = Self::default();
        for outcome in iter {
            summary.add(outcome);
        }
        summary.sort();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::RatingSettings;
    use ohno::app_err;

    fn report(job: &str) -> JobReport {
        JobReport {
            job: job.to_string(),
            rating: BuildRating::new(job, [(1, 0)], RatingSettings::default()),
            results: vec![JobResult {
                job: job.to_string(),
                build_number: 1,
                build_url: None,
                result: MergedBuildResult::default(),
            }],
            exclusions: Vec::new(),
            artifact_failures: vec![ArtifactFailure {
                job: job.to_string(),
                build_number: 1,
                file_name: "junit.xml".into(),
                reason: "bad".into(),
            }],
            conflicts: BTreeMap::new(),
        }
    }

    fn failure(job: &str) -> JobFailure {
        JobFailure {
            job: job.to_string(),
            error: Arc::new(app_err!("connection refused")),
        }
    }

    #[test]
    fn test_summary_is_sorted_by_job() {
        let summary: FetchSummary = [
            JobOutcome::Completed(report("b")),
            JobOutcome::Failed(failure("z")),
            JobOutcome::Completed(report("a")),
            JobOutcome::Failed(failure("y")),
        ]
        .into_iter()
        .collect();

        let reports: Vec<_> = summary.reports.iter().map(|r| r.job.as_str()).collect();
        let failed: Vec<_> = summary.failed_jobs.iter().map(|f| f.job.as_str()).collect();
        assert_eq!(reports, vec!["a", "b"]);
        assert_eq!(failed, vec!["y", "z"]);
        assert!(!summary.is_complete());
    }

    #[test]
    fn test_summary_accessors() {
        let summary: FetchSummary = [JobOutcome::Completed(report("a")), JobOutcome::Completed(report("b"))]
            .into_iter()
            .collect();

        assert!(summary.is_complete());
        assert_eq!(summary.job_results().count(), 2);
        assert_eq!(summary.ratings().count(), 2);
        assert_eq!(summary.artifact_failures().count(), 2);
        assert_eq!(summary.exclusions().count(), 0);
    }

    #[test]
    fn test_outcome_job_name() {
        assert_eq!(JobOutcome::Completed(report("a")).job(), "a");
        assert_eq!(JobOutcome::Failed(failure("b")).job(), "b");
        assert!(JobOutcome::Completed(report("a")).is_completed());
        assert!(!JobOutcome::Failed(failure("b")).is_completed());
    }
}
