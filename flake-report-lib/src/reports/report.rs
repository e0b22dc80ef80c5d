use super::ReportData;
use crate::fetch::{ArtifactFailure, FetchSummary, TimeWindow};
use crate::jenkins::encode_path_segment;
use crate::rating::{BuildRating, ExclusionRecord};
use chrono::{DateTime, Utc};

/// A job that could not be fetched, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedJob {
    pub job: String,
    pub error: String,
}

/// Everything a report sink renders.
#[derive(Debug, Clone)]
pub struct Report {
    pub title: String,

    /// Base URL of the job server, with a trailing slash.
    pub endpoint: String,

    pub generated_at: DateTime<Utc>,
    pub data: ReportData,
    pub ratings: Vec<BuildRating>,
    pub exclusions: Vec<ExclusionRecord>,
    pub failed_jobs: Vec<FailedJob>,
    pub artifact_failures: Vec<ArtifactFailure>,

    /// Number of builds with test cases recorded under more than one outcome.
    pub conflicting_builds: usize,
}

impl Report {
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        endpoint: impl Into<String>,
        generated_at: DateTime<Utc>,
        summary: &FetchSummary,
        window: TimeWindow,
    ) -> Self {
        let mut endpoint = endpoint.into();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }

        Self {
            title: title.into(),
            endpoint,
            generated_at,
            data: ReportData::aggregate(summary.job_results(), window),
            ratings: summary.ratings().cloned().collect(),
            exclusions: summary.exclusions().cloned().collect(),
            failed_jobs: summary
                .failed_jobs
                .iter()
                .map(|failure| FailedJob {
                    job: failure.job.clone(),
                    error: format!("{:#}", failure.error),
                })
                .collect(),
            artifact_failures: summary.artifact_failures().cloned().collect(),
            conflicting_builds: summary.reports.iter().map(|report| report.conflicts.len()).sum(),
        }
    }

    /// Link to the Jenkins page of a job.
    #[must_use]
    pub fn job_link(&self, job: &str) -> String {
        format!("{}job/{}/", self.endpoint, encode_path_segment(job))
    }

    /// Link to the Jenkins page of a build, preferring the URL reported by the server.
    #[must_use]
    pub fn build_link(&self, job: &str, build_number: u64, url: Option<&str>) -> String {
        url.map_or_else(|| format!("{}{build_number}/", self.job_link(job)), ToString::to_string)
    }
}
