use super::{JobFilter, TimeWindow};
use crate::rating::RatingSettings;
use regex::Regex;

/// Everything one fetch run needs to know.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Jobs to fetch.
    pub job_filter: JobFilter,

    /// Artifacts whose file name matches are parsed as JUnit reports.
    pub artifact_pattern: Regex,

    /// Builds that completed in this window are reported.
    pub report_window: TimeWindow,

    /// Builds that completed in this window feed the build rating.
    pub rating_window: TimeWindow,

    pub rating: RatingSettings,

    /// Maximum number of jobs fetched at the same time.
    pub max_concurrent_jobs: usize,
}

impl FetchSettings {
    pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 10;

    /// Builds completed since this instant are needed for either window.
    #[must_use]
    pub fn earliest_start(&self) -> chrono::DateTime<chrono::Utc> {
        self.report_window.start.min(self.rating_window.start)
    }
}
