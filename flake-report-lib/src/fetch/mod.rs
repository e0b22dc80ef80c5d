//! Concurrent retrieval of job results
//!
//! The [`Orchestrator`] lists the jobs of a [`JobServer`](crate::jenkins::JobServer), keeps the ones selected by
//! the [`JobFilter`] and fetches every selected job in its own task:
//!
//! 1. list the completed builds of the job since the earlier of the two window starts,
//! 2. rate the builds of the rating window by their failure counts,
//! 3. skip report-window builds the rating marks as outliers, recording an exclusion,
//! 4. download the artifacts whose name matches the artifact pattern,
//! 5. parse them as JUnit reports and merge them per build.
//!
//! A job that fails with a transport or server error becomes a [`JobFailure`]; the other jobs are unaffected.
//! An artifact that cannot be parsed becomes an [`ArtifactFailure`] and the job continues.

mod fetch_settings;
mod job_filter;
mod job_outcome;
mod orchestrator;
mod progress;
mod time_window;

pub use fetch_settings::FetchSettings;
pub use job_filter::JobFilter;
pub use job_outcome::{ArtifactFailure, FetchSummary, JobFailure, JobOutcome, JobReport, JobResult};
pub use orchestrator::{Orchestrator, fetch_job};
pub use progress::{NoProgress, Progress};
pub use time_window::TimeWindow;
