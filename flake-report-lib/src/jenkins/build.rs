use chrono::{DateTime, Utc};

/// One completed build of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
    pub job: String,
    pub number: u64,
    pub completed_at: DateTime<Utc>,

    /// Jenkins page of the build.
    pub url: Option<String>,

    /// Number of failed tests, if the build published test results.
    pub failure_count: Option<u64>,

    pub artifacts: Vec<ArtifactRef>,
}

/// Reference to a file archived by a build. The content is fetched on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactRef {
    pub job: String,
    pub build_number: u64,
    pub file_name: String,
    pub relative_path: String,
}
