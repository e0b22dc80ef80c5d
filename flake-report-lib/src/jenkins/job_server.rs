use super::{ArtifactRef, Build};
use crate::Result;
use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Read-only access to a CI job server.
pub trait JobServer: Send + Sync {
    /// Names of all jobs known to the server.
    fn list_jobs(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Completed builds of `job` that finished at or after `since`, in ascending build number order.
    fn list_builds(&self, job: &str, since: DateTime<Utc>) -> impl Future<Output = Result<Vec<Build>>> + Send;

    /// Raw content of an archived build artifact.
    fn fetch_artifact(&self, artifact: &ArtifactRef) -> impl Future<Output = Result<Bytes>> + Send;
}
