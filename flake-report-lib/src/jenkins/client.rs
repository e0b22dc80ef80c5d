//! Jenkins JSON API client
//!
//! Minimal client for the three Jenkins endpoints the report needs: the job
//! list, the build list of a job and archived build artifacts.

use super::{ArtifactRef, Build, JobServer, Throttler};
use crate::Result;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::IntoAppError;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

const LOG_TARGET: &str = "   jenkins";

/// Timeout for JSON API calls.
const API_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for artifact downloads, which can be several megabytes of XML.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);

const JOBS_TREE: &str = "jobs[name]";
const BUILDS_TREE: &str =
    "allBuilds[number,timestamp,duration,building,url,artifacts[fileName,relativePath],actions[failCount,skipCount,totalCount]]";

/// Builds requested per page. Jenkins returns builds newest first.
const BUILDS_PAGE_SIZE: usize = 100;

/// Characters left alone when a job name or artifact path component is placed into a URL path.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Percent-encode a job name or artifact path component for use as one URL path segment.
#[must_use]
pub fn encode_path_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Transport settings for the job server connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    /// Maximum number of requests in flight against the server.
    pub max_conns_per_host: usize,

    /// Accept any TLS certificate. This is insecure.
    pub insecure_skip_verify: bool,
}

impl ClientSettings {
    pub const DEFAULT_MAX_CONNS_PER_HOST: usize = 5;
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            max_conns_per_host: Self::DEFAULT_MAX_CONNS_PER_HOST,
            insecure_skip_verify: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JobList {
    #[serde(default)]
    jobs: Vec<JobEntry>,
}

#[derive(Debug, Deserialize)]
struct JobEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildList {
    #[serde(default)]
    all_builds: Vec<BuildEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildEntry {
    number: u64,
    timestamp: i64,
    #[serde(default)]
    duration: i64,
    #[serde(default)]
    building: bool,
    url: Option<String>,
    #[serde(default)]
    artifacts: Vec<ArtifactEntry>,
    #[serde(default)]
    actions: Vec<Option<ActionEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactEntry {
    file_name: String,
    relative_path: String,
}

/// Jenkins reports test results through the `failCount` of the test result action; all other actions are empty.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionEntry {
    fail_count: Option<u64>,
}

impl BuildEntry {
    fn into_build(self, job: &str) -> Result<Build> {
        let started_at = DateTime::from_timestamp_millis(self.timestamp)
            .into_app_err_with(|| format!("build {} of job '{job}' has an invalid timestamp {}", self.number, self.timestamp))?;
        let completed_at = DateTime::from_timestamp_millis(self.timestamp.saturating_add(self.duration.max(0))).unwrap_or(started_at);

        let failure_count = self.actions.iter().flatten().find_map(|action| action.fail_count);

        let artifacts = self
            .artifacts
            .into_iter()
            .map(|artifact| ArtifactRef {
                job: job.to_string(),
                build_number: self.number,
                file_name: artifact.file_name,
                relative_path: artifact.relative_path,
            })
            .collect();

        Ok(Build {
            job: job.to_string(),
            number: self.number,
            completed_at,
            url: self.url,
            failure_count,
            artifacts,
        })
    }
}

/// [`JobServer`] implementation backed by the Jenkins JSON API.
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    client: reqwest::Client,
    base_url: Url,
    throttler: Arc<Throttler>,
}

impl JenkinsClient {
    pub fn new(endpoint: &Url, settings: ClientSettings) -> Result<Self> {
        let throttler = Throttler::new(settings.max_conns_per_host);

        let client = reqwest::Client::builder()
            .user_agent("flake-report")
            .pool_max_idle_per_host(throttler.max_concurrent())
            .danger_accept_invalid_certs(settings.insecure_skip_verify)
            .build()
            .into_app_err("creating HTTP client")?;

        let mut base_url = endpoint.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            throttler,
        })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of the Jenkins page of a job.
    pub fn job_url(&self, job: &str) -> Result<Url> {
        let relative = format!("job/{}/", encode_path_segment(job));
        self.base_url
            .join(&relative)
            .into_app_err_with(|| format!("building URL for job '{job}'"))
    }

    /// URL of the Jenkins page of a build.
    pub fn build_url(&self, job: &str, build_number: u64) -> Result<Url> {
        self.job_url(job)?
            .join(&format!("{build_number}/"))
            .into_app_err_with(|| format!("building URL for build {build_number} of job '{job}'"))
    }

    fn artifact_url(&self, artifact: &ArtifactRef) -> Result<Url> {
        let path = artifact
            .relative_path
            .split('/')
            .map(encode_path_segment)
            .collect::<Vec<_>>()
            .join("/");

        self.build_url(&artifact.job, artifact.build_number)?
            .join(&format!("artifact/{path}"))
            .into_app_err_with(|| format!("building URL for artifact '{}'", artifact.relative_path))
    }

    async fn get_json<T: DeserializeOwned>(&self, mut url: Url, tree: &str) -> Result<T> {
        _ = url.query_pairs_mut().append_pair("tree", tree);
        log::debug!(target: LOG_TARGET, "GET {url}");

        let _permit = self.throttler.acquire().await;
        let response = self
            .client
            .get(url.clone())
            .timeout(API_TIMEOUT)
            .send()
            .await
            .into_app_err_with(|| format!("requesting {url}"))?
            .error_for_status()
            .into_app_err_with(|| format!("requesting {url}"))?;

        response.json::<T>().await.into_app_err_with(|| format!("decoding response of {url}"))
    }
}

impl JobServer for JenkinsClient {
    async fn list_jobs(&self) -> Result<Vec<String>> {
        let url = self.base_url.join("api/json").into_app_err("building job list URL")?;
        let list: JobList = self.get_json(url, JOBS_TREE).await?;
        Ok(list.jobs.into_iter().map(|job| job.name).collect())
    }

    async fn list_builds(&self, job: &str, since: DateTime<Utc>) -> Result<Vec<Build>> {
        let url = self.job_url(job)?.join("api/json").into_app_err("building build list URL")?;

        let mut builds = Vec::new();
        let mut seen = HashSet::new();
        let mut start = 0;
        loop {
            let tree = format!("{BUILDS_TREE}{{{start},{}}}", start + BUILDS_PAGE_SIZE);
            let page: BuildList = self.get_json(url.clone(), &tree).await?;
            let page_len = page.all_builds.len();

            let mut reached_window_start = false;
            let mut progressed = false;
            for entry in page.all_builds {
                // A server ignoring the range would hand back the same builds again.
                if !seen.insert(entry.number) {
                    continue;
                }
                progressed = true;

                if entry.building {
                    continue;
                }

                let build = entry.into_build(job)?;
                if build.completed_at >= since {
                    builds.push(build);
                } else {
                    reached_window_start = true;
                }
            }

            if reached_window_start || !progressed || page_len < BUILDS_PAGE_SIZE {
                break;
            }

            start += BUILDS_PAGE_SIZE;
            log::debug!(target: LOG_TARGET, "Job '{job}' has more than {start} builds in the window, fetching the next page");
        }

        builds.sort_by_key(|build| build.number);
        log::debug!(target: LOG_TARGET, "Job '{job}' has {} completed builds since {since}", builds.len());

        Ok(builds)
    }

    async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Bytes> {
        let url = self.artifact_url(artifact)?;
        log::debug!(target: LOG_TARGET, "GET {url}");

        let _permit = self.throttler.acquire().await;
        let response = self
            .client
            .get(url.clone())
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .into_app_err_with(|| format!("downloading {url}"))?
            .error_for_status()
            .into_app_err_with(|| format!("downloading {url}"))?;

        response.bytes().await.into_app_err_with(|| format!("reading {url}"))
    }
}
