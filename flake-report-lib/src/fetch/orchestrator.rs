use super::{ArtifactFailure, FetchSettings, FetchSummary, JobFailure, JobOutcome, JobReport, JobResult, Progress};
use crate::Result;
use crate::jenkins::{ArtifactRef, Build, JobServer};
use crate::junit::{self, TestSuiteResult};
use crate::rating::BuildRating;
use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicU64, Ordering};
use futures_util::future::join_all;
use ohno::{EnrichableExt, app_err};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};

const LOG_TARGET: &str = "     fetch";

/// Capacity of the channel between job tasks and the collector.
const OUTCOME_CHANNEL_CAPACITY: usize = 64;

/// Drives the per-job fetch pipeline against a job server.
///
/// Every selected job runs in its own task; a semaphore bounds how many run at once. Tasks report a
/// [`JobOutcome`] over a channel that a single collector drains into a [`FetchSummary`].
pub struct Orchestrator<S> {
    server: Arc<S>,
    settings: Arc<FetchSettings>,
    progress: Arc<dyn Progress>,
}

impl<S: Debug> Debug for Orchestrator<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("server", &self.server)
            .field("settings", &self.settings)
            .field("progress", &"<dyn Progress>")
            .finish()
    }
}

impl<S: JobServer + 'static> Orchestrator<S> {
    pub fn new(server: S, settings: FetchSettings, progress: impl Progress + 'static) -> Self {
        Self {
            server: Arc::new(server),
            settings: Arc::new(settings),
            progress: Arc::new(progress),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// List the jobs of the server that match the job filter.
    pub async fn enumerate(&self) -> Result<Vec<String>> {
        let all_jobs = self.server.list_jobs().await.map_err(|e| e.enrich("listing jobs"))?;
        log::info!(target: LOG_TARGET, "Fetched {} jobs", all_jobs.len());

        for pattern in self.settings.job_filter.patterns() {
            log::debug!(target: LOG_TARGET, "Filtering for jobs matching '{pattern}'");
        }

        let jobs = self.settings.job_filter.apply(all_jobs);
        log::info!(target: LOG_TARGET, "{} jobs left after filtering", jobs.len());
        Ok(jobs)
    }

    /// Enumerate the matching jobs and fetch all of them.
    ///
    /// Only a failure to list the jobs is an error; failures of individual jobs end up in the summary.
    pub async fn run(&self) -> Result<FetchSummary> {
        self.progress.set_phase("Listing");
        self.progress.set_indeterminate(Box::new(|| "retrieving job list".to_string()));

        let jobs = match self.enumerate().await {
            Ok(jobs) => jobs,
            Err(e) => {
                self.progress.done();
                return Err(e);
            }
        };

        let summary = self.fetch_all(jobs).await;
        self.progress.done();
        Ok(summary)
    }

    /// Fetch the given jobs concurrently and collect their outcomes.
    pub async fn fetch_all(&self, jobs: Vec<String>) -> FetchSummary {
        let total = jobs.len() as u64;
        let finished = Arc::new(AtomicU64::new(0));

        self.progress.set_phase("Fetching");
        self.progress.set_determinate(Box::new({
            let finished = Arc::clone(&finished);
            move || {
                let current = finished.load(Ordering::Relaxed);
                (total, current, format!("{current}/{total} jobs"))
            }
        }));

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_jobs.max(1)));
        let (tx, mut rx) = mpsc::channel::<JobOutcome>(OUTCOME_CHANNEL_CAPACITY);

        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let server = Arc::clone(&self.server);
                let settings = Arc::clone(&self.settings);
                let semaphore = Arc::clone(&semaphore);
                let tx = tx.clone();

                let handle = tokio::spawn({
                    let job = job.clone();
                    async move {
                        let _permit = semaphore.acquire_owned().await;
                        let outcome = run_job(server.as_ref(), &settings, job).await;
                        _ = tx.send(outcome).await;
                    }
                });

                (job, handle)
            })
            .collect();

        // only the tasks hold senders now, so the channel closes once the last task is done
        drop(tx);

        let mut summary = FetchSummary::default();
        while let Some(outcome) = rx.recv().await {
            _ = finished.fetch_add(1, Ordering::Relaxed);
            summary.add(outcome);
        }

        for (job, handle) in handles {
            if let Err(e) = handle.await {
                log::error!(target: LOG_TARGET, "Task for job '{job}' did not finish: {e}");
                summary.add(JobOutcome::Failed(JobFailure {
                    job,
                    error: Arc::new(app_err!("job task did not finish: {e}")),
                }));
            }
        }

        summary.sort();
        log::info!(
            target: LOG_TARGET,
            "Fetched {} jobs, {} failed",
            summary.reports.len() + summary.failed_jobs.len(),
            summary.failed_jobs.len()
        );

        summary
    }
}

async fn run_job<S: JobServer>(server: &S, settings: &FetchSettings, job: String) -> JobOutcome {
    match fetch_job(server, settings, &job).await {
        Ok(report) => JobOutcome::Completed(report),
        Err(e) => {
            let e = e.enrich_with(|| format!("fetching job '{job}'"));
            log::error!(target: LOG_TARGET, "{e:#}");
            JobOutcome::Failed(JobFailure { job, error: Arc::new(e) })
        }
    }
}

/// Rate, filter, download, parse and merge the builds of one job.
pub async fn fetch_job<S: JobServer>(server: &S, settings: &FetchSettings, job: &str) -> Result<JobReport> {
    log::debug!(target: LOG_TARGET, "Fetching builds of job '{job}'");
    let builds = server
        .list_builds(job, settings.earliest_start())
        .await
        .map_err(|e| e.enrich_with(|| format!("listing builds of job '{job}'")))?;

    let rating = rate_builds(job, &builds, settings);
    if !rating.enabled {
        log::debug!(target: LOG_TARGET, "Rating disabled for job '{job}'");
    }

    let mut exclusions = Vec::new();
    let mut candidates = Vec::new();
    for build in builds.iter().filter(|build| settings.report_window.contains(build.completed_at)) {
        if let Some(record) = rating.exclusion(build.number) {
            log::warn!(
                target: LOG_TARGET,
                "Skipping build {} of job '{job}' due to {:.2} sigma rating, {} failures",
                record.build_number,
                record.sigma,
                record.failures
            );
            exclusions.push(record);
        } else {
            candidates.push(build);
        }
    }

    let artifacts: Vec<&ArtifactRef> = candidates
        .iter()
        .copied()
        .flat_map(|build| &build.artifacts)
        .filter(|artifact| settings.artifact_pattern.is_match(&artifact.file_name))
        .collect();
    log::debug!(
        target: LOG_TARGET,
        "Downloading {} artifacts of {} builds of job '{job}'",
        artifacts.len(),
        candidates.len()
    );

    let downloads = join_all(artifacts.iter().map(|&artifact| async move { (artifact, server.fetch_artifact(artifact).await) })).await;

    let mut suites: BTreeMap<u64, Vec<TestSuiteResult>> = BTreeMap::new();
    let mut artifact_failures = Vec::new();
    for (artifact, download) in downloads {
        let data = download.map_err(|e| {
            e.enrich_with(|| format!("downloading '{}' of build {}", artifact.relative_path, artifact.build_number))
        })?;

        match junit::parse(&data) {
            Ok(suite) => suites.entry(artifact.build_number).or_default().push(suite),
            Err(e) => {
                log::warn!(
                    target: LOG_TARGET,
                    "Could not parse '{}' of build {} of job '{job}': {e:#}",
                    artifact.file_name,
                    artifact.build_number
                );
                artifact_failures.push(ArtifactFailure {
                    job: job.to_string(),
                    build_number: artifact.build_number,
                    file_name: artifact.file_name.clone(),
                    reason: format!("{e:#}"),
                });
            }
        }
    }

    let mut results = Vec::with_capacity(suites.len());
    let mut conflicts = BTreeMap::new();
    for (build_number, build_suites) in suites {
        let (merged, build_conflicts) = junit::merge(&build_suites);
        if !build_conflicts.is_empty() {
            log::debug!(
                target: LOG_TARGET,
                "Build {build_number} of job '{job}' has {} test cases with conflicting outcomes",
                build_conflicts.len()
            );
            _ = conflicts.insert(build_number, build_conflicts);
        }

        results.push(JobResult {
            job: job.to_string(),
            build_number,
            build_url: candidates
                .iter()
                .find(|build| build.number == build_number)
                .and_then(|build| build.url.clone()),
            result: merged,
        });
    }

    log::info!(
        target: LOG_TARGET,
        "Job '{job}': {} builds reported, {} excluded, {} unparsable artifacts",
        results.len(),
        exclusions.len(),
        artifact_failures.len()
    );

    Ok(JobReport {
        job: job.to_string(),
        rating,
        results,
        exclusions,
        artifact_failures,
        conflicts,
    })
}

fn rate_builds(job: &str, builds: &[Build], settings: &FetchSettings) -> BuildRating {
    let failures = builds
        .iter()
        .filter(|build| settings.rating_window.contains(build.completed_at))
        .filter_map(|build| build.failure_count.map(|count| (build.number, count)));

    BuildRating::new(job, failures, settings.rating)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{JobFilter, NoProgress, TimeWindow};
    use crate::junit::TestOutcome;
    use crate::rating::RatingSettings;
    use bytes::Bytes;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use core::sync::atomic::AtomicUsize;
    use core::time::Duration;
    use regex::Regex;
    use std::collections::{HashMap, HashSet};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn settings(jobs: &[&str], report_days: i64) -> FetchSettings {
        FetchSettings {
            job_filter: JobFilter::new(jobs.iter().map(|job| format!("^{job}$"))).unwrap(),
            artifact_pattern: Regex::new(r"^junit.*\.xml$").unwrap(),
            report_window: TimeWindow::new(now() - TimeDelta::days(report_days), now()),
            rating_window: TimeWindow::new(now() - TimeDelta::days(14), now()),
            rating: RatingSettings::default(),
            max_concurrent_jobs: 10,
        }
    }

    fn junit_xml(cases: &[(&str, TestOutcome)]) -> Vec<u8> {
        let mut xml = String::from(r#"<testsuite name="functest">"#);
        for (name, outcome) in cases {
            let body = match outcome {
                TestOutcome::Passed => "",
                TestOutcome::Failed => "<failure>boom</failure>",
                TestOutcome::Errored => "<error>boom</error>",
                TestOutcome::Skipped => "<skipped/>",
            };
            xml.push_str(&format!(r#"<testcase name="{name}">{body}</testcase>"#));
        }
        xml.push_str("</testsuite>");
        xml.into_bytes()
    }

    #[derive(Debug, Default)]
    struct FakeServer {
        jobs: Vec<String>,
        builds: HashMap<String, Vec<Build>>,
        artifacts: HashMap<(String, u64, String), Vec<u8>>,
        broken_jobs: HashSet<String>,
        delay: Option<Duration>,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl FakeServer {
        fn add_build(&mut self, job: &str, number: u64, age: TimeDelta, failures: Option<u64>, artifacts: Vec<(&str, Vec<u8>)>) {
            if !self.jobs.iter().any(|j| j == job) {
                self.jobs.push(job.to_string());
            }

            let refs = artifacts
                .into_iter()
                .map(|(file_name, data)| {
                    let relative_path = format!("exported-artifacts/{file_name}");
                    _ = self.artifacts.insert((job.to_string(), number, relative_path.clone()), data);
                    ArtifactRef {
                        job: job.to_string(),
                        build_number: number,
                        file_name: file_name.to_string(),
                        relative_path,
                    }
                })
                .collect();

            self.builds.entry(job.to_string()).or_default().push(Build {
                job: job.to_string(),
                number,
                completed_at: now() - age,
                url: Some(format!("https://jenkins.example.com/job/{job}/{number}/")),
                failure_count: failures,
                artifacts: refs,
            });
        }
    }

    impl JobServer for FakeServer {
        async fn list_jobs(&self) -> Result<Vec<String>> {
            Ok(self.jobs.clone())
        }

        async fn list_builds(&self, job: &str, since: DateTime<Utc>) -> Result<Vec<Build>> {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            _ = self.max_active.fetch_max(active, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            _ = self.active.fetch_sub(1, Ordering::SeqCst);

            if self.broken_jobs.contains(job) {
                return Err(app_err!("503 Service Unavailable"));
            }

            Ok(self
                .builds
                .get(job)
                .map(|builds| builds.iter().filter(|b| b.completed_at >= since).cloned().collect())
                .unwrap_or_default())
        }

        async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Bytes> {
            self.artifacts
                .get(&(artifact.job.clone(), artifact.build_number, artifact.relative_path.clone()))
                .map(|data| Bytes::from(data.clone()))
                .ok_or_else(|| app_err!("404 Not Found"))
        }
    }

    fn passing_artifact() -> Vec<(&'static str, Vec<u8>)> {
        vec![("junit.functest.xml", junit_xml(&[("T1", TestOutcome::Passed)]))]
    }

    #[tokio::test]
    async fn test_stable_job_keeps_new_build() {
        let mut server = FakeServer::default();
        for (number, age) in (101..=105).zip([10, 9, 8, 7, 6]) {
            server.add_build("test-foo", number, TimeDelta::days(age), Some(1), passing_artifact());
        }
        server.add_build("test-foo", 106, TimeDelta::hours(2), Some(1), passing_artifact());

        let report = fetch_job(&server, &settings(&["test-foo"], 1), "test-foo").await.unwrap();

        assert!(!report.rating.enabled);
        assert!(report.exclusions.is_empty());
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].build_number, 106);
        assert_eq!(report.results[0].build_url.as_deref(), Some("https://jenkins.example.com/job/test-foo/106/"));
        assert_eq!(report.results[0].result.effective_outcome("T1"), Some(TestOutcome::Passed));
    }

    #[tokio::test]
    async fn test_noisy_build_is_excluded() {
        let mut server = FakeServer::default();
        for ((number, failures), age) in [(201, 0), (202, 0), (203, 0), (204, 0), (205, 20)].into_iter().zip([5, 4, 3, 2, 1]) {
            server.add_build("test-bar", number, TimeDelta::days(age), Some(failures), passing_artifact());
        }

        let report = fetch_job(&server, &settings(&["test-bar"], 14), "test-bar").await.unwrap();

        assert!(report.rating.enabled);
        assert_eq!(report.exclusions.len(), 1);
        let exclusion = &report.exclusions[0];
        assert_eq!(exclusion.job, "test-bar");
        assert_eq!(exclusion.build_number, 205);
        assert_eq!(exclusion.failures, 20);
        assert!((exclusion.sigma - 2.0).abs() < 1e-9);

        let reported: Vec<_> = report.results.iter().map(|r| r.build_number).collect();
        assert_eq!(reported, vec![201, 202, 203, 204]);
    }

    #[tokio::test]
    async fn test_shards_merge_into_one_result() {
        let mut server = FakeServer::default();
        server.add_build(
            "test-shards",
            7,
            TimeDelta::hours(1),
            Some(1),
            vec![
                ("junit-shard1.xml", junit_xml(&[("T1", TestOutcome::Passed)])),
                ("junit-shard2.xml", junit_xml(&[("T2", TestOutcome::Failed)])),
                ("build-log.txt", b"not fetched".to_vec()),
            ],
        );

        let report = fetch_job(&server, &settings(&["test-shards"], 1), "test-shards").await.unwrap();

        assert_eq!(report.results.len(), 1);
        let merged = &report.results[0].result;
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.effective_outcome("T1"), Some(TestOutcome::Passed));
        assert_eq!(merged.effective_outcome("T2"), Some(TestOutcome::Failed));
        assert!(report.conflicts.is_empty());
    }

    #[tokio::test]
    async fn test_conflicting_shards_are_recorded() {
        let mut server = FakeServer::default();
        server.add_build(
            "test-rerun",
            3,
            TimeDelta::hours(1),
            Some(1),
            vec![
                ("junit.1.xml", junit_xml(&[("T1", TestOutcome::Failed)])),
                ("junit.2.xml", junit_xml(&[("T1", TestOutcome::Passed)])),
            ],
        );

        let report = fetch_job(&server, &settings(&["test-rerun"], 1), "test-rerun").await.unwrap();

        assert_eq!(report.results[0].result.effective_outcome("T1"), Some(TestOutcome::Failed));
        assert_eq!(report.conflicts.get(&3).map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_unparsable_artifact_is_recorded() {
        let mut server = FakeServer::default();
        server.add_build(
            "test-partial",
            9,
            TimeDelta::hours(1),
            Some(0),
            vec![
                ("junit.1.xml", junit_xml(&[("T1", TestOutcome::Passed)])),
                ("junit.2.xml", b"<html>proxy error</html>".to_vec()),
            ],
        );

        let report = fetch_job(&server, &settings(&["test-partial"], 1), "test-partial").await.unwrap();

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].result.effective_outcome("T1"), Some(TestOutcome::Passed));
        assert_eq!(report.artifact_failures.len(), 1);
        assert_eq!(report.artifact_failures[0].file_name, "junit.2.xml");
        assert_eq!(report.artifact_failures[0].build_number, 9);
    }

    #[tokio::test]
    async fn test_truncated_shard_is_recorded() {
        let mut truncated = junit_xml(&[("T2", TestOutcome::Passed), ("T3", TestOutcome::Failed)]);
        truncated.truncate(truncated.len() - "</testcase></testsuite>".len());

        let mut server = FakeServer::default();
        server.add_build(
            "test-aborted",
            4,
            TimeDelta::hours(1),
            Some(1),
            vec![
                ("junit.1.xml", junit_xml(&[("T1", TestOutcome::Passed)])),
                ("junit.2.xml", truncated),
            ],
        );

        let report = fetch_job(&server, &settings(&["test-aborted"], 1), "test-aborted").await.unwrap();

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].result.effective_outcome("T1"), Some(TestOutcome::Passed));
        assert_eq!(report.results[0].result.effective_outcome("T2"), None);
        assert_eq!(report.artifact_failures.len(), 1);
        assert_eq!(report.artifact_failures[0].file_name, "junit.2.xml");
        assert!(report.artifact_failures[0].reason.contains("truncated"));
    }

    #[tokio::test]
    async fn test_build_without_artifacts_is_dropped() {
        let mut server = FakeServer::default();
        server.add_build("test-empty", 1, TimeDelta::hours(1), Some(0), vec![("console.log", b"log".to_vec())]);

        let report = fetch_job(&server, &settings(&["test-empty"], 1), "test-empty").await.unwrap();

        assert!(report.results.is_empty());
        assert!(report.artifact_failures.is_empty());
    }

    #[tokio::test]
    async fn test_old_builds_only_feed_the_rating() {
        let mut server = FakeServer::default();
        server.add_build("test-old", 1, TimeDelta::days(7), Some(0), passing_artifact());
        server.add_build("test-old", 2, TimeDelta::hours(1), Some(0), passing_artifact());

        let report = fetch_job(&server, &settings(&["test-old"], 1), "test-old").await.unwrap();

        assert_eq!(report.rating.builds().count(), 2);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].build_number, 2);
    }

    #[tokio::test]
    async fn test_missing_artifact_fails_the_job() {
        let mut server = FakeServer::default();
        server.add_build("test-gone", 1, TimeDelta::hours(1), Some(0), passing_artifact());
        server.artifacts.clear();

        let err = fetch_job(&server, &settings(&["test-gone"], 1), "test-gone").await.unwrap_err();
        assert!(format!("{err:#}").contains("404"));
    }

    #[tokio::test]
    async fn test_failing_job_does_not_stop_others() {
        let mut server = FakeServer::default();
        server.add_build("test-a", 1, TimeDelta::hours(1), Some(0), passing_artifact());
        server.add_build("test-b", 1, TimeDelta::hours(1), Some(0), passing_artifact());
        server.add_build("test-broken", 1, TimeDelta::hours(1), Some(0), passing_artifact());
        server.add_build("unrelated", 1, TimeDelta::hours(1), Some(0), passing_artifact());
        _ = server.broken_jobs.insert("test-broken".into());

        let orchestrator = Orchestrator::new(server, settings(&["test-.*"], 1), NoProgress);
        let summary = orchestrator.run().await.unwrap();

        let completed: Vec<_> = summary.reports.iter().map(|r| r.job.as_str()).collect();
        assert_eq!(completed, vec!["test-a", "test-b"]);
        assert_eq!(summary.failed_jobs.len(), 1);
        assert_eq!(summary.failed_jobs[0].job, "test-broken");
        assert!(format!("{:#}", summary.failed_jobs[0].error).contains("503"));
        assert_eq!(summary.job_results().count(), 2);
    }

    #[tokio::test]
    async fn test_worker_pool_is_bounded() {
        let mut server = FakeServer {
            delay: Some(Duration::from_millis(20)),
            ..FakeServer::default()
        };
        for i in 0..8 {
            server.add_build(&format!("test-{i}"), 1, TimeDelta::hours(1), Some(0), passing_artifact());
        }

        let mut settings = settings(&["test-.*"], 1);
        settings.max_concurrent_jobs = 2;

        let orchestrator = Orchestrator::new(server, settings, NoProgress);
        let summary = orchestrator.run().await.unwrap();

        assert_eq!(summary.reports.len(), 8);
        assert!(orchestrator.server.max_active.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_no_matching_jobs() {
        let mut server = FakeServer::default();
        server.add_build("deploy", 1, TimeDelta::hours(1), Some(0), passing_artifact());

        let orchestrator = Orchestrator::new(server, settings(&["test-.*"], 1), NoProgress);
        let summary = orchestrator.run().await.unwrap();

        assert!(summary.reports.is_empty());
        assert!(summary.is_complete());
    }
}
