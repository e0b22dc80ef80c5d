use super::Host;
use super::ProgressReporter;
use super::common::{ColorMode, LogLevel, init_logging};
use super::config::Config;
use crate::Result;
use crate::fetch::{FetchSettings, FetchSummary, JobFilter, Orchestrator, TimeWindow};
use crate::jenkins::{ClientSettings, JenkinsClient};
use crate::reports::{Report, generate_console, generate_html, generate_json};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use clap::Parser;
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use regex::Regex;
use std::fs;
use std::io::{Write, stderr, stdout};
use url::Url;

const LOG_TARGET: &str = "  commands";

const USAGE_HINT: &str = "Patterns use the syntax of the `regex` crate. Pass --job-name-pattern one or more times, \
or set job_name_patterns in the configuration file. Run `flake-report jenkins --help` for details.";

#[derive(Parser, Debug)]
pub struct JenkinsArgs {
    /// Base URL of the Jenkins server
    #[arg(long, value_name = "URL")]
    pub endpoint: Url,

    /// Regex selecting the jobs to analyze (repeatable, a job matching any pattern is selected)
    #[arg(long = "job-name-pattern", value_name = "REGEX")]
    pub job_name_patterns: Vec<String>,

    /// Regex selecting the build artifacts that hold JUnit results
    #[arg(long, value_name = "REGEX")]
    pub artifact_file_name_pattern: Option<String>,

    /// Report builds that completed within this period, e.g. `14d`
    #[arg(long, value_name = "DURATION")]
    pub start_from: Option<humantime::Duration>,

    /// Rate builds that completed within this period, e.g. `14d`
    #[arg(long, value_name = "DURATION")]
    pub start_from_for_ratings: Option<humantime::Duration>,

    /// Exclude builds whose failure count lies more than this many standard deviations from the mean
    #[arg(long, value_name = "SIGMA")]
    pub sigma_threshold: Option<f64>,

    /// Maximum number of concurrent requests to the Jenkins server
    #[arg(long, value_name = "N", default_value_t = ClientSettings::DEFAULT_MAX_CONNS_PER_HOST)]
    pub max_conns_per_host: usize,

    /// Maximum number of jobs fetched at the same time
    #[arg(long, value_name = "N", default_value_t = FetchSettings::DEFAULT_MAX_CONCURRENT_JOBS)]
    pub max_concurrent_jobs: usize,

    /// Accept invalid TLS certificates from the Jenkins server
    #[arg(long)]
    pub insecure_skip_verify: bool,

    /// Path to configuration file (default is `flake-report.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Title shown at the top of the reports
    #[arg(long, value_name = "TEXT", default_value = "Flaky test report")]
    pub title: String,

    /// Output the report to an HTML file
    #[arg(long, value_name = "PATH", help_heading = "Report Output")]
    pub html: Option<Utf8PathBuf>,

    /// Output the report to a JSON file
    #[arg(long, value_name = "PATH", help_heading = "Report Output")]
    pub json: Option<Utf8PathBuf>,

    /// Output the report to the console. If omitted, console output is shown only when no other reports are generated.
    #[arg(long, help_heading = "Report Output")]
    pub console: bool,

    /// Exit with an error instead of reporting when any job could not be fetched
    #[arg(long)]
    pub strict: bool,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    pub log_level: LogLevel,
}

/// Fetch, rate, and report the selected Jenkins jobs.
pub async fn process_jenkins<H: Host>(host: &mut H, args: &JenkinsArgs) -> Result<()> {
    init_logging(args.log_level);

    let settings = match Config::load(Utf8Path::new("."), args.config.as_ref())
        .and_then(|config| resolve_settings(args, &config, Utc::now()))
    {
        Ok(settings) => settings,
        Err(e) => {
            let _ = writeln!(host.error(), "❌ {e:#}\n\n{USAGE_HINT}");
            host.exit(2);
            return Err(e);
        }
    };

    let client = JenkinsClient::new(
        &args.endpoint,
        ClientSettings {
            max_conns_per_host: args.max_conns_per_host,
            insecure_skip_verify: args.insecure_skip_verify,
        },
    )?;
    let endpoint = client.base_url().to_string();
    let report_window = settings.report_window;

    let delay = if args.log_level == LogLevel::None {
        Duration::from_millis(300)
    } else {
        Duration::from_secs(365 * 24 * 60 * 60)
    };
    let progress = ProgressReporter::new(delay, args.color.use_colors(&stderr()));

    let summary = Orchestrator::new(client, settings, progress).run().await?;

    report_failed_jobs(host, &summary);
    if args.strict && !summary.is_complete() {
        return Err(app_err!(
            "{} of {} jobs could not be fetched",
            summary.failed_jobs.len(),
            summary.failed_jobs.len() + summary.reports.len()
        ));
    }

    let report = Report::new(args.title.as_str(), endpoint, Utc::now(), &summary, report_window);
    write_reports(host, args, &report)
}

/// Merge the command line over the configuration file and compile every pattern.
///
/// Runs before any network access so that a bad pattern never costs a request.
pub fn resolve_settings(args: &JenkinsArgs, config: &Config, now: DateTime<Utc>) -> Result<FetchSettings> {
    let job_patterns = if args.job_name_patterns.is_empty() {
        &config.job_name_patterns
    } else {
        &args.job_name_patterns
    };

    if job_patterns.is_empty() {
        return Err(app_err!("no job name patterns given"));
    }

    let job_filter = JobFilter::new(job_patterns)?;

    let artifact_pattern = args.artifact_file_name_pattern.as_ref().unwrap_or(&config.artifact_file_name_pattern);
    let artifact_pattern =
        Regex::new(artifact_pattern).into_app_err_with(|| format!("invalid artifact file name pattern '{artifact_pattern}'"))?;

    let mut rating = config.rating_settings();
    if let Some(sigma_threshold) = args.sigma_threshold {
        if !(sigma_threshold.is_finite() && sigma_threshold > 0.0) {
            return Err(app_err!("--sigma-threshold must be a positive number, got {sigma_threshold}"));
        }
        rating.sigma_threshold = sigma_threshold;
    }

    if args.max_concurrent_jobs == 0 {
        return Err(app_err!("--max-concurrent-jobs must be at least 1"));
    }

    if args.max_conns_per_host == 0 {
        return Err(app_err!("--max-conns-per-host must be at least 1"));
    }

    let report_window = args.start_from.map_or(config.report_window, Into::into);
    let rating_window = args.start_from_for_ratings.map_or(config.rating_window, Into::into);

    Ok(FetchSettings {
        job_filter,
        artifact_pattern,
        report_window: TimeWindow::ending_at(now, report_window)?,
        rating_window: TimeWindow::ending_at(now, rating_window)?,
        rating,
        max_concurrent_jobs: args.max_concurrent_jobs,
    })
}

fn report_failed_jobs<H: Host>(host: &mut H, summary: &FetchSummary) {
    if summary.is_complete() {
        return;
    }

    let _ = writeln!(host.error(), "\nUnable to fetch {} job(s)", summary.failed_jobs.len());
    for failure in &summary.failed_jobs {
        log::warn!(target: LOG_TARGET, "Job '{}' is missing from the report: {:#}", failure.job, failure.error);
        let _ = writeln!(host.error(), "  {}: {:#}", failure.job, failure.error);
    }
}

fn write_reports<H: Host>(host: &mut H, args: &JenkinsArgs, report: &Report) -> Result<()> {
    if let Some(filename) = &args.html {
        let mut html = String::new();
        generate_html(report, &mut html)?;
        fs::write(filename, html).into_app_err_with(|| format!("writing HTML report to '{filename}'"))?;
        log::info!(target: LOG_TARGET, "Wrote HTML report to '{filename}'");
    }

    if let Some(filename) = &args.json {
        let mut json = String::new();
        generate_json(report, &mut json)?;
        fs::write(filename, json).into_app_err_with(|| format!("writing JSON report to '{filename}'"))?;
        log::info!(target: LOG_TARGET, "Wrote JSON report to '{filename}'");
    }

    if args.console || (args.html.is_none() && args.json.is_none()) {
        let mut console = String::new();
        generate_console(report, args.color.use_colors(&stdout()), &mut console)?;
        let _ = write!(host.output(), "{console}");
    }

    Ok(())
}
