use super::{Report, Severity};
use crate::Result;
use crate::junit::TestOutcome;
use core::fmt::Write;
use owo_colors::OwoColorize;

/// Most failing tests listed before the list is cut off.
const MAX_FAILING_TESTS: usize = 25;

pub fn generate<W: Write>(report: &Report, use_colors: bool, writer: &mut W) -> Result<()> {
    let data = &report.data;

    if use_colors {
        writeln!(writer, "{}", report.title.bold())?;
    } else {
        writeln!(writer, "{}", report.title)?;
    }
    writeln!(writer, "{}", data.window)?;
    writeln!(writer)?;

    let flaky_count = data.flaky_tests().count();
    writeln!(
        writer,
        "{} jobs, {} tests, {flaky_count} flaky, {} builds excluded, {} jobs failed",
        data.jobs.len(),
        data.data.len(),
        report.exclusions.len(),
        report.failed_jobs.len()
    )?;
    if report.conflicting_builds > 0 {
        writeln!(
            writer,
            "{} builds recorded the same test with different outcomes in separate artifacts",
            report.conflicting_builds
        )?;
    }

    let failing = data.failing_tests();
    if !failing.is_empty() {
        writeln!(writer)?;
        heading(writer, "Failing tests", use_colors)?;

        let job_width = failing.iter().map(|(_, job, _)| job.len()).max().unwrap_or(0);
        for (test, job, details) in failing.iter().take(MAX_FAILING_TESTS) {
            let history: String = details.builds.iter().map(|build| outcome_symbol(build.outcome)).collect();
            writeln!(
                writer,
                "  {}  {job:<job_width$}  {:>3}/{:<3} {history}  {test}",
                severity_label(details.severity, use_colors),
                details.failures(),
                details.succeeded + details.failures(),
            )?;
        }

        if failing.len() > MAX_FAILING_TESTS {
            writeln!(writer, "  ... and {} more", failing.len() - MAX_FAILING_TESTS)?;
        }
    }

    if !report.exclusions.is_empty() {
        writeln!(writer)?;
        heading(writer, "Excluded builds", use_colors)?;
        for exclusion in &report.exclusions {
            writeln!(
                writer,
                "  {} #{}: {} failures, {:.2} sigma",
                exclusion.job, exclusion.build_number, exclusion.failures, exclusion.sigma
            )?;
        }
    }

    if !report.failed_jobs.is_empty() {
        writeln!(writer)?;
        heading(writer, "Failed jobs", use_colors)?;
        for failed in &report.failed_jobs {
            if use_colors {
                writeln!(writer, "  {}: {}", failed.job.red(), failed.error)?;
            } else {
                writeln!(writer, "  {}: {}", failed.job, failed.error)?;
            }
        }
    }

    if !report.artifact_failures.is_empty() {
        writeln!(writer)?;
        heading(writer, "Unparsable artifacts", use_colors)?;
        for failure in &report.artifact_failures {
            writeln!(writer, "  {} #{} {}: {}", failure.job, failure.build_number, failure.file_name, failure.reason)?;
        }
    }

    Ok(())
}

fn heading<W: Write>(writer: &mut W, text: &str, use_colors: bool) -> Result<()> {
    if use_colors {
        writeln!(writer, "{}", text.bold())?;
    } else {
        writeln!(writer, "{text}")?;
    }
    Ok(())
}

fn severity_label(severity: Severity, use_colors: bool) -> String {
    let label = format!("{:<6}", severity.to_string().to_uppercase());
    if !use_colors {
        return label;
    }

    match severity {
        Severity::None => label.dimmed().to_string(),
        Severity::Low => label.green().bold().to_string(),
        Severity::Medium => label.yellow().bold().to_string(),
        Severity::High => label.red().bold().to_string(),
    }
}

const fn outcome_symbol(outcome: TestOutcome) -> char {
    match outcome {
        TestOutcome::Passed => '.',
        TestOutcome::Skipped => 's',
        TestOutcome::Errored => 'E',
        TestOutcome::Failed => 'F',
    }
}
