use super::{Report, Severity, TestDetails};
use crate::Result;
use crate::junit::TestOutcome;
use crate::rating::BuildRating;
use core::fmt::Write;

pub fn generate<W: Write>(report: &Report, writer: &mut W) -> Result<()> {
    let title = html_escape(&report.title);

    writeln!(writer, "<!DOCTYPE html>")?;
    writeln!(writer, "<html>")?;
    writeln!(writer, "<head>")?;
    writeln!(writer, "  <meta charset=\"UTF-8\">")?;
    writeln!(writer, "  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">")?;
    writeln!(writer, "  <title>{title}</title>")?;
    write_styles(writer)?;
    writeln!(writer, "</head>")?;
    writeln!(writer, "<body>")?;

    write_header(writer, report, &title)?;
    write_summary(writer, report)?;

    if !report.failed_jobs.is_empty() {
        write_failed_jobs(writer, report)?;
    }

    write_failing_tests(writer, report)?;
    write_ratings(writer, report)?;

    if !report.artifact_failures.is_empty() {
        write_artifact_failures(writer, report)?;
    }

    write_scripts(writer)?;
    writeln!(writer, "</body>")?;
    writeln!(writer, "</html>")?;

    Ok(())
}

fn write_styles<W: Write>(writer: &mut W) -> Result<()> {
    writeln!(writer, "  <style>")?;
    writeln!(writer, "    :root {{")?;
    writeln!(writer, "      --bg-color: #f0f2f5; --card-bg: #ffffff; --text-color: #1a202c; --text-secondary: #64748b;")?;
    writeln!(writer, "      --border-color: #e2e8f0; --hover-bg: #f8fafc; --accent-color: #3b82f6;")?;
    writeln!(writer, "      --shadow: 0 1px 3px rgba(0,0,0,0.08), 0 4px 16px rgba(0,0,0,0.04);")?;
    writeln!(writer, "    }}")?;
    writeln!(writer, "    @media (prefers-color-scheme: dark) {{")?;
    writeln!(writer, "      :root {{")?;
    writeln!(writer, "        --bg-color: #0f172a; --card-bg: #1e293b; --text-color: #e2e8f0; --text-secondary: #94a3b8;")?;
    writeln!(writer, "        --border-color: #334155; --hover-bg: #263044; --accent-color: #60a5fa;")?;
    writeln!(writer, "        --shadow: 0 1px 3px rgba(0,0,0,0.3), 0 4px 16px rgba(0,0,0,0.2);")?;
    writeln!(writer, "      }}")?;
    writeln!(writer, "    }}")?;
    writeln!(writer, "    body.dark-theme {{")?;
    writeln!(writer, "      --bg-color: #0f172a; --card-bg: #1e293b; --text-color: #e2e8f0; --text-secondary: #94a3b8;")?;
    writeln!(writer, "      --border-color: #334155; --hover-bg: #263044; --accent-color: #60a5fa;")?;
    writeln!(writer, "      color-scheme: dark;")?;
    writeln!(writer, "    }}")?;
    writeln!(writer, "    body.light-theme {{")?;
    writeln!(writer, "      --bg-color: #f0f2f5; --card-bg: #ffffff; --text-color: #1a202c; --text-secondary: #64748b;")?;
    writeln!(writer, "      --border-color: #e2e8f0; --hover-bg: #f8fafc; --accent-color: #3b82f6;")?;
    writeln!(writer, "      color-scheme: light;")?;
    writeln!(writer, "    }}")?;

    writeln!(writer, "    * {{ box-sizing: border-box; }}")?;
    writeln!(writer, "    body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif; margin: 0; padding: 32px; background: var(--bg-color); color: var(--text-color); line-height: 1.5; }}")?;

    writeln!(writer, "    .header {{ display: flex; align-items: center; gap: 16px; margin-bottom: 28px; }}")?;
    writeln!(writer, "    .header-content {{ flex: 1; }}")?;
    writeln!(writer, "    h1 {{ margin: 0 0 2px 0; font-size: 26px; font-weight: 700; letter-spacing: -0.5px; }}")?;
    writeln!(writer, "    h2 {{ font-size: 18px; margin: 32px 0 12px 0; }}")?;
    writeln!(writer, "    .subtitle {{ margin: 0; font-size: 13px; color: var(--text-secondary); }}")?;
    writeln!(writer, "    .theme-toggle {{ background: none; border: 2px solid var(--border-color); border-radius: 8px; width: 40px; height: 40px; cursor: pointer; }}")?;
    writeln!(writer, "    .theme-toggle svg {{ width: 18px; height: 18px; fill: var(--text-color); opacity: 0.7; }}")?;

    writeln!(writer, "    .summary {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(140px, 1fr)); gap: 12px; margin-bottom: 20px; }}")?;
    writeln!(writer, "    .summary-card {{ background: var(--card-bg); border-radius: 10px; padding: 16px 20px; box-shadow: var(--shadow); border: 1px solid var(--border-color); text-align: center; }}")?;
    writeln!(writer, "    .summary-card .label {{ font-size: 11px; text-transform: uppercase; letter-spacing: 0.8px; color: var(--text-secondary); font-weight: 600; margin-bottom: 4px; }}")?;
    writeln!(writer, "    .summary-card .value {{ font-size: 28px; font-weight: 700; color: var(--accent-color); }}")?;
    writeln!(writer, "    .summary-card.warn .value {{ color: #d97706; }}")?;
    writeln!(writer, "    .summary-card.bad .value {{ color: #dc2626; }}")?;

    writeln!(writer, "    .card {{ background: var(--card-bg); border-radius: 12px; box-shadow: var(--shadow); border: 1px solid var(--border-color); margin-bottom: 20px; overflow-x: auto; }}")?;
    writeln!(writer, "    table {{ border-collapse: collapse; width: 100%; }}")?;
    writeln!(writer, "    th {{ text-align: left; padding: 8px 16px; font-size: 11px; font-weight: 600; text-transform: uppercase; letter-spacing: 0.5px; color: var(--text-secondary); border-bottom: 2px solid var(--border-color); }}")?;
    writeln!(writer, "    td {{ padding: 6px 16px; font-size: 14px; border-bottom: 1px solid var(--border-color); vertical-align: top; }}")?;
    writeln!(writer, "    tr:last-child td {{ border-bottom: none; }}")?;
    writeln!(writer, "    tr:hover td {{ background: var(--hover-bg); }}")?;
    writeln!(writer, "    td.number {{ text-align: right; font-variant-numeric: tabular-nums; }}")?;

    writeln!(writer, "    .severity {{ display: inline-block; padding: 2px 10px; border-radius: 12px; font-size: 12px; font-weight: 700; text-transform: uppercase; }}")?;
    writeln!(writer, "    .severity.none {{ background: #f1f5f9; color: #64748b; }}")?;
    writeln!(writer, "    .severity.low {{ background: #dcfce7; color: #166534; }}")?;
    writeln!(writer, "    .severity.medium {{ background: #fed7aa; color: #9a3412; }}")?;
    writeln!(writer, "    .severity.high {{ background: #fee2e2; color: #991b1b; }}")?;

    writeln!(writer, "    .outcome {{ display: inline-block; width: 18px; height: 18px; margin: 1px; border-radius: 3px; text-align: center; font-size: 11px; line-height: 18px; color: #ffffff; }}")?;
    writeln!(writer, "    .outcome.passed {{ background: #16a34a; }}")?;
    writeln!(writer, "    .outcome.failed {{ background: #dc2626; }}")?;
    writeln!(writer, "    .outcome.errored {{ background: #9333ea; }}")?;
    writeln!(writer, "    .outcome.skipped {{ background: #94a3b8; }}")?;
    writeln!(writer, "    .outcome.conflict {{ outline: 2px solid #d97706; }}")?;
    writeln!(writer, "    tr.excluded td {{ color: #dc2626; }}")?;
    writeln!(writer, "    .na {{ color: var(--text-secondary); font-style: italic; font-size: 13px; }}")?;
    writeln!(writer, "    a {{ color: var(--accent-color); text-decoration: none; }}")?;
    writeln!(writer, "    a:hover {{ text-decoration: underline; }}")?;
    writeln!(writer, "    @media (max-width: 640px) {{ body {{ padding: 16px; }} .summary {{ grid-template-columns: repeat(2, 1fr); }} }}")?;
    writeln!(writer, "  </style>")?;
    Ok(())
}

fn write_header<W: Write>(writer: &mut W, report: &Report, title: &str) -> Result<()> {
    writeln!(writer, "  <div class=\"header\">")?;
    writeln!(writer, "    <div class=\"header-content\">")?;
    writeln!(writer, "      <h1>{title}</h1>")?;
    writeln!(
        writer,
        "      <p class=\"subtitle\">Builds completed {} on <a href=\"{}\">{}</a></p>",
        report.data.window,
        html_escape(&report.endpoint),
        html_escape(&report.endpoint)
    )?;
    writeln!(
        writer,
        "      <p class=\"subtitle\">Produced by flake-report {} on {}</p>",
        env!("CARGO_PKG_VERSION"),
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    )?;
    writeln!(writer, "    </div>")?;
    writeln!(writer, "    <button class=\"theme-toggle\" onclick=\"toggleTheme()\" aria-label=\"Toggle theme\">")?;
    writeln!(writer, "      <svg id=\"theme-icon\" viewBox=\"0 0 24 24\"><path d=\"M21 12.79A9 9 0 1 1 11.21 3 7 7 0 0 0 21 12.79z\"/></svg>")?;
    writeln!(writer, "    </button>")?;
    writeln!(writer, "  </div>")?;
    Ok(())
}

fn write_summary<W: Write>(writer: &mut W, report: &Report) -> Result<()> {
    let builds: usize = report.data.failures_for_jobs.values().map(|failures| failures.builds.len()).sum();
    let failing = report.data.failing_tests().len();
    let flaky = report.data.flaky_tests().count();

    writeln!(writer, "  <div class=\"summary\">")?;
    write_summary_card(writer, "", "Jobs", report.data.jobs.len())?;
    write_summary_card(writer, "", "Builds", builds)?;
    write_summary_card(writer, "", "Tests", report.data.data.len())?;
    write_summary_card(writer, "bad", "Failing", failing)?;
    write_summary_card(writer, "warn", "Flaky", flaky)?;
    write_summary_card(writer, "warn", "Excluded builds", report.exclusions.len())?;
    write_summary_card(writer, "warn", "Conflicting builds", report.conflicting_builds)?;
    write_summary_card(writer, "bad", "Failed jobs", report.failed_jobs.len())?;
    writeln!(writer, "  </div>")?;
    Ok(())
}

fn write_summary_card<W: Write>(writer: &mut W, class: &str, label: &str, value: usize) -> Result<()> {
    let class = if value > 0 && !class.is_empty() { format!(" {class}") } else { String::new() };
    writeln!(
        writer,
        "    <div class=\"summary-card{class}\"><div class=\"label\">{label}</div><div class=\"value\">{value}</div></div>"
    )?;
    Ok(())
}

fn write_failed_jobs<W: Write>(writer: &mut W, report: &Report) -> Result<()> {
    writeln!(writer, "  <h2>Failed jobs</h2>")?;
    writeln!(writer, "  <p class=\"subtitle\">These jobs could not be fetched and are missing from the report.</p>")?;
    writeln!(writer, "  <div class=\"card\">")?;
    writeln!(writer, "    <table>")?;
    writeln!(writer, "      <tr><th>Job</th><th>Error</th></tr>")?;
    for failed in &report.failed_jobs {
        writeln!(
            writer,
            "      <tr><td><a href=\"{}\">{}</a></td><td>{}</td></tr>",
            html_escape(&report.job_link(&failed.job)),
            html_escape(&failed.job),
            html_escape(&failed.error)
        )?;
    }
    writeln!(writer, "    </table>")?;
    writeln!(writer, "  </div>")?;
    Ok(())
}

fn write_failing_tests<W: Write>(writer: &mut W, report: &Report) -> Result<()> {
    writeln!(writer, "  <h2>Failing tests</h2>")?;

    let failing = report.data.failing_tests();
    if failing.is_empty() {
        writeln!(writer, "  <p class=\"na\">No test failed in the reported builds.</p>")?;
        return Ok(());
    }

    writeln!(writer, "  <div class=\"card\">")?;
    writeln!(writer, "    <table>")?;
    writeln!(
        writer,
        "      <tr><th>Severity</th><th>Test</th><th>Job</th><th>Failed</th><th>Passed</th><th>Skipped</th><th>Builds</th></tr>"
    )?;
    for (test, job, details) in failing {
        writeln!(writer, "      <tr>")?;
        writeln!(writer, "        <td>{}</td>", severity_badge(details.severity))?;
        writeln!(writer, "        <td>{}</td>", html_escape(test))?;
        writeln!(
            writer,
            "        <td><a href=\"{}\">{}</a></td>",
            html_escape(&report.job_link(job)),
            html_escape(job)
        )?;
        writeln!(writer, "        <td class=\"number\">{}</td>", details.failures())?;
        writeln!(writer, "        <td class=\"number\">{}</td>", details.succeeded)?;
        writeln!(writer, "        <td class=\"number\">{}</td>", details.skipped)?;
        write!(writer, "        <td>")?;
        write_build_history(writer, report, job, details)?;
        writeln!(writer, "</td>")?;
        writeln!(writer, "      </tr>")?;
    }
    writeln!(writer, "    </table>")?;
    writeln!(writer, "  </div>")?;
    Ok(())
}

fn write_build_history<W: Write>(writer: &mut W, report: &Report, job: &str, details: &TestDetails) -> Result<()> {
    for build in &details.builds {
        let conflict = if build.outcomes.len() > 1 { " conflict" } else { "" };
        let outcomes: Vec<String> = build.outcomes.iter().map(ToString::to_string).collect();
        write!(
            writer,
            "<a class=\"outcome {}{conflict}\" href=\"{}\" title=\"#{}: {}\">{}</a>",
            build.outcome,
            html_escape(&report.build_link(job, build.build_number, build.build_url.as_deref())),
            build.build_number,
            outcomes.join(", "),
            outcome_letter(build.outcome)
        )?;
    }
    Ok(())
}

fn write_ratings<W: Write>(writer: &mut W, report: &Report) -> Result<()> {
    writeln!(writer, "  <h2>Build ratings</h2>")?;
    writeln!(
        writer,
        "  <p class=\"subtitle\">Builds whose failure count lies more than the threshold number of standard deviations from the job's mean are excluded.</p>"
    )?;

    if report.ratings.is_empty() {
        writeln!(writer, "  <p class=\"na\">No jobs were rated.</p>")?;
        return Ok(());
    }

    writeln!(writer, "  <div class=\"card\">")?;
    writeln!(writer, "    <table>")?;
    writeln!(
        writer,
        "      <tr><th>Job</th><th>Builds</th><th>Mean</th><th>Std. dev.</th><th>Threshold</th><th>Excluded</th></tr>"
    )?;
    for rating in &report.ratings {
        write_rating_row(writer, report, rating)?;
    }
    writeln!(writer, "    </table>")?;
    writeln!(writer, "  </div>")?;
    Ok(())
}

fn write_rating_row<W: Write>(writer: &mut W, report: &Report, rating: &BuildRating) -> Result<()> {
    let excluded: Vec<_> = report.exclusions.iter().filter(|exclusion| exclusion.job == rating.name).collect();
    let class = if excluded.is_empty() { "" } else { " class=\"excluded\"" };

    writeln!(writer, "      <tr{class}>")?;
    writeln!(
        writer,
        "        <td><a href=\"{}\">{}</a></td>",
        html_escape(&report.job_link(&rating.name)),
        html_escape(&rating.name)
    )?;
    writeln!(writer, "        <td class=\"number\">{}</td>", rating.builds().count())?;

    if rating.enabled {
        writeln!(writer, "        <td class=\"number\">{:.2}</td>", rating.mean)?;
        writeln!(writer, "        <td class=\"number\">{:.2}</td>", rating.standard_deviation)?;
        writeln!(writer, "        <td class=\"number\">{:.2}</td>", rating.sigma_threshold)?;
    } else {
        writeln!(writer, "        <td class=\"number\">{:.2}</td>", rating.mean)?;
        writeln!(writer, "        <td colspan=\"2\" class=\"na\">rating disabled</td>")?;
    }

    write!(writer, "        <td>")?;
    if excluded.is_empty() {
        write!(writer, "<span class=\"na\">none</span>")?;
    }
    for (index, exclusion) in excluded.iter().enumerate() {
        if index > 0 {
            write!(writer, ", ")?;
        }
        write!(
            writer,
            "<a href=\"{}\">#{}</a> ({} failures, {:.2}&sigma;)",
            html_escape(&report.build_link(&exclusion.job, exclusion.build_number, None)),
            exclusion.build_number,
            exclusion.failures,
            exclusion.sigma
        )?;
    }
    writeln!(writer, "</td>")?;
    writeln!(writer, "      </tr>")?;
    Ok(())
}

fn write_artifact_failures<W: Write>(writer: &mut W, report: &Report) -> Result<()> {
    writeln!(writer, "  <h2>Unparsable artifacts</h2>")?;
    writeln!(writer, "  <div class=\"card\">")?;
    writeln!(writer, "    <table>")?;
    writeln!(writer, "      <tr><th>Job</th><th>Build</th><th>File</th><th>Reason</th></tr>")?;
    for failure in &report.artifact_failures {
        writeln!(
            writer,
            "      <tr><td>{}</td><td><a href=\"{}\">#{}</a></td><td>{}</td><td>{}</td></tr>",
            html_escape(&failure.job),
            html_escape(&report.build_link(&failure.job, failure.build_number, None)),
            failure.build_number,
            html_escape(&failure.file_name),
            html_escape(&failure.reason)
        )?;
    }
    writeln!(writer, "    </table>")?;
    writeln!(writer, "  </div>")?;
    Ok(())
}

fn write_scripts<W: Write>(writer: &mut W) -> Result<()> {
    writeln!(writer, "  <script>")?;
    writeln!(writer, "    function getSystemTheme() {{")?;
    writeln!(writer, "      return window.matchMedia('(prefers-color-scheme: dark)').matches ? 'dark' : 'light';")?;
    writeln!(writer, "    }}")?;
    writeln!(writer, "    function applyTheme(theme) {{")?;
    writeln!(writer, "      document.body.classList.remove('dark-theme', 'light-theme');")?;
    writeln!(writer, "      document.body.classList.add(theme + '-theme');")?;
    writeln!(writer, "    }}")?;
    writeln!(writer, "    function toggleTheme() {{")?;
    writeln!(writer, "      const currentTheme = localStorage.getItem('theme') || getSystemTheme();")?;
    writeln!(writer, "      const newTheme = currentTheme === 'dark' ? 'light' : 'dark';")?;
    writeln!(writer, "      localStorage.setItem('theme', newTheme);")?;
    writeln!(writer, "      applyTheme(newTheme);")?;
    writeln!(writer, "    }}")?;
    writeln!(writer, "    applyTheme(localStorage.getItem('theme') || getSystemTheme());")?;
    writeln!(writer, "  </script>")?;
    Ok(())
}

fn severity_badge(severity: Severity) -> String {
    format!("<span class=\"severity {severity}\">{severity}</span>")
}

const fn outcome_letter(outcome: TestOutcome) -> char {
    match outcome {
        TestOutcome::Passed => 'P',
        TestOutcome::Skipped => 'S',
        TestOutcome::Errored => 'E',
        TestOutcome::Failed => 'F',
    }
}

fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{ArtifactFailure, FetchSummary, JobFailure, JobOutcome, JobReport, JobResult, TimeWindow};
    use crate::junit::{self, TestCase, TestSuiteResult};
    use crate::rating::RatingSettings;
    use chrono::{TimeZone, Utc};
    use ohno::app_err;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 5, 18, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        )
    }

    fn job_result(build_number: u64, cases: Vec<TestCase>) -> JobResult {
        let suite = TestSuiteResult::new("s", cases);
        JobResult {
            job: "test-bar".into(),
            build_number,
            build_url: Some(format!("https://jenkins.example.com/job/test-bar/{build_number}/")),
            result: junit::merge([&suite]).0,
        }
    }

    fn summary() -> FetchSummary {
        let rating = BuildRating::new("test-bar", [(1, 0), (2, 0), (3, 0), (4, 0), (5, 20)], RatingSettings::default());
        let exclusion = rating.exclusion(5).unwrap();

        [
            JobOutcome::Completed(JobReport {
                job: "test-bar".into(),
                rating,
                results: vec![
                    job_result(1, vec![TestCase::new("[sig-compute] VM <starts>", TestOutcome::Passed)]),
                    job_result(2, vec![TestCase::new("[sig-compute] VM <starts>", TestOutcome::Failed)]),
                ],
                exclusions: vec![exclusion],
                artifact_failures: vec![ArtifactFailure {
                    job: "test-bar".into(),
                    build_number: 3,
                    file_name: "junit.xml".into(),
                    reason: "unexpected end of file".into(),
                }],
                conflicts: BTreeMap::new(),
            }),
            JobOutcome::Failed(JobFailure {
                job: "test-down".into(),
                error: Arc::new(app_err!("503 Service Unavailable")),
            }),
        ]
        .into_iter()
        .collect()
    }

    fn render(summary: &FetchSummary) -> String {
        let report = Report::new("Flakes <nightly>", "https://jenkins.example.com/", window().end, summary, window());
        let mut output = String::new();
        generate(&report, &mut output).unwrap();
        output
    }

    #[test]
    fn test_document_structure() {
        let output = render(&summary());
        assert!(output.starts_with("<!DOCTYPE html>"));
        assert!(output.trim_end().ends_with("</html>"));
        assert!(output.contains("<title>Flakes &lt;nightly&gt;</title>"));
        assert!(output.contains("2024-05-18 00:00 UTC to 2024-06-01 00:00 UTC"));
        assert!(output.contains("<div class=\"summary-card\"><div class=\"label\">Conflicting builds</div><div class=\"value\">0</div></div>"));
    }

    #[test]
    fn test_failing_tests_section() {
        let output = render(&summary());
        assert!(output.contains("[sig-compute] VM &lt;starts&gt;"));
        assert!(output.contains("<span class=\"severity high\">high</span>"));
        assert!(output.contains("href=\"https://jenkins.example.com/job/test-bar/2/\""));
        assert!(output.contains("class=\"outcome failed\""));
        assert!(output.contains("class=\"outcome passed\""));
    }

    #[test]
    fn test_ratings_and_exclusions() {
        let output = render(&summary());
        assert!(output.contains("Build ratings"));
        assert!(output.contains("<tr class=\"excluded\">"));
        assert!(output.contains("#5</a> (20 failures, 2.00&sigma;)"));
    }

    #[test]
    fn test_failed_jobs_and_artifacts() {
        let output = render(&summary());
        assert!(output.contains("Failed jobs</h2>"));
        assert!(output.contains("503 Service Unavailable"));
        assert!(output.contains("Unparsable artifacts"));
        assert!(output.contains("unexpected end of file"));
    }

    #[test]
    fn test_empty_report() {
        let output = render(&FetchSummary::default());
        assert!(output.contains("No test failed in the reported builds."));
        assert!(output.contains("No jobs were rated."));
        assert!(!output.contains("Failed jobs</h2>"));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&#39;");
    }
}
