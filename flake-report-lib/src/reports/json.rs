use super::Report;
use crate::Result;
use crate::rating::BuildRating;
use core::fmt::Write;
use serde_json::json;

pub fn generate<W: Write>(report: &Report, writer: &mut W) -> Result<()> {
    let output = json!({
        "title": report.title,
        "endpoint": report.endpoint,
        "generatedAt": report.generated_at.to_rfc3339(),
        "window": report.data.window,
        "jobs": report.data.jobs,
        "data": report.data.data,
        "failuresForJobs": report.data.failures_for_jobs,
        "ratings": report.ratings.iter().map(rating_to_json).collect::<Vec<_>>(),
        "exclusions": report.exclusions.iter().map(|exclusion| json!({
            "job": exclusion.job,
            "buildNumber": exclusion.build_number,
            "sigma": exclusion.sigma,
            "failures": exclusion.failures,
        })).collect::<Vec<_>>(),
        "failedJobs": report.failed_jobs.iter().map(|failed| json!({
            "job": failed.job,
            "error": failed.error,
        })).collect::<Vec<_>>(),
        "artifactFailures": report.artifact_failures.iter().map(|failure| json!({
            "job": failure.job,
            "buildNumber": failure.build_number,
            "fileName": failure.file_name,
            "reason": failure.reason,
        })).collect::<Vec<_>>(),
        "conflictingBuilds": report.conflicting_builds,
    });

    write!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
    Ok(())
}

fn rating_to_json(rating: &BuildRating) -> serde_json::Value {
    let builds: serde_json::Map<String, serde_json::Value> = rating
        .builds()
        .map(|(number, data)| {
            (
                number.to_string(),
                json!({
                    "failures": data.failures,
                    "sigma": data.sigma,
                    "excluded": rating.should_exclude(number),
                }),
            )
        })
        .collect();

    json!({
        "name": rating.name,
        "mean": rating.mean,
        "standardDeviation": rating.standard_deviation,
        "sigmaThreshold": rating.sigma_threshold,
        "enabled": rating.enabled,
        "builds": builds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{ArtifactFailure, FetchSummary, JobOutcome, JobReport, JobResult, TimeWindow};
    use crate::junit::{self, TestCase, TestOutcome, TestSuiteResult};
    use crate::rating::RatingSettings;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn report() -> Report {
        let window = TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 5, 18, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        );

        let rating = BuildRating::new("test-bar", [(1, 0), (2, 0), (3, 0), (4, 0), (5, 20)], RatingSettings::default());
        let exclusion = rating.exclusion(5).unwrap();

        let results = [(1, TestOutcome::Passed), (2, TestOutcome::Failed)]
            .into_iter()
            .map(|(build_number, outcome)| {
                let suite = TestSuiteResult::new("s", vec![TestCase::new("T1", outcome)]);
                JobResult {
                    job: "test-bar".into(),
                    build_number,
                    build_url: None,
                    result: junit::merge([&suite]).0,
                }
            })
            .collect();

        let summary: FetchSummary = [JobOutcome::Completed(JobReport {
            job: "test-bar".into(),
            rating,
            results,
            exclusions: vec![exclusion],
            artifact_failures: vec![ArtifactFailure {
                job: "test-bar".into(),
                build_number: 3,
                file_name: "junit.xml".into(),
                reason: "document contains no testsuite element".into(),
            }],
            conflicts: BTreeMap::new(),
        })]
        .into_iter()
        .collect();

        Report::new("Flakes", "https://jenkins.example.com/", window.end, &summary, window)
    }

    fn generate_value(report: &Report) -> serde_json::Value {
        let mut output = String::new();
        generate(report, &mut output).unwrap();
        serde_json::from_str(&output).unwrap()
    }

    #[test]
    fn test_top_level_keys() {
        let parsed = generate_value(&report());
        for key in ["data", "failuresForJobs", "ratings", "exclusions", "failedJobs", "artifactFailures"] {
            assert!(!parsed[key].is_null(), "missing key {key}");
        }
        assert_eq!(parsed["title"], "Flakes");
        assert_eq!(parsed["conflictingBuilds"], 0);
    }

    #[test]
    fn test_data_matrix() {
        let parsed = generate_value(&report());
        let details = &parsed["data"]["T1"]["test-bar"];
        assert_eq!(details["succeeded"], 1);
        assert_eq!(details["failed"], 1);
        assert_eq!(details["severity"], "high");
        assert_eq!(details["builds"][0]["buildNumber"], 1);
        assert_eq!(details["builds"][1]["outcome"], "failed");
        assert_eq!(parsed["failuresForJobs"]["test-bar"]["total"], 1);
    }

    #[test]
    fn test_ratings_and_exclusions() {
        let parsed = generate_value(&report());
        let rating = &parsed["ratings"][0];
        assert_eq!(rating["name"], "test-bar");
        assert_eq!(rating["enabled"], true);
        assert_eq!(rating["builds"]["5"]["excluded"], true);
        assert_eq!(rating["builds"]["1"]["excluded"], false);

        let exclusion = &parsed["exclusions"][0];
        assert_eq!(exclusion["buildNumber"], 5);
        assert_eq!(exclusion["failures"], 20);
        assert!((exclusion["sigma"].as_f64().unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_failures() {
        let parsed = generate_value(&report());
        assert_eq!(parsed["failedJobs"].as_array().unwrap().len(), 0);
        assert_eq!(parsed["artifactFailures"][0]["fileName"], "junit.xml");
        assert_eq!(parsed["artifactFailures"][0]["buildNumber"], 3);
    }

    #[test]
    fn test_pretty_formatting() {
        let mut output = String::new();
        generate(&report(), &mut output).unwrap();
        assert!(output.contains('\n'));
    }
}
