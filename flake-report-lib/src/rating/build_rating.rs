use super::RatingSettings;
use serde::Serialize;
use std::collections::BTreeMap;

/// Failure count and score of one rated build.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BuildData {
    pub failures: u64,
    pub sigma: f64,
}

/// Audit record for a build that was left out of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExclusionRecord {
    pub job: String,
    pub build_number: u64,
    pub sigma: f64,
    pub failures: u64,
}

/// Failure-count statistics of one job over the rating window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildRating {
    pub name: String,
    pub mean: f64,
    pub standard_deviation: f64,
    pub sigma_threshold: f64,

    /// False when there was too little history or no variance to rate against.
    pub enabled: bool,

    builds: BTreeMap<u64, BuildData>,
}

impl BuildRating {
    /// Rate the builds of a job from their failure counts.
    #[expect(clippy::cast_precision_loss, reason = "failure counts are far below 2^52")]
    pub fn new(name: impl Into<String>, failures: impl IntoIterator<Item = (u64, u64)>, settings: RatingSettings) -> Self {
        let failures: BTreeMap<u64, u64> = failures.into_iter().collect();

        let count = failures.len() as f64;
        let (mean, standard_deviation) = if failures.is_empty() {
            (0.0, 0.0)
        } else {
            let mean = failures.values().map(|&f| f as f64).sum::<f64>() / count;
            let variance = failures.values().map(|&f| (f as f64 - mean).powi(2)).sum::<f64>() / count;
            (mean, variance.sqrt())
        };

        let enabled = failures.len() >= settings.min_builds.max(1)
            && standard_deviation.is_finite()
            && standard_deviation > f64::EPSILON;

        let builds = failures
            .into_iter()
            .map(|(number, failures)| {
                let sigma = if enabled {
                    (failures as f64 - mean) / standard_deviation
                } else {
                    0.0
                };
                (number, BuildData { failures, sigma })
            })
            .collect();

        Self {
            name: name.into(),
            mean,
            standard_deviation,
            sigma_threshold: settings.sigma_threshold,
            enabled,
            builds,
        }
    }

    /// The z-score of a build; zero for builds without failure data.
    #[must_use]
    pub fn score(&self, build_number: u64) -> f64 {
        self.builds.get(&build_number).map_or(0.0, |data| data.sigma)
    }

    #[must_use]
    pub fn should_exclude(&self, build_number: u64) -> bool {
        self.enabled && self.score(build_number).abs() > self.sigma_threshold
    }

    #[must_use]
    pub fn build_data(&self, build_number: u64) -> Option<BuildData> {
        self.builds.get(&build_number).copied()
    }

    /// All rated builds in build number order.
    pub fn builds(&self) -> impl Iterator<Item = (u64, BuildData)> + '_ {
        self.builds.iter().map(|(number, data)| (*number, *data))
    }

    /// The audit record for a build, if the build is excluded.
    #[must_use]
    pub fn exclusion(&self, build_number: u64) -> Option<ExclusionRecord> {
        if !self.should_exclude(build_number) {
            return None;
        }

        let data = self.build_data(build_number)?;
        Some(ExclusionRecord {
            job: self.name.clone(),
            build_number,
            sigma: data.sigma,
            failures: data.failures,
        })
    }
}
