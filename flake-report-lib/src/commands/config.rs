use crate::Result;
use crate::fetch::JobFilter;
use crate::rating::RatingSettings;
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Name of the configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE_NAME: &str = "flake-report.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Builds whose absolute sigma exceeds this value are excluded
    #[serde(default = "default_sigma_threshold")]
    pub sigma_threshold: f64,

    /// Minimum number of rated builds before a job's builds can be excluded
    #[serde(default = "default_min_builds_for_rating")]
    pub min_builds_for_rating: usize,

    /// Artifacts whose file name matches are parsed as JUnit reports
    pub artifact_file_name_pattern: String,

    /// Jobs matching any of these patterns are fetched
    #[serde(default)]
    pub job_name_patterns: Vec<String>,

    /// How far back builds are reported
    #[serde(default = "default_window", with = "humantime_serde")]
    pub report_window: Duration,

    /// How far back builds feed the build rating
    #[serde(default = "default_window", with = "humantime_serde")]
    pub rating_window: Duration,
}

const fn default_sigma_threshold() -> f64 {
    RatingSettings::DEFAULT_SIGMA_THRESHOLD
}

const fn default_min_builds_for_rating() -> usize {
    RatingSettings::DEFAULT_MIN_BUILDS
}

const fn default_window() -> Duration {
    Duration::from_secs(14 * 24 * 60 * 60)
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading flake-report configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = base_dir.join(DEFAULT_CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::builtin(),
                Err(e) => return Err(e).into_app_err_with(|| format!("reading flake-report configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok(config)
    }

    /// The configuration embedded in the binary
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded configuration is malformed
    pub fn builtin() -> Result<Self> {
        let config: Self = toml::from_str(DEFAULT_CONFIG_TOML).into_app_err("parsing the built-in configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Save the default configuration to a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    #[must_use]
    pub const fn rating_settings(&self) -> RatingSettings {
        RatingSettings {
            sigma_threshold: self.sigma_threshold,
            min_builds: self.min_builds_for_rating,
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error if a value is out of range or a pattern does not compile
    pub fn validate(&self) -> Result<()> {
        if !(self.sigma_threshold.is_finite() && self.sigma_threshold > 0.0) {
            return Err(app_err!("sigma_threshold must be a positive number, got {}", self.sigma_threshold));
        }

        if self.min_builds_for_rating < 2 {
            return Err(app_err!(
                "min_builds_for_rating must be at least 2, got {}",
                self.min_builds_for_rating
            ));
        }

        if self.report_window.is_zero() {
            return Err(app_err!("report_window must not be zero"));
        }

        if self.rating_window.is_zero() {
            return Err(app_err!("rating_window must not be zero"));
        }

        let _ = Regex::new(&self.artifact_file_name_pattern)
            .into_app_err_with(|| format!("invalid artifact_file_name_pattern '{}'", self.artifact_file_name_pattern))?;
        let _ = JobFilter::new(&self.job_name_patterns)?;

        Ok(())
    }
}
