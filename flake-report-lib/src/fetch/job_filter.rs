use crate::Result;
use ohno::IntoAppError;
use regex::Regex;
use std::collections::HashSet;

/// Selects jobs by name.
///
/// A job is selected when its name matches any of the patterns.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    patterns: Vec<Regex>,
}

impl JobFilter {
    /// Compile a filter from regular expressions.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).into_app_err_with(|| format!("invalid job name pattern '{pattern}'"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }

    #[must_use]
    pub fn matches(&self, job: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(job))
    }

    /// Keep the matching jobs, each at most once, in their original order.
    pub fn apply(&self, jobs: impl IntoIterator<Item = String>) -> Vec<String> {
        let mut seen = HashSet::new();
        jobs.into_iter()
            .filter(|job| self.matches(job) && seen.insert(job.clone()))
            .collect()
    }
}
