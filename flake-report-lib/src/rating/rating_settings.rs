/// Tunables of the build rating model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSettings {
    /// Builds whose absolute sigma is above this value are excluded.
    pub sigma_threshold: f64,

    /// Below this number of rated builds the model is disabled.
    pub min_builds: usize,
}

impl RatingSettings {
    pub const DEFAULT_SIGMA_THRESHOLD: f64 = 1.5;
    pub const DEFAULT_MIN_BUILDS: usize = 3;
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            sigma_threshold: Self::DEFAULT_SIGMA_THRESHOLD,
            min_builds: Self::DEFAULT_MIN_BUILDS,
        }
    }
}
