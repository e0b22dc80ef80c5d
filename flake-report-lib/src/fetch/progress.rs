/// Reports progress of a long-running fetch.
pub trait Progress: Send + Sync {
    /// Set the phase label for the current operation (e.g., "Listing", "Fetching").
    fn set_phase(&self, phase: &str);

    /// Configure determinate progress reporting.
    ///
    /// The callback returns (total, current, message).
    fn set_determinate(&self, callback: Box<dyn Fn() -> (u64, u64, String) + Send + Sync + 'static>);

    /// Configure indeterminate progress reporting for work of unknown size.
    fn set_indeterminate(&self, callback: Box<dyn Fn() -> String + Send + Sync + 'static>);

    /// Finish and clear the progress indicator.
    fn done(&self);
}

/// Progress sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn set_phase(&self, _phase: &str) {}

    fn set_determinate(&self, _callback: Box<dyn Fn() -> (u64, u64, String) + Send + Sync + 'static>) {}

    fn set_indeterminate(&self, _callback: Box<dyn Fn() -> String + Send + Sync + 'static>) {}

    fn done(&self) {}
}
