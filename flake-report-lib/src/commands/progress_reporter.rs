use crate::fetch::Progress;
use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::task::JoinHandle;

type StatusCallback = Box<dyn Fn() -> (u64, u64, String) + Send + Sync>;

/// Refresh rate for progress updates (10 Hz).
const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// Width of the bar and of the bouncing spinner.
const BAR_WIDTH: usize = 25;

const DETERMINATE_TEMPLATE: &str = "{prefix:>12.bold.cyan} [{bar:25}] {pos}/{len} {msg}";
const DETERMINATE_TEMPLATE_NO_COLOR: &str = "{prefix:>12} [{bar:25}] {pos}/{len} {msg}";
const INDETERMINATE_TEMPLATE: &str = "{prefix:>12.bold.cyan} [{spinner}] {msg}";
const INDETERMINATE_TEMPLATE_NO_COLOR: &str = "{prefix:>12} [{spinner}] {msg}";

#[derive(Debug)]
struct DisplayState {
    visible_after: Instant,
    visible: AtomicBool,
    indeterminate: AtomicBool,
    phase_started: Mutex<Instant>,
}

/// A stderr progress bar for fetch runs.
///
/// Stays hidden until `delay` has elapsed so that quick runs print nothing.
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
    state: Arc<DisplayState>,
    status: Arc<Mutex<StatusCallback>>,
    refresh_task: Arc<JoinHandle<()>>,
    use_colors: bool,
}

impl ProgressReporter {
    /// Create a new progress reporter; must be called from within a tokio runtime.
    #[must_use]
    pub fn new(delay: Duration, use_colors: bool) -> Self {
        let bar = ProgressBar::hidden();

        let state = Arc::new(DisplayState {
            visible_after: Instant::now() + delay,
            visible: AtomicBool::new(false),
            indeterminate: AtomicBool::new(false),
            phase_started: Mutex::new(Instant::now()),
        });

        let status = Arc::new(Mutex::new(Box::new(|| (0u64, 0u64, String::new())) as StatusCallback));

        Self {
            refresh_task: Arc::new(tokio::spawn(refresh(bar.clone(), Arc::clone(&state), Arc::clone(&status)))),
            bar,
            state,
            status,
            use_colors,
        }
    }

    fn replace_status(&self, callback: StatusCallback) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = callback;
    }

    fn restart_clock(&self) {
        *self.state.phase_started.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn style(&self, colored: &str, plain: &str, spinner: bool) -> ProgressStyle {
        let template = if self.use_colors { colored } else { plain };
        let base = if spinner { ProgressStyle::default_spinner() } else { ProgressStyle::default_bar() };

        // The templates are constants, so this only falls back if they are malformed.
        base.template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
    }
}

impl Progress for ProgressReporter {
    fn set_phase(&self, phase: &str) {
        self.bar.set_prefix(phase.to_string());
        self.restart_clock();
    }

    fn set_determinate(&self, callback: Box<dyn Fn() -> (u64, u64, String) + Send + Sync + 'static>) {
        self.replace_status(callback);
        self.state.indeterminate.store(false, Ordering::Relaxed);
        self.bar.disable_steady_tick();
        self.bar.set_length(0);
        self.bar.set_position(0);
        self.bar
            .set_style(self.style(DETERMINATE_TEMPLATE, DETERMINATE_TEMPLATE_NO_COLOR, false).progress_chars("=> "));
    }

    fn set_indeterminate(&self, callback: Box<dyn Fn() -> String + Send + Sync + 'static>) {
        self.replace_status(Box::new(move || (0, 0, callback())));
        self.restart_clock();
        self.state.indeterminate.store(true, Ordering::Relaxed);
        self.bar.enable_steady_tick(REFRESH_INTERVAL);

        let frames = bounce_frames();
        let frames: Vec<&str> = frames.iter().map(String::as_str).collect();
        self.bar
            .set_style(self.style(INDETERMINATE_TEMPLATE, INDETERMINATE_TEMPLATE_NO_COLOR, true).tick_strings(&frames));
    }

    fn done(&self) {
        self.refresh_task.abort();
        if self.state.visible.load(Ordering::Relaxed) {
            self.bar.finish_and_clear();
        }
    }
}

impl Debug for ProgressReporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("bar", &self.bar)
            .field("state", &self.state)
            .field("status", &"<callback>")
            .field("refresh_task", &"<task>")
            .field("use_colors", &self.use_colors)
            .finish()
    }
}

/// Spinner frames of a `===>` block sliding right, then `<===` sliding back.
///
/// The last frame is the one shown once the spinner finishes.
fn bounce_frames() -> Vec<String> {
    const HEAD_RIGHT: &str = "===>";
    const HEAD_LEFT: &str = "<===";
    const ENTER_RIGHT: [&str; 3] = [">", "=>", "==>"];
    const ENTER_LEFT: [&str; 3] = ["<", "<=", "<=="];

    let pad = |offset: usize, body: &str| {
        let visible: String = body.chars().take(BAR_WIDTH.saturating_sub(offset)).collect();
        format!("{}{visible:<width$}", " ".repeat(offset), width = BAR_WIDTH - offset)
    };

    let mut frames = Vec::with_capacity(4 * BAR_WIDTH);
    frames.extend(ENTER_RIGHT.iter().map(|head| pad(0, head)));
    frames.extend((0..BAR_WIDTH).map(|offset| pad(offset, HEAD_RIGHT)));
    frames.extend(ENTER_LEFT.iter().map(|head| pad(BAR_WIDTH - head.len(), head)));
    frames.extend((0..=BAR_WIDTH - HEAD_LEFT.len()).rev().map(|offset| pad(offset, HEAD_LEFT)));
    frames.push(" ".repeat(BAR_WIDTH));
    frames
}

/// Periodically pulls the status callback into the bar until aborted.
async fn refresh(bar: ProgressBar, state: Arc<DisplayState>, status: Arc<Mutex<StatusCallback>>) {
    let mut interval = tokio::time::interval(REFRESH_INTERVAL);
    #[expect(clippy::infinite_loop, reason = "task runs until aborted")]
    loop {
        let _ = interval.tick().await;

        if !state.visible.load(Ordering::Relaxed) && Instant::now() >= state.visible_after {
            state.visible.store(true, Ordering::Relaxed);
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        }

        if !state.visible.load(Ordering::Relaxed) {
            continue;
        }

        let (length, position, mut message) = {
            let callback = status.lock().unwrap_or_else(PoisonError::into_inner);
            callback()
        };

        if state.indeterminate.load(Ordering::Relaxed) {
            let elapsed = state.phase_started.lock().unwrap_or_else(PoisonError::into_inner).elapsed();
            message = format!("{}s: {message}", elapsed.as_secs());
        }

        if length > 0 {
            bar.set_length(length);
            bar.set_position(position);
        }
        bar.set_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounce_frames_have_fixed_width() {
        let frames = bounce_frames();
        assert!(frames.len() > BAR_WIDTH * 2);
        for frame in &frames {
            assert_eq!(frame.chars().count(), BAR_WIDTH, "frame '{frame}'");
        }
        assert_eq!(frames[0], format!("{:<BAR_WIDTH$}", ">"));
        assert!(frames.iter().any(|frame| frame.ends_with("===>")));
        assert!(frames.iter().any(|frame| frame.starts_with("<===")));
    }

    #[tokio::test]
    async fn test_hidden_reporter_accepts_updates() {
        let reporter = ProgressReporter::new(Duration::from_secs(3600), false);
        reporter.set_phase("Listing");
        reporter.set_indeterminate(Box::new(|| "retrieving job list".to_string()));
        reporter.set_phase("Fetching");
        reporter.set_determinate(Box::new(|| (4, 1, "test-foo".to_string())));
        reporter.done();
        assert!(!reporter.state.visible.load(Ordering::Relaxed));
    }
}
