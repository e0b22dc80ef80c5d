//! Report generation for flaky-build analysis results
//!
//! A [`Report`] is assembled once from the outcome of a fetch run and then
//! handed to any number of generators:
//! - **Console**: Terminal summary with optional ANSI colors
//! - **HTML**: Self-contained page with embedded CSS and dark mode
//! - **JSON**: Machine-readable structured data
//!
//! The heart of every report is [`ReportData`], the test by job pass/fail
//! matrix folded from the merged results of all non-excluded builds.

mod console;
mod html;
mod json;
mod report;
mod report_data;

pub use console::generate as generate_console;
pub use html::generate as generate_html;
pub use json::generate as generate_json;
pub use report::{FailedJob, Report};
pub use report_data::{BuildOutcome, JobFailures, ReportData, Severity, TestDetails};
