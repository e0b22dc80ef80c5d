//! Command-line interface and orchestration for flake-report
//!
//! This module implements the CLI commands and ties the other modules together
//! to perform end-to-end flaky-test analysis and reporting.
//!
//! # Commands
//!
//! - **jenkins**: Fetch the selected jobs from a Jenkins server, rate and filter
//!   their builds, merge the JUnit results, and generate reports
//! - **init**: Generate a default configuration file
//! - **validate**: Check configuration file syntax and pattern validity
//!
//! # Execution Flow
//!
//! The `run` function parses command-line arguments using clap and routes
//! to the appropriate command handler. The jenkins command:
//!
//! 1. Loads the configuration and overlays the command-line flags
//! 2. Compiles every pattern, aborting before any network access on error
//! 3. Runs the fetch orchestrator against a `JenkinsClient`
//! 4. Reports jobs that could not be fetched (or fails with `--strict`)
//! 5. Generates the requested HTML, JSON, and console reports

mod common;
mod config;
mod host;
mod init;
mod jenkins;
mod progress_reporter;
mod run;
mod validate;

#[cfg(debug_assertions)]
pub use config::Config;

pub use host::Host;
pub use init::{InitArgs, init_config};
pub use jenkins::{JenkinsArgs, process_jenkins};
pub use progress_reporter::ProgressReporter;
pub use run::run;
pub use validate::{ValidateArgs, validate_config};
