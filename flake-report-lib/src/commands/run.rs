//! Command dispatch logic for flake-report

use super::{InitArgs, JenkinsArgs, ValidateArgs, init_config, process_jenkins, validate_config};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "flake-report", author, version, long_about = None)]
#[command(about = "Find flaky tests in the JUnit results of Jenkins builds")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: FlakeSubcommand,
}

#[derive(Subcommand, Debug)]
enum FlakeSubcommand {
    /// Analyze Jenkins jobs and generate flaky test reports
    Jenkins(Box<JenkinsArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// # Arguments
///
/// * `args` - An iterator of command-line arguments (typically from `std::env::args()`)
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match &Cli::parse_from(args).command {
        FlakeSubcommand::Jenkins(jenkins_args) => process_jenkins(host, jenkins_args).await,
        FlakeSubcommand::Init(init_args) => init_config(host, init_args),
        FlakeSubcommand::Validate(validate_args) => validate_config(host, validate_args),
    }
}
