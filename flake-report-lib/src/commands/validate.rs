use super::Host;
use super::config::{Config, DEFAULT_CONFIG_FILE_NAME};
use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file (default is `flake-report.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,
}

/// Loads a configuration file, which checks its values and compiles its patterns.
pub fn validate_config<H: Host>(host: &mut H, args: &ValidateArgs) -> Result<()> {
    let config_path = args.config.as_ref();

    match Config::load(Utf8Path::new("."), config_path) {
        Ok(config) => {
            let _ = writeln!(host.output(), "Configuration file is valid");
            if let Some(path) = config_path {
                let _ = writeln!(host.output(), "Config file: {path}");
            } else if Utf8Path::new(DEFAULT_CONFIG_FILE_NAME).exists() {
                let _ = writeln!(host.output(), "Config file: {DEFAULT_CONFIG_FILE_NAME}");
            } else {
                let _ = writeln!(host.output(), "Using default configuration (no config file found)");
            }

            let _ = writeln!(
                host.output(),
                "{} job name pattern(s), sigma threshold {}, ratings need {} builds",
                config.job_name_patterns.len(),
                config.sigma_threshold,
                config.min_builds_for_rating
            );
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Configuration validation failed: {e}");
            host.exit(1);
            Err(e)
        }
    }
}
