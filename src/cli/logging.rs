//! Logger setup for the binary

use std::fs::OpenOptions;

use env_logger::{Builder, Env, Target, WriteStyle};
use miette::{IntoDiagnostic, Result};

use crate::cli::GlobalOpts;
use crate::core::Config;

/// Default filter for the given verbosity flags; `RUST_LOG` wins when set
pub fn default_filter(global: &GlobalOpts) -> &'static str {
    if global.quiet {
        "warn"
    } else if global.verbose {
        "debug"
    } else {
        "info"
    }
}

/// Initialize `env_logger`, writing to `config.log_file` when configured
pub fn init(global: &GlobalOpts, config: &Config) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_filter(global)));

    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| miette::miette!("Cannot open log file {}: {}", path.display(), e))?;
            builder
                .target(Target::Pipe(Box::new(file)))
                .write_style(WriteStyle::Never);
        }
        None => {
            builder.target(Target::Stderr);
        }
    }

    builder.try_init().into_diagnostic()
}
