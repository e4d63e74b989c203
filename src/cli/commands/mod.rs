//! CLI command implementations

pub mod analyze;
pub mod init;
pub mod limits;
pub mod report;
pub mod run;

use miette::Result;

use crate::cli::helpers::load_config;
use crate::cli::{logging, GlobalOpts};
use crate::core::Config;

/// Resolve the config for a command and start logging
pub(crate) fn setup(global: &GlobalOpts) -> Result<Config> {
    let config = load_config(global)?;
    logging::init(global, &config)?;
    log::debug!(
        "Using database {} (table '{}', limits '{}')",
        config.database.display(),
        config.table,
        config.limits_table()
    );
    Ok(config)
}
