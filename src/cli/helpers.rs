//! Shared helper functions for CLI commands

use console::{style, Term};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::cli::GlobalOpts;
use crate::core::{Config, SpecStore};

/// Load the layered config and apply the global CLI overrides
pub fn load_config(global: &GlobalOpts) -> Result<Config> {
    let mut config = Config::load(global.config.as_deref())?;
    if let Some(db) = &global.db {
        config.database = db.clone();
    }
    if let Some(table) = &global.table {
        config.table = table.clone();
    }
    Ok(config)
}

/// Open the specification store and make sure its tables exist
pub fn open_store(config: &Config) -> Result<SpecStore> {
    let store = SpecStore::from_config(config)?;
    store.init_schema()?;
    Ok(store)
}

/// Format an optional stored value; NULL prints as "-"
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

/// Escape a string for CSV output
///
/// Handles commas, quotes, and newlines according to RFC 4180.
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Whether stdout is an interactive terminal
pub fn stdout_is_term() -> bool {
    Term::stdout().is_term()
}

/// Write to a file when a path is given, otherwise to stdout
pub fn write_output(content: &str, output_path: Option<&Path>) -> Result<()> {
    match output_path {
        Some(path) => {
            let file = File::create(path).into_diagnostic()?;
            let mut writer = BufWriter::new(file);
            writer.write_all(content.as_bytes()).into_diagnostic()?;
            writer.flush().into_diagnostic()?;
            println!(
                "{} Report written to {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
        None => print!("{}", content),
    }
    Ok(())
}
