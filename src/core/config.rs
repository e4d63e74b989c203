//! Configuration management with layered hierarchy
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. Global user config (`~/.config/sigstat/config.yaml`)
//! 3. Project config (`sigstat.yaml` in the working directory, or `--config`)
//! 4. `.env` file and `SIGSTAT_*` environment variables
//!
//! CLI flags are applied on top by the command layer. Relative paths in a
//! config file are taken relative to the directory holding that file.

use miette::Diagnostic;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Project config file looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "sigstat.yaml";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    #[diagnostic(code(sigstat::config::not_found))]
    NotFound(PathBuf),

    #[error("Failed to read config file {path}: {message}")]
    #[diagnostic(code(sigstat::config::io))]
    Io { path: PathBuf, message: String },

    #[error("Invalid config file {path}: {message}")]
    #[diagnostic(code(sigstat::config::parse))]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value '{value}' for {key}")]
    #[diagnostic(code(sigstat::config::env), help("{help}"))]
    InvalidEnv {
        key: &'static str,
        value: String,
        help: &'static str,
    },
}

/// Resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// SQLite database file
    pub database: PathBuf,

    /// Table receiving the computed statistics
    pub table: String,

    /// Table holding lsl/usl (defaults to `table`)
    pub limits_table: Option<String>,

    /// Measurement CSV used by `sigstat run`
    pub measurements: Option<PathBuf>,

    /// Name of the measurement column in the CSV
    pub value_column: String,

    /// Whether `run --mode auto` is allowed to start its schedule loop
    pub autorun: bool,

    /// Weekly schedule for auto mode, e.g. "mon 08:00"
    pub schedule: String,

    /// SQLite busy timeout
    pub busy_timeout_ms: u64,

    /// Append log output to this file instead of stderr
    pub log_file: Option<PathBuf>,

    /// Write a markdown control chart after every successful run
    pub visualize: bool,

    /// Directory receiving the control charts
    pub report_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("sigstat.db"),
            table: "spec_stats".to_string(),
            limits_table: None,
            measurements: None,
            value_column: "value".to_string(),
            autorun: false,
            schedule: "mon 08:00".to_string(),
            busy_timeout_ms: 5000,
            log_file: None,
            visualize: false,
            report_dir: PathBuf::from("visuals"),
        }
    }
}

/// One config file layer; absent keys leave lower layers alone
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigLayer {
    database: Option<PathBuf>,
    table: Option<String>,
    limits_table: Option<String>,
    measurements: Option<PathBuf>,
    value_column: Option<String>,
    autorun: Option<bool>,
    schedule: Option<String>,
    busy_timeout_ms: Option<u64>,
    log_file: Option<PathBuf>,
    visualize: Option<bool>,
    report_dir: Option<PathBuf>,
}

impl ConfigLayer {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut layer = Self::parse(&contents, path)?;
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            layer.resolve_paths(base);
        }
        Ok(layer)
    }

    /// Anchor relative file paths at `base`
    fn resolve_paths(&mut self, base: &Path) {
        let paths = [
            &mut self.database,
            &mut self.measurements,
            &mut self.log_file,
            &mut self.report_dir,
        ];
        for path in paths.into_iter().flatten() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        // An empty or comment-only file is a valid, empty layer
        let blank = |l: &str| l.trim().is_empty() || l.trim_start().starts_with('#');
        if contents.lines().all(blank) {
            return Ok(Self::default());
        }
        serde_yml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    ///
    /// `explicit` is a config file given on the command line; unlike the
    /// default project file it must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                config.merge(ConfigLayer::read(&global_path)?);
            }
        }

        let project_path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(PROJECT_CONFIG_FILE),
        };
        if project_path.exists() {
            config.merge(ConfigLayer::read(&project_path)?);
            log::debug!("Loaded config from {}", project_path.display());
        }

        // .env values only fill variables that are not already set
        dotenv::dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok())?;

        Ok(config)
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "sigstat")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another layer into this one (other takes precedence)
    fn merge(&mut self, other: ConfigLayer) {
        if let Some(database) = other.database {
            self.database = database;
        }
        if let Some(table) = other.table {
            self.table = table;
        }
        if other.limits_table.is_some() {
            self.limits_table = other.limits_table;
        }
        if other.measurements.is_some() {
            self.measurements = other.measurements;
        }
        if let Some(value_column) = other.value_column {
            self.value_column = value_column;
        }
        if let Some(autorun) = other.autorun {
            self.autorun = autorun;
        }
        if let Some(schedule) = other.schedule {
            self.schedule = schedule;
        }
        if let Some(timeout) = other.busy_timeout_ms {
            self.busy_timeout_ms = timeout;
        }
        if other.log_file.is_some() {
            self.log_file = other.log_file;
        }
        if let Some(visualize) = other.visualize {
            self.visualize = visualize;
        }
        if let Some(report_dir) = other.report_dir {
            self.report_dir = report_dir;
        }
    }

    /// Apply `SIGSTAT_*` variables from a lookup function
    fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(database) = lookup("SIGSTAT_DATABASE") {
            self.database = PathBuf::from(database);
        }
        if let Some(table) = lookup("SIGSTAT_TABLE") {
            self.table = table;
        }
        if let Some(limits_table) = lookup("SIGSTAT_LIMITS_TABLE") {
            self.limits_table = Some(limits_table);
        }
        if let Some(measurements) = lookup("SIGSTAT_MEASUREMENTS") {
            self.measurements = Some(PathBuf::from(measurements));
        }
        if let Some(column) = lookup("SIGSTAT_VALUE_COLUMN") {
            self.value_column = column;
        }
        if let Some(autorun) = lookup("SIGSTAT_AUTORUN") {
            self.autorun = parse_bool(&autorun).ok_or(ConfigError::InvalidEnv {
                key: "SIGSTAT_AUTORUN",
                value: autorun.clone(),
                help: "Use 1, 0, true or false",
            })?;
        }
        if let Some(schedule) = lookup("SIGSTAT_SCHEDULE") {
            self.schedule = schedule;
        }
        if let Some(timeout) = lookup("SIGSTAT_BUSY_TIMEOUT_MS") {
            self.busy_timeout_ms =
                timeout.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    key: "SIGSTAT_BUSY_TIMEOUT_MS",
                    value: timeout.clone(),
                    help: "Use a whole number of milliseconds",
                })?;
        }
        if let Some(log_file) = lookup("SIGSTAT_LOG_FILE") {
            self.log_file = Some(PathBuf::from(log_file));
        }
        if let Some(visualize) = lookup("SIGSTAT_VISUALIZE") {
            self.visualize = parse_bool(&visualize).ok_or(ConfigError::InvalidEnv {
                key: "SIGSTAT_VISUALIZE",
                value: visualize.clone(),
                help: "Use 1, 0, true or false",
            })?;
        }
        if let Some(report_dir) = lookup("SIGSTAT_REPORT_DIR") {
            self.report_dir = PathBuf::from(report_dir);
        }
        Ok(())
    }

    /// Table the specification limits are read from
    pub fn limits_table(&self) -> &str {
        self.limits_table.as_deref().unwrap_or(&self.table)
    }

    /// Contents written by `sigstat init`
    pub fn default_file_contents() -> &'static str {
        r#"# sigstat configuration

# SQLite database holding the specification table
database: sigstat.db

# Table receiving mean, variance, std_dev and sigma_level
table: spec_stats

# Table holding lsl/usl (defaults to `table`)
# limits_table: spec_stats

# Measurement CSV read by `sigstat run` (columns: sku, value)
# measurements: measurements.csv
# value_column: value

# Weekly schedule for `sigstat run --mode auto`
autorun: false
schedule: "mon 08:00"

# Markdown control chart written after each run
visualize: false
# report_dir: visuals

# log_file: sigstat.log
"#
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
