//! SQLite-backed specification table
//!
//! One row per SKU holding its specification limits and the latest computed
//! statistics. The table layout is fixed:
//!
//! `sku (unique), lsl, usl, mean, variance, std_dev, sigma_level`
//!
//! Every numeric column is nullable on its own and stores values rounded to
//! two fractional digits. The store never deletes rows.

mod limits;
mod schema;
mod sync;
mod types;

pub use types::*;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use miette::Diagnostic;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;

use crate::core::config::Config;
use crate::core::metric::Metric;

/// Largest magnitude representable with 10 digits, 2 of them fractional
pub const MAX_STORED_VALUE: f64 = 99_999_999.99;

/// Maximum SKU length enforced by the table's CHECK constraint
pub const MAX_SKU_LEN: usize = 50;

/// Errors raised by the specification store
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("Cannot open specification store {path}: {message}")]
    #[diagnostic(
        code(sigstat::store::connection),
        help("Check that the database path exists and is writable")
    )]
    Connection { path: PathBuf, message: String },

    #[error(
        "Connection lost while syncing '{metric}' after {} committed row(s): {message}",
        committed.committed()
    )]
    #[diagnostic(
        code(sigstat::store::connection_lost),
        help("Rows committed before the failure are kept; rerun once the store is reachable")
    )]
    ConnectionLost {
        metric: Metric,
        committed: Box<SyncReport>,
        message: String,
    },

    #[error("Invalid table name '{0}'")]
    #[diagnostic(
        code(sigstat::store::table_name),
        help("Use a letter or underscore first, then only letters, digits and underscores")
    )]
    InvalidTableName(String),

    #[error("Specification store query failed: {0}")]
    #[diagnostic(code(sigstat::store::query))]
    Query(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

/// A validated SQL identifier for a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: &str) -> Result<Self, StoreError> {
        let name = name.trim();
        let mut chars = name.chars();
        let valid_start = chars
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

        if valid_start && valid_rest && name.len() <= 64 {
            Ok(Self(name.to_string()))
        } else {
            Err(StoreError::InvalidTableName(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The specification store backed by SQLite
///
/// The store owns its connection. Writers take `&mut self`, so a sync has
/// exclusive use of the connection until it returns.
pub struct SpecStore {
    conn: Connection,
    path: PathBuf,
    table: TableName,
    limits_table: TableName,
}

impl SpecStore {
    /// Open (or create) the database file for the given tables
    pub fn open(
        path: &Path,
        table: &str,
        limits_table: &str,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let table = TableName::new(table)?;
        let limits_table = TableName::new(limits_table)?;

        let connection_error = |e: rusqlite::Error| StoreError::Connection {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let conn = Connection::open(path).map_err(connection_error)?;
        conn.busy_timeout(busy_timeout).map_err(connection_error)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(connection_error)?;

        log::debug!("Opened specification store {}", path.display());

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            table,
            limits_table,
        })
    }

    /// Open the store described by a configuration
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        Self::open(
            &config.database,
            &config.table,
            config.limits_table(),
            Duration::from_millis(config.busy_timeout_ms),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn limits_table(&self) -> &TableName {
        &self.limits_table
    }

    /// All records, ordered by SKU
    pub fn records(&self) -> Result<Vec<SpecRecord>, StoreError> {
        let sql = format!(
            "SELECT sku, lsl, usl, mean, variance, std_dev, sigma_level FROM {} ORDER BY sku",
            self.table
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], record_from_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// A single record by SKU
    pub fn record(&self, sku: &str) -> Result<Option<SpecRecord>, StoreError> {
        let sql = format!(
            "SELECT sku, lsl, usl, mean, variance, std_dev, sigma_level FROM {} WHERE sku = ?1",
            self.table
        );
        Ok(self
            .conn
            .query_row(&sql, params![sku], record_from_row)
            .optional()?)
    }

    /// Number of records in the table
    pub fn count(&self) -> Result<usize, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<SpecRecord> {
    Ok(SpecRecord {
        sku: row.get(0)?,
        lsl: row.get(1)?,
        usl: row.get(2)?,
        mean: row.get(3)?,
        variance: row.get(4)?,
        std_dev: row.get(5)?,
        sigma_level: row.get(6)?,
    })
}

/// Round to the stored precision, rejecting what the column cannot hold
pub fn to_stored_value(value: f64) -> Result<f64, String> {
    if !value.is_finite() {
        return Err(format!("value {} is not finite", value));
    }
    let rounded = (value * 100.0).round() / 100.0;
    if rounded.abs() > MAX_STORED_VALUE {
        return Err(format!(
            "value {} exceeds the storable range of ±{}",
            value, MAX_STORED_VALUE
        ));
    }
    // Avoid persisting negative zero
    Ok(if rounded == 0.0 { 0.0 } else { rounded })
}
