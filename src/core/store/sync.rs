//! Metric synchronization into the specification table
//!
//! Each SKU is written in its own IMMEDIATE transaction holding an existence
//! check and one upsert, so a row is either fully written or untouched and
//! rows committed earlier in the same call survive a later abort.

use rusqlite::{params, ErrorCode, OptionalExtension, TransactionBehavior};

use super::{to_stored_value, RowOutcome, SpecStore, StoreError, SyncFailure, SyncReport};
use crate::core::metric::{Metric, StatMap};

/// Why a single row was not written
enum RowError {
    /// Value cannot be stored (non-finite, out of range)
    Rejected(String),
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for RowError {
    fn from(err: rusqlite::Error) -> Self {
        RowError::Sqlite(err)
    }
}

/// Errors that mean the store itself is unusable, not just one row
fn is_connection_error(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(
            ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull
                | ErrorCode::ReadOnly
                | ErrorCode::PermissionDenied
        )
    )
}

impl SpecStore {
    /// Upsert one metric column for every SKU in `values`
    ///
    /// Existing rows only have the metric column changed; missing rows are
    /// inserted with every other column NULL. Per-row failures are collected
    /// in the report. A store that becomes unusable mid-call aborts with
    /// [`StoreError::ConnectionLost`], carrying the rows already committed.
    pub fn sync(&mut self, metric: Metric, values: &StatMap) -> Result<SyncReport, StoreError> {
        let (lookup_sql, upsert_sql) = self.row_sql(metric);

        // A missing table or column fails every row; surface it once
        self.conn.prepare_cached(&lookup_sql)?;
        self.conn.prepare_cached(&upsert_sql)?;

        self.sync_rows(metric, values, |store, sku, value| {
            store.upsert_row(&lookup_sql, &upsert_sql, sku, value)
        })
    }

    /// Lookup and upsert statements for one metric column
    fn row_sql(&self, metric: Metric) -> (String, String) {
        let column = metric.column();
        let lookup_sql = format!("SELECT {column} FROM {} WHERE sku = ?1", self.table);
        let upsert_sql = format!(
            "INSERT INTO {} (sku, {column}) VALUES (?1, ?2) \
             ON CONFLICT(sku) DO UPDATE SET {column} = excluded.{column}",
            self.table
        );
        (lookup_sql, upsert_sql)
    }

    /// Drive `write_row` over every SKU, classifying its failures
    fn sync_rows<F>(
        &mut self,
        metric: Metric,
        values: &StatMap,
        mut write_row: F,
    ) -> Result<SyncReport, StoreError>
    where
        F: FnMut(&mut Self, &str, f64) -> Result<RowOutcome, RowError>,
    {
        let mut report = SyncReport::new(metric);

        for (sku, value) in values {
            match write_row(self, sku, *value) {
                Ok(outcome) => report.record(outcome),
                Err(RowError::Sqlite(err)) if is_connection_error(&err) => {
                    log::error!("Aborting '{}' sync at SKU '{}': {}", metric, sku, err);
                    return Err(StoreError::ConnectionLost {
                        metric,
                        committed: Box::new(report),
                        message: err.to_string(),
                    });
                }
                Err(RowError::Sqlite(err)) => {
                    log::warn!("Failed to write {} for SKU '{}': {}", metric, sku, err);
                    report.failed.push(SyncFailure {
                        sku: sku.clone(),
                        reason: err.to_string(),
                    });
                }
                Err(RowError::Rejected(reason)) => {
                    log::warn!("Rejected {} for SKU '{}': {}", metric, sku, reason);
                    report.failed.push(SyncFailure {
                        sku: sku.clone(),
                        reason,
                    });
                }
            }
        }

        log::info!(
            "Synced {}: {} inserted, {} updated, {} unchanged, {} failed",
            metric,
            report.inserted,
            report.updated,
            report.unchanged,
            report.failed.len()
        );

        Ok(report)
    }

    fn upsert_row(
        &mut self,
        lookup_sql: &str,
        upsert_sql: &str,
        sku: &str,
        value: f64,
    ) -> Result<RowOutcome, RowError> {
        let value = to_stored_value(value).map_err(RowError::Rejected)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<Option<f64>> = tx
            .prepare_cached(lookup_sql)?
            .query_row(params![sku], |row| row.get(0))
            .optional()?;

        let outcome = match existing {
            Some(Some(current)) if current == value => RowOutcome::Unchanged,
            Some(_) => RowOutcome::Updated,
            None => RowOutcome::Inserted,
        };

        if outcome != RowOutcome::Unchanged {
            tx.prepare_cached(upsert_sql)?
                .execute(params![sku, value])?;
        }

        tx.commit()?;
        Ok(outcome)
    }
}
