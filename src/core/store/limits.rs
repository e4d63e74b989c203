//! Specification limits: reading them for the engine and seeding them

use rusqlite::{params, OptionalExtension};

use super::{to_stored_value, LimitImportStats, RowOutcome, SpecStore, StoreError};
use crate::core::limits::LimitRow;
use crate::core::metric::StatMap;
use crate::core::stats::SpecLimits;

impl SpecStore {
    /// Read lower/upper limits from the limits table
    ///
    /// A NULL limit leaves the SKU out of that bound's map.
    pub fn load_limits(&self) -> Result<SpecLimits, StoreError> {
        let sql = format!("SELECT sku, lsl, usl FROM {}", self.limits_table);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<f64>>(1)?,
                row.get::<_, Option<f64>>(2)?,
            ))
        })?;

        let mut lsl = StatMap::new();
        let mut usl = StatMap::new();
        for row in rows {
            let (sku, lower, upper) = row?;
            if let Some(value) = lower {
                lsl.insert(sku.clone(), value);
            }
            if let Some(value) = upper {
                usl.insert(sku, value);
            }
        }

        log::debug!(
            "Loaded limits from '{}': {} LSL, {} USL",
            self.limits_table,
            lsl.len(),
            usl.len()
        );
        Ok(SpecLimits::new(lsl, usl))
    }

    /// Set both limits for one SKU, creating the record if needed
    pub fn put_limits(
        &mut self,
        sku: &str,
        lsl: Option<f64>,
        usl: Option<f64>,
    ) -> Result<RowOutcome, StoreError> {
        let tx = self.conn.transaction()?;
        let outcome = upsert_limits(&tx, self.limits_table.as_str(), sku, lsl, usl)?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Import a batch of limits in one transaction
    ///
    /// Any invalid row rolls back the whole import.
    pub fn import_limits(&mut self, rows: &[LimitRow]) -> Result<LimitImportStats, StoreError> {
        let mut stats = LimitImportStats::default();
        let tx = self.conn.transaction()?;
        for row in rows {
            stats.rows_processed += 1;
            match upsert_limits(&tx, self.limits_table.as_str(), &row.sku, row.lsl, row.usl)? {
                RowOutcome::Inserted => stats.inserted += 1,
                _ => stats.updated += 1,
            }
        }
        tx.commit()?;

        log::info!(
            "Imported limits for {} SKU(s) into '{}'",
            stats.rows_processed,
            self.limits_table
        );
        Ok(stats)
    }
}

fn upsert_limits(
    conn: &rusqlite::Connection,
    table: &str,
    sku: &str,
    lsl: Option<f64>,
    usl: Option<f64>,
) -> Result<RowOutcome, StoreError> {
    let round = |value: Option<f64>| -> Result<Option<f64>, StoreError> {
        value
            .map(|v| {
                to_stored_value(v)
                    .map_err(|reason| StoreError::Query(format!("SKU '{}': {}", sku, reason)))
            })
            .transpose()
    };
    let lsl = round(lsl)?;
    let usl = round(usl)?;

    let exists = conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE sku = ?1", table),
            params![sku],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    conn.execute(
        &format!(
            "INSERT INTO {table} (sku, lsl, usl) VALUES (?1, ?2, ?3) \
             ON CONFLICT(sku) DO UPDATE SET lsl = excluded.lsl, usl = excluded.usl"
        ),
        params![sku, lsl, usl],
    )?;

    Ok(if exists {
        RowOutcome::Updated
    } else {
        RowOutcome::Inserted
    })
}
