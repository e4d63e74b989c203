//! Table creation

use super::{SpecStore, StoreError, TableName, MAX_SKU_LEN};

fn create_table_sql(table: &TableName) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sku TEXT NOT NULL UNIQUE CHECK (length(sku) <= {max_sku}),
            lsl REAL DEFAULT NULL,
            usl REAL DEFAULT NULL,
            mean REAL DEFAULT NULL,
            variance REAL DEFAULT NULL,
            std_dev REAL DEFAULT NULL,
            sigma_level REAL DEFAULT NULL
        );
        "#,
        table = table,
        max_sku = MAX_SKU_LEN
    )
}

impl SpecStore {
    /// Create the statistics table (and a separate limits table) if missing
    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(&create_table_sql(&self.table))?;
        if self.limits_table != self.table {
            self.conn
                .execute_batch(&create_table_sql(&self.limits_table))?;
        }
        log::debug!("Table '{}' is ready", self.table);
        Ok(())
    }

    /// Whether the statistics table exists
    pub fn has_schema(&self) -> Result<bool, StoreError> {
        let exists: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [self.table.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists > 0)
    }
}
