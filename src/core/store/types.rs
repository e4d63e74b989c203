//! Store type definitions

use serde::Serialize;

use crate::core::metric::Metric;

/// One persisted specification record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpecRecord {
    pub sku: String,
    pub lsl: Option<f64>,
    pub usl: Option<f64>,
    pub mean: Option<f64>,
    pub variance: Option<f64>,
    pub std_dev: Option<f64>,
    pub sigma_level: Option<f64>,
}

/// What a single-row upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted,
    Updated,
    /// The row already held the same rounded value; nothing was written
    Unchanged,
}

/// A row that could not be written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncFailure {
    pub sku: String,
    pub reason: String,
}

/// Result of syncing one metric map into the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub metric: Metric,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            inserted: 0,
            updated: 0,
            unchanged: 0,
            failed: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Inserted => self.inserted += 1,
            RowOutcome::Updated => self.updated += 1,
            RowOutcome::Unchanged => self.unchanged += 1,
        }
    }

    /// Rows that are durably in the store after this call
    pub fn committed(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of importing specification limits
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LimitImportStats {
    pub rows_processed: usize,
    pub inserted: usize,
    pub updated: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_report_counts() {
        let mut report = SyncReport::new(Metric::Mean);
        report.record(RowOutcome::Inserted);
        report.record(RowOutcome::Updated);
        report.record(RowOutcome::Unchanged);
        report.failed.push(SyncFailure {
            sku: "X".to_string(),
            reason: "boom".to_string(),
        });

        assert_eq!(report.committed(), 3);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_clean());
    }
}
