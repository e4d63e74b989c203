//! One pipeline run: measurements -> limits -> statistics -> store

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::core::config::Config;
use crate::core::measurement::{MeasurementError, MeasurementTable};
use crate::core::metric::Metric;
use crate::core::stats::{self, CapabilitySummary, StatsError};
use crate::core::store::{SpecStore, StoreError, SyncReport};

#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("No measurement source configured")]
    #[diagnostic(
        code(sigstat::pipeline::no_source),
        help("Pass --measurements <csv>, or set `measurements` or SIGSTAT_MEASUREMENTS")
    )]
    MissingMeasurements,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Measurement(#[from] MeasurementError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Stats(#[from] StatsError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a full pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub measurements: usize,
    pub summary: CapabilitySummary,
    pub syncs: Vec<SyncReport>,
}

impl PipelineReport {
    /// Rows that failed across all metric syncs
    pub fn failed_rows(&self) -> usize {
        self.syncs.iter().map(|s| s.failed.len()).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.syncs.iter().all(SyncReport::is_clean)
    }
}

/// Run the pipeline once with the sources named in `config`
pub fn run_pipeline(config: &Config) -> Result<PipelineReport, PipelineError> {
    let source = config
        .measurements
        .as_deref()
        .ok_or(PipelineError::MissingMeasurements)?;

    log::info!("Reading measurements from {}", source.display());
    let table = MeasurementTable::from_csv_path(source, &config.value_column)?;

    let mut store = SpecStore::from_config(config)?;
    store.init_schema()?;

    run_with(&table, &mut store)
}

/// Run the pipeline on an already loaded table and an open store
pub fn run_with(
    table: &MeasurementTable,
    store: &mut SpecStore,
) -> Result<PipelineReport, PipelineError> {
    let limits = store.load_limits()?;
    let summary = stats::summarize(table, &limits)?;

    let mut syncs = Vec::with_capacity(Metric::ALL.len());
    for metric in Metric::ALL {
        syncs.push(store.sync(metric, summary.metric(metric))?);
    }

    let report = PipelineReport {
        measurements: table.len(),
        summary,
        syncs,
    };

    if report.is_clean() {
        log::info!(
            "Analysis complete: {} measurements, {} SKUs",
            report.measurements,
            report.summary.sku_count()
        );
    } else {
        log::warn!(
            "Analysis complete with {} failed row(s)",
            report.failed_rows()
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::measurement::MeasurementRow;
    use std::fs;
    use tempfile::TempDir;

    fn config_in(tmp: &TempDir) -> Config {
        Config {
            database: tmp.path().join("spec.db"),
            measurements: Some(tmp.path().join("measurements.csv")),
            ..Config::default()
        }
    }

    #[test]
    fn test_run_pipeline_end_to_end() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        fs::write(
            tmp.path().join("measurements.csv"),
            "Sku,Value\nA,10\nA,12\nA,14\nB,5\n",
        )
        .unwrap();

        {
            let mut store = SpecStore::from_config(&config).unwrap();
            store.init_schema().unwrap();
            store.put_limits("A", Some(5.0), Some(20.0)).unwrap();
            store.put_limits("B", Some(1.0), Some(9.0)).unwrap();
        }

        let report = run_pipeline(&config).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.measurements, 4);
        assert_eq!(report.syncs.len(), 4);

        let store = SpecStore::from_config(&config).unwrap();
        let a = store.record("A").unwrap().unwrap();
        assert_eq!(a.mean, Some(12.0));
        assert_eq!(a.variance, Some(2.67));
        assert_eq!(a.std_dev, Some(1.63));
        assert_eq!(a.sigma_level, Some(4.29));
        assert_eq!(a.lsl, Some(5.0));

        let b = store.record("B").unwrap().unwrap();
        assert_eq!(b.variance, Some(0.0));
        assert_eq!(b.std_dev, Some(0.0));
        assert_eq!(b.sigma_level, None);
    }

    #[test]
    fn test_rerun_leaves_store_unchanged() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        fs::write(tmp.path().join("measurements.csv"), "sku,value\nA,1\nA,3\n").unwrap();

        run_pipeline(&config).unwrap();
        let second = run_pipeline(&config).unwrap();

        assert!(second
            .syncs
            .iter()
            .all(|s| s.inserted == 0 && s.updated == 0));
    }

    #[test]
    fn test_float_noise_stores_zero_spread() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let mut store = SpecStore::from_config(&config).unwrap();
        store.init_schema().unwrap();
        store.put_limits("A", Some(0.0), Some(1.0)).unwrap();

        let table: MeasurementTable = vec![
            MeasurementRow::new("A", 0.1 + 0.2),
            MeasurementRow::new("A", 0.3),
        ]
        .into_iter()
        .collect();

        let report = run_with(&table, &mut store).unwrap();
        assert!(report.is_clean());

        let a = store.record("A").unwrap().unwrap();
        assert_eq!(a.mean, Some(0.3));
        assert_eq!(a.std_dev, Some(0.0));
        assert_eq!(a.sigma_level, None);
    }

    #[test]
    fn test_missing_source() {
        let config = Config::default();
        assert!(matches!(
            run_pipeline(&config),
            Err(PipelineError::MissingMeasurements)
        ));
    }

    #[test]
    fn test_invalid_measurement_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let mut store = SpecStore::from_config(&config).unwrap();
        store.init_schema().unwrap();

        let table: MeasurementTable = vec![
            MeasurementRow::new("A", 1.0),
            MeasurementRow::raw("A", "oops"),
        ]
        .into_iter()
        .collect();

        let err = run_with(&table, &mut store).unwrap_err();
        assert!(matches!(err, PipelineError::Stats(StatsError::InvalidMeasurement { .. })));
        assert_eq!(store.count().unwrap(), 0);
    }
}
