//! Specification limit rows read from CSV (`sku,lsl,usl`)

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::core::measurement::build_header_map;
use crate::core::metric::StatMap;
use crate::core::stats::SpecLimits;

#[derive(Debug, Error, Diagnostic)]
pub enum LimitsError {
    #[error("Failed to open limits file {path}: {message}")]
    #[diagnostic(code(sigstat::limits::io))]
    Io { path: PathBuf, message: String },

    #[error("CSV parse error at row {row}: {message}")]
    #[diagnostic(code(sigstat::limits::csv))]
    Csv { row: usize, message: String },

    #[error("Missing required column 'sku'")]
    #[diagnostic(code(sigstat::limits::missing_column), help("Expected header: sku,lsl,usl"))]
    MissingSkuColumn,

    #[error("Row {row}: invalid {column} '{raw}' for SKU '{sku}'")]
    #[diagnostic(code(sigstat::limits::invalid_value))]
    InvalidValue {
        row: usize,
        sku: String,
        column: &'static str,
        raw: String,
    },

    #[error("Row {row}: missing SKU")]
    #[diagnostic(code(sigstat::limits::missing_sku))]
    MissingSku { row: usize },

    #[error("Row {row}: LSL {lsl} is above USL {usl} for SKU '{sku}'")]
    #[diagnostic(code(sigstat::limits::inverted))]
    Inverted {
        row: usize,
        sku: String,
        lsl: f64,
        usl: f64,
    },
}

/// Limits for one SKU; a blank cell means no limit on that side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitRow {
    pub sku: String,
    pub lsl: Option<f64>,
    pub usl: Option<f64>,
}

impl SpecLimits {
    /// Build the limit maps from CSV rows; later rows win for a repeated SKU
    pub fn from_rows(rows: &[LimitRow]) -> Self {
        let mut lsl = StatMap::new();
        let mut usl = StatMap::new();
        for row in rows {
            match row.lsl {
                Some(v) => lsl.insert(row.sku.clone(), v),
                None => lsl.remove(&row.sku),
            };
            match row.usl {
                Some(v) => usl.insert(row.sku.clone(), v),
                None => usl.remove(&row.sku),
            };
        }
        SpecLimits::new(lsl, usl)
    }

    /// One row per SKU that has at least one limit, ordered by SKU
    pub fn to_rows(&self) -> Vec<LimitRow> {
        let skus: std::collections::BTreeSet<&String> =
            self.lsl.keys().chain(self.usl.keys()).collect();
        skus.into_iter()
            .map(|sku| LimitRow {
                sku: sku.clone(),
                lsl: self.lsl.get(sku).copied(),
                usl: self.usl.get(sku).copied(),
            })
            .collect()
    }
}

pub fn read_limits_csv(path: &Path) -> Result<Vec<LimitRow>, LimitsError> {
    let file = File::open(path).map_err(|e| LimitsError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    read_limits(BufReader::new(file))
}

pub fn read_limits<R: Read>(reader: R) -> Result<Vec<LimitRow>, LimitsError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| LimitsError::Csv {
            row: 1,
            message: e.to_string(),
        })?
        .clone();
    let header_map = build_header_map(&headers);
    let sku_idx = *header_map.get("sku").ok_or(LimitsError::MissingSkuColumn)?;
    let lsl_idx = header_map.get("lsl").copied();
    let usl_idx = header_map.get("usl").copied();

    let mut rows = Vec::new();
    for (row_idx, result) in rdr.records().enumerate() {
        let row_num = row_idx + 2;
        let record = result.map_err(|e| LimitsError::Csv {
            row: row_num,
            message: e.to_string(),
        })?;

        let sku = record.get(sku_idx).unwrap_or_default().to_string();
        if sku.is_empty() {
            return Err(LimitsError::MissingSku { row: row_num });
        }

        let cell = |idx: Option<usize>, column: &'static str| -> Result<Option<f64>, LimitsError> {
            let raw = idx.and_then(|i| record.get(i)).unwrap_or_default();
            if raw.is_empty() {
                return Ok(None);
            }
            match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Some(v)),
                _ => Err(LimitsError::InvalidValue {
                    row: row_num,
                    sku: sku.clone(),
                    column,
                    raw: raw.to_string(),
                }),
            }
        };
        let lsl = cell(lsl_idx, "lsl")?;
        let usl = cell(usl_idx, "usl")?;

        if let (Some(lsl), Some(usl)) = (lsl, usl) {
            if lsl > usl {
                return Err(LimitsError::Inverted {
                    row: row_num,
                    sku,
                    lsl,
                    usl,
                });
            }
        }

        rows.push(LimitRow { sku, lsl, usl });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_limits() {
        let csv = "SKU,LSL,USL\nOchk 70g,62.00,68.00\nRchk 120g,,122\n";
        let rows = read_limits(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            LimitRow {
                sku: "Ochk 70g".to_string(),
                lsl: Some(62.0),
                usl: Some(68.0)
            }
        );
        assert_eq!(rows[1].lsl, None);
        assert_eq!(rows[1].usl, Some(122.0));
    }

    #[test]
    fn test_read_limits_only_usl_column() {
        let rows = read_limits("sku,usl\nA,10\n".as_bytes()).unwrap();
        assert_eq!(rows[0].lsl, None);
        assert_eq!(rows[0].usl, Some(10.0));
    }

    #[test]
    fn test_read_limits_rejects_text() {
        let err = read_limits("sku,lsl,usl\nA,low,10\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LimitsError::InvalidValue { row: 2, column: "lsl", .. }));
    }

    #[test]
    fn test_read_limits_rejects_inverted() {
        let err = read_limits("sku,lsl,usl\nA,10,5\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LimitsError::Inverted { .. }));
    }

    #[test]
    fn test_spec_limits_from_and_to_rows() {
        let rows = read_limits("sku,lsl,usl\nB,,9\nA,5,20\nA,6,\n".as_bytes()).unwrap();
        let limits = SpecLimits::from_rows(&rows);

        assert_eq!(limits.lsl["A"], 6.0);
        assert!(!limits.usl.contains_key("A"));
        assert_eq!(limits.usl["B"], 9.0);

        let back = limits.to_rows();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].sku, "A");
        assert_eq!(back[1].lsl, None);
    }

    #[test]
    fn test_read_limits_requires_sku_column() {
        let err = read_limits("part,lsl,usl\nA,1,2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LimitsError::MissingSkuColumn));
    }
}
