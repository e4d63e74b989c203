//! Measurement tables: one row per (SKU, observation)
//!
//! Rows read from a CSV source keep the raw cell text. Parsing into numbers
//! happens in the statistics engine so a malformed cell is reported against
//! its SKU instead of being silently dropped here.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while reading a measurement source
#[derive(Debug, Error, Diagnostic)]
pub enum MeasurementError {
    #[error("Failed to open measurement file {path}: {message}")]
    #[diagnostic(code(sigstat::measurement::io))]
    Io { path: PathBuf, message: String },

    #[error("CSV parse error at row {row}: {message}")]
    #[diagnostic(code(sigstat::measurement::csv))]
    Csv { row: usize, message: String },

    #[error("Missing required column '{column}'")]
    #[diagnostic(
        code(sigstat::measurement::missing_column),
        help("The header row must contain 'sku' and the measurement column (found: {found})")
    )]
    MissingColumn { column: String, found: String },

    #[error("Row {row}: missing SKU")]
    #[diagnostic(code(sigstat::measurement::missing_sku))]
    MissingSku { row: usize },
}

/// A single observed value
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// Already numeric (built in code)
    Value(f64),
    /// Raw cell text from a tabular source
    Raw(String),
}

impl Reading {
    /// Parse into a finite number, returning the raw text on failure
    pub fn parse(&self) -> Result<f64, String> {
        match self {
            Reading::Value(v) if v.is_finite() => Ok(*v),
            Reading::Value(v) => Err(v.to_string()),
            Reading::Raw(s) => match s.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(v),
                _ => Err(s.clone()),
            },
        }
    }
}

/// One observation for one SKU
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRow {
    pub sku: String,
    pub value: Reading,
}

impl MeasurementRow {
    pub fn new(sku: impl Into<String>, value: f64) -> Self {
        Self {
            sku: sku.into(),
            value: Reading::Value(value),
        }
    }

    pub fn raw(sku: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            value: Reading::Raw(raw.into()),
        }
    }
}

/// An unordered multiset of measurement rows
#[derive(Debug, Clone, Default)]
pub struct MeasurementTable {
    rows: Vec<MeasurementRow>,
}

impl MeasurementTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: MeasurementRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[MeasurementRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct SKUs present in the table
    pub fn skus(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.sku.as_str()).collect()
    }

    /// Load a CSV file with a `sku` column and a measurement column
    pub fn from_csv_path(path: &Path, value_column: &str) -> Result<Self, MeasurementError> {
        let file = File::open(path).map_err(|e| MeasurementError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_csv_reader(BufReader::new(file), value_column)
    }

    /// Load measurements from any CSV reader
    ///
    /// Header names are matched case-insensitively. Row numbers in errors
    /// count the header as row 1.
    pub fn from_csv_reader<R: Read>(
        reader: R,
        value_column: &str,
    ) -> Result<Self, MeasurementError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| MeasurementError::Csv {
                row: 1,
                message: e.to_string(),
            })?
            .clone();
        let header_map = build_header_map(&headers);

        let sku_idx = column_index(&header_map, &headers, "sku")?;
        let value_idx = column_index(&header_map, &headers, value_column)?;

        let mut table = Self::new();
        for (row_idx, result) in rdr.records().enumerate() {
            let row_num = row_idx + 2;
            let record = result.map_err(|e| MeasurementError::Csv {
                row: row_num,
                message: e.to_string(),
            })?;

            // Fully blank lines carry no observation
            if record.iter().all(|cell| cell.is_empty()) {
                continue;
            }

            let sku = record.get(sku_idx).unwrap_or_default();
            if sku.is_empty() {
                return Err(MeasurementError::MissingSku { row: row_num });
            }
            let raw = record.get(value_idx).unwrap_or_default();
            table.push(MeasurementRow::raw(sku, raw));
        }

        log::debug!(
            "Read {} measurement rows for {} SKUs",
            table.len(),
            table.skus().len()
        );
        Ok(table)
    }
}

impl FromIterator<MeasurementRow> for MeasurementTable {
    fn from_iter<I: IntoIterator<Item = MeasurementRow>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// Build a map from lowercase header name to column index
pub(crate) fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_lowercase(), i))
        .collect()
}

fn column_index(
    header_map: &HashMap<String, usize>,
    headers: &StringRecord,
    column: &str,
) -> Result<usize, MeasurementError> {
    header_map
        .get(&column.trim().to_lowercase())
        .copied()
        .ok_or_else(|| MeasurementError::MissingColumn {
            column: column.to_string(),
            found: headers.iter().collect::<Vec<_>>().join(", "),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_parse() {
        assert_eq!(Reading::Raw(" 12.5 ".to_string()).parse(), Ok(12.5));
        assert_eq!(Reading::Value(3.0).parse(), Ok(3.0));
        assert_eq!(Reading::Raw("abc".to_string()).parse(), Err("abc".to_string()));
        assert!(Reading::Raw("NaN".to_string()).parse().is_err());
        assert!(Reading::Raw(String::new()).parse().is_err());
        assert!(Reading::Value(f64::INFINITY).parse().is_err());
    }

    #[test]
    fn test_from_csv_case_insensitive_headers() {
        let csv = "Sku,Value\nA,10\nA,12\nB,5\n";
        let table = MeasurementTable::from_csv_reader(csv.as_bytes(), "value").unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.skus().into_iter().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(table.rows()[1], MeasurementRow::raw("A", "12"));
    }

    #[test]
    fn test_from_csv_custom_value_column() {
        let csv = "weight_g,sku\n65.1,Ochk 70g\n";
        let table = MeasurementTable::from_csv_reader(csv.as_bytes(), "weight_g").unwrap();
        assert_eq!(table.rows()[0], MeasurementRow::raw("Ochk 70g", "65.1"));
    }

    #[test]
    fn test_from_csv_header_only_is_empty() {
        let table = MeasurementTable::from_csv_reader("sku,value\n".as_bytes(), "value").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_from_csv_missing_column() {
        let err = MeasurementTable::from_csv_reader("sku,weight\nA,1\n".as_bytes(), "value")
            .unwrap_err();
        assert!(matches!(
            err,
            MeasurementError::MissingColumn { ref column, .. } if column == "value"
        ));
    }

    #[test]
    fn test_from_csv_missing_sku_reports_row() {
        let err = MeasurementTable::from_csv_reader("sku,value\nA,1\n,2\n".as_bytes(), "value")
            .unwrap_err();
        assert!(matches!(err, MeasurementError::MissingSku { row: 3 }));
    }

    #[test]
    fn test_from_csv_keeps_malformed_values_raw() {
        let table =
            MeasurementTable::from_csv_reader("sku,value\nA,n/a\n".as_bytes(), "value").unwrap();
        assert_eq!(table.rows()[0].value, Reading::Raw("n/a".to_string()));
    }
}
