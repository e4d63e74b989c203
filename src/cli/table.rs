//! Table formatting for list-style command output
//!
//! Text formats (tsv, csv, md, terminal tables) render from string cells.
//! JSON and YAML render from the typed rows so numbers stay numbers.

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{escape_csv, stdout_is_term};
use crate::cli::OutputFormat;

/// Headers plus pre-formatted rows
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&'static str]) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render for a text format; `Auto` is a boxed table on a terminal, tsv otherwise
    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Csv => self.delimited(",", true),
            OutputFormat::Md => self.styled(true),
            OutputFormat::Auto if stdout_is_term() => self.styled(false),
            _ => self.delimited("\t", false),
        }
    }

    fn delimited(&self, sep: &str, csv: bool) -> String {
        let cell = |s: &str| if csv { escape_csv(s) } else { s.to_string() };
        let mut out = String::new();
        out.push_str(&self.headers.join(sep));
        out.push('\n');
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|c| cell(c)).collect();
            out.push_str(&cells.join(sep));
            out.push('\n');
        }
        out
    }

    fn styled(&self, markdown: bool) -> String {
        let mut builder = Builder::default();
        builder.push_record(self.headers.iter().copied());
        for row in &self.rows {
            builder.push_record(row.iter().cloned());
        }
        let mut table = builder.build();
        if markdown {
            table.with(Style::markdown());
        } else {
            table.with(Style::rounded());
        }
        format!("{}\n", table)
    }
}

/// Serialize typed rows for the structured formats, `None` for text formats
pub fn render_structured<T: Serialize + ?Sized>(
    value: &T,
    format: OutputFormat,
) -> Result<Option<String>> {
    match format {
        OutputFormat::Json => {
            let mut out = serde_json::to_string_pretty(value).into_diagnostic()?;
            out.push('\n');
            Ok(Some(out))
        }
        OutputFormat::Yaml => Ok(Some(serde_yml::to_string(value).into_diagnostic()?)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new(&["sku", "mean"]);
        table.push_row(vec!["A".to_string(), "12.00".to_string()]);
        table.push_row(vec!["B, bulk".to_string(), "-".to_string()]);
        table
    }

    #[test]
    fn test_render_tsv() {
        assert_eq!(
            sample().render(OutputFormat::Tsv),
            "sku\tmean\nA\t12.00\nB, bulk\t-\n"
        );
    }

    #[test]
    fn test_render_csv_escapes() {
        assert_eq!(
            sample().render(OutputFormat::Csv),
            "sku,mean\nA,12.00\n\"B, bulk\",-\n"
        );
    }

    #[test]
    fn test_render_markdown() {
        let md = sample().render(OutputFormat::Md);
        assert!(md.starts_with("| sku"));
        assert!(md.contains("| A "));
    }

    #[test]
    fn test_render_structured() {
        #[derive(Serialize)]
        struct Row {
            sku: &'static str,
            mean: Option<f64>,
        }
        let rows = [Row { sku: "A", mean: Some(12.0) }];

        let json = render_structured(&rows[..], OutputFormat::Json).unwrap().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["mean"], 12.0);

        assert!(render_structured(&rows[..], OutputFormat::Tsv).unwrap().is_none());
    }
}
