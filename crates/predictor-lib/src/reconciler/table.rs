//! Schema-flexible metrics table
//!
//! Profiler reports differ in which columns they carry depending on the
//! platform and tool version, so the table is stored column-major and
//! every access goes through a presence check by name.

use anyhow::{Context, Result};
use std::io::{Read, Write};
use std::path::Path;

/// A named column of raw cell values
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<String>,
}

/// Table of named text columns, one row per profiled function
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetricsTable {
    columns: Vec<Column>,
    rows: usize,
}

impl RawMetricsTable {
    /// Build a table from named columns, padding short columns with empty cells
    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<String>)>,
        S: Into<String>,
    {
        let mut columns: Vec<Column> = columns
            .into_iter()
            .map(|(name, values)| Column {
                name: name.into(),
                values,
            })
            .collect();
        let rows = columns.iter().map(|c| c.values.len()).max().unwrap_or(0);
        for column in &mut columns {
            column.values.resize(rows, String::new());
        }
        Self { columns, rows }
    }

    /// Parse a delimited table with a header row
    ///
    /// Rows with fewer cells than the header are padded with empty cells and
    /// cells beyond the header width are ignored.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .context("Failed to read report header")?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                // Reports exported on Windows may start with a byte order mark
                let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
                h.to_string()
            })
            .collect();

        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|name| Column {
                name,
                values: Vec::new(),
            })
            .collect();

        let mut rows = 0;
        for record in rdr.records() {
            let record = record.with_context(|| format!("Failed to read report row {}", rows + 1))?;
            for (i, column) in columns.iter_mut().enumerate() {
                column.values.push(record.get(i).unwrap_or_default().to_string());
            }
            rows += 1;
        }

        Ok(Self { columns, rows })
    }

    /// Read a delimited table from a file
    pub fn read_delimited(path: &Path, delimiter: u8) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Self::from_reader(file, delimiter)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Values of the first column with the given name
    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Overwrite a column in place, or append it when absent
    pub fn set_column(&mut self, name: &str, mut values: Vec<String>) {
        values.resize(self.rows, String::new());
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => column.values = values,
            None => self.columns.push(Column {
                name: name.to_string(),
                values,
            }),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Write the table as comma-delimited CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        for row in 0..self.rows {
            wtr.write_record(self.columns.iter().map(|c| c.values[row].as_str()))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv_path(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.write_csv(file)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tab_delimited() {
        let data = "Function\tCPU Time\tModule\nmain\t1.5\tapp\nhelper\t0.25\tlibc.so\n";
        let table = RawMetricsTable::from_reader(data.as_bytes(), b'\t').unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_names(), vec!["Function", "CPU Time", "Module"]);
        assert_eq!(table.column("CPU Time").unwrap(), &["1.5", "0.25"]);
        assert!(table.column("Clockticks").is_none());
    }

    #[test]
    fn test_short_rows_are_padded() {
        let data = "Function\tCPU Time\tClockticks\nmain\t1.5\n";
        let table = RawMetricsTable::from_reader(data.as_bytes(), b'\t').unwrap();
        assert_eq!(table.column("Clockticks").unwrap(), &[""]);
    }

    #[test]
    fn test_byte_order_mark_stripped() {
        let data = "\u{feff}Function,CPU Time\nmain,1\n";
        let table = RawMetricsTable::from_reader(data.as_bytes(), b',').unwrap();
        assert!(table.has_column("Function"));
    }

    #[test]
    fn test_set_column_overwrites_and_appends() {
        let mut table = RawMetricsTable::from_columns(vec![(
            "CPU Time",
            vec!["1".to_string(), "2".to_string()],
        )]);
        table.set_column("CPU Time", vec!["3".to_string(), "4".to_string()]);
        table.set_column("Retiring(%)", vec!["0.5".to_string()]);
        assert_eq!(table.column("CPU Time").unwrap(), &["3", "4"]);
        assert_eq!(table.column("Retiring(%)").unwrap(), &["0.5", ""]);
        assert_eq!(table.columns().len(), 2);
    }

    #[test]
    fn test_csv_output_quotes_commas() {
        let table = RawMetricsTable::from_columns(vec![
            ("Function / Call Stack", vec!["foo(int, char)".to_string()]),
            ("CPU Time", vec!["1.0".to_string()]),
        ]);
        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "Function / Call Stack,CPU Time\n\"foo(int, char)\",1.0\n");

        let reparsed = RawMetricsTable::from_reader(text.as_bytes(), b',').unwrap();
        assert_eq!(reparsed, table);
    }
}
