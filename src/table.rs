//! Loading of the label CSV and validation of its header row.

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::config::open_file_with_context;
use crate::error::ValidationError;

/// Column names every input table must carry. Matching is case-sensitive.
pub const REQUIRED_COLUMNS: [&str; 3] = ["project", "ID", "lid"];

pub struct DataRow {
    pub data: HashMap<String, String>,
}

/// A parsed CSV file: its header row plus every data row keyed by column name.
pub struct InputTable {
    pub columns: Vec<String>,
    pub rows: Vec<DataRow>,
}

/// The three values a label is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub project: String,
    pub id: String,
    /// Payload of the QR symbol.
    pub lid: String,
}

impl InputTable {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = rdr.headers().context("Failed to read CSV header row")?.clone();

        let mut rows = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.with_context(|| format!("Failed to read CSV row {}", line + 1))?;
            let mut data = HashMap::new();
            for (i, header) in headers.iter().enumerate() {
                data.insert(header.to_string(), record.get(i).unwrap_or("").to_string());
            }
            rows.push(DataRow { data });
        }

        Ok(Self {
            columns: headers.iter().map(str::to_string).collect(),
            rows,
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| !self.columns.iter().any(|c| c == *name))
            .map(|name| name.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { missing })
        }
    }

    /// Validate the header row, then project every row onto a [`Record`].
    pub fn records(&self) -> Result<Vec<Record>, ValidationError> {
        self.validate()?;

        let cell = |row: &DataRow, name: &str| row.data.get(name).cloned().unwrap_or_default();
        Ok(self
            .rows
            .iter()
            .map(|row| Record {
                project: cell(row, "project"),
                id: cell(row, "ID"),
                lid: cell(row, "lid"),
            })
            .collect())
    }
}

pub fn load_csv_data(path: &Path) -> Result<InputTable> {
    let file = open_file_with_context(path, "input CSV")?;
    InputTable::from_reader(file).with_context(|| format!("Failed to parse {:?}", path))
}
