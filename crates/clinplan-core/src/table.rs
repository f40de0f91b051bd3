use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single scalar cell of a row-oriented table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    /// Parse raw text the way a delimited file reader sees it.
    ///
    /// Empty cells and the usual `NA`/`NaN` markers are missing; anything that
    /// parses as a finite float is numeric.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || is_missing_marker(trimmed) {
            return CellValue::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(number) if number.is_finite() => CellValue::Number(number),
            _ => CellValue::Text(trimmed.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, CellValue::Number(_))
    }

    /// Canonical text form used for observed-value sets.
    pub fn render(&self) -> Option<String> {
        match self {
            CellValue::Number(number) => Some(render_number(*number)),
            CellValue::Text(text) => Some(text.clone()),
            CellValue::Missing => None,
        }
    }
}

/// Render a number without a trailing `.0` for integral values.
pub fn render_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

fn is_missing_marker(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "na" | "nan" | "n/a" | "null" | "none"
    )
}

/// Row-oriented table with named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Build a table, rejecting duplicate headers and ragged rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        let columns: Vec<String> = columns
            .into_iter()
            .map(|name| name.trim().to_string())
            .collect();

        let mut seen = BTreeSet::new();
        for name in &columns {
            if name.is_empty() {
                return Err(Error::InvalidTable("empty column header".to_string()));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::InvalidTable(format!("duplicate column name: {name}")));
            }
        }

        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(Error::InvalidTable(format!(
                    "row {idx} has {} cells, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Iterate over every cell of the named column.
    pub fn column_values(&self, name: &str) -> Option<Vec<&CellValue>> {
        let idx = self.columns.iter().position(|column| column == name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }
}
