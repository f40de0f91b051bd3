use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use clinplan_core::{CellValue, Table};
use thiserror::Error;

/// Bytes inspected when guessing the delimiter.
const SNIFF_BYTES: usize = 1024;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid table: {0}")]
    Table(#[from] clinplan_core::Error),
}

/// Load a TSV or CSV file into a table.
pub fn load_table(path: &Path) -> Result<Table, DatasetError> {
    let mut file = BufReader::new(File::open(path)?);
    let mut sample = Vec::with_capacity(SNIFF_BYTES);
    (&mut file)
        .take(SNIFF_BYTES as u64)
        .read_to_end(&mut sample)?;
    let delimiter = detect_delimiter(&sample);

    let reader = std::io::Cursor::new(sample).chain(file);
    read_table(reader, delimiter)
}

/// Dataset name derived from the file stem.
pub fn dataset_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string())
}

/// Tab when the sample has more tabs than commas, comma otherwise.
pub fn detect_delimiter(sample: &[u8]) -> u8 {
    let tabs = sample.iter().filter(|byte| **byte == b'\t').count();
    let commas = sample.iter().filter(|byte| **byte == b',').count();
    if tabs > commas { b'\t' } else { b',' }
}

pub fn read_table<R: Read>(reader: R, delimiter: u8) -> Result<Table, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .from_reader(reader);

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(CellValue::from_raw).collect());
    }

    Ok(Table::new(columns, rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinplan_core::{VariableKind, infer_schema};

    #[test]
    fn detects_tabs_and_commas() {
        assert_eq!(detect_delimiter(b"a\tb\tc\n1\t2\t3"), b'\t');
        assert_eq!(detect_delimiter(b"a,b,c\n1,2,3"), b',');
        assert_eq!(detect_delimiter(b""), b',');
    }

    #[test]
    fn reads_tsv_with_missing_markers() {
        let data = "SAMPLE\tTP53_Mutation\tOS_MONTHS\tOS_STATUS\n\
                    S1\tMutated\t12.5\t1\n\
                    S2\tWild Type\tNA\t0\n\
                    S3\t\tNaN\t1\n";
        let table = read_table(data.as_bytes(), b'\t').expect("table");
        assert_eq!(table.row_count(), 3);

        let months = table.column_values("OS_MONTHS").expect("column");
        assert!(months[1].is_missing());
        assert!(months[2].is_missing());

        let schema = infer_schema("demo", &table).expect("schema");
        assert_eq!(schema.kind("OS_MONTHS"), Some(VariableKind::Time));
        assert_eq!(schema.observed_values("TP53_Mutation"), ["Mutated", "Wild Type"]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let data = "A,B\n1,2\n3\n";
        assert!(read_table(data.as_bytes(), b',').is_err());
    }
}
