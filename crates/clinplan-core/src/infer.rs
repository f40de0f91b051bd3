use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::schema::{DatasetSchema, Variable, VariableKind};
use crate::table::{CellValue, Table};

/// Maximum number of distinct values tracked per column.
pub const DISTINCT_VALUE_LIMIT: usize = 64;

/// Infer a dataset schema from a table's headers and column values.
///
/// Kinds come from the value type, refined by name heuristics:
/// - "month"/"time" in the name => `time`
/// - "status"/"event" in the name => `event` (wins over `time`)
///
/// Otherwise all-numeric columns are `continuous` and everything else is
/// `categorical`.
pub fn infer_schema(name: impl Into<String>, table: &Table) -> Result<DatasetSchema> {
    if table.columns().is_empty() {
        return Err(Error::EmptySchema);
    }

    let mut variables = Vec::with_capacity(table.columns().len());
    for column in table.columns() {
        let cells = table
            .column_values(column)
            .ok_or_else(|| Error::InvalidTable(format!("column vanished: {column}")))?;

        let kind = infer_kind(column, &cells);
        let (observed, high_cardinality) = collect_observed(&cells);

        let mut variable = Variable::new(column.clone(), kind).with_observed_values(observed);
        variable.high_cardinality = high_cardinality;
        variables.push(variable);
    }

    Ok(DatasetSchema::new(name, variables))
}

/// Infer the kind of a single column from its name and cells.
pub fn infer_kind(column: &str, cells: &[&CellValue]) -> VariableKind {
    let lowered = column.to_lowercase();
    if lowered.contains("status") || lowered.contains("event") {
        return VariableKind::Event;
    }
    if lowered.contains("month") || lowered.contains("time") {
        return VariableKind::Time;
    }

    let mut present = cells.iter().filter(|cell| !cell.is_missing()).peekable();
    if present.peek().is_none() {
        return VariableKind::Categorical;
    }
    if present.all(|cell| cell.is_number()) {
        VariableKind::Continuous
    } else {
        VariableKind::Categorical
    }
}

fn collect_observed(cells: &[&CellValue]) -> (BTreeSet<String>, bool) {
    let mut observed = BTreeSet::new();
    for cell in cells {
        if let Some(value) = cell.render() {
            observed.insert(value);
            if observed.len() > DISTINCT_VALUE_LIMIT {
                return (BTreeSet::new(), true);
            }
        }
    }
    (observed, false)
}
