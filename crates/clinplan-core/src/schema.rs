use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Statistical role inferred for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Categorical,
    Continuous,
    Time,
    Event,
}

impl VariableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableKind::Categorical => "categorical",
            VariableKind::Continuous => "continuous",
            VariableKind::Time => "time",
            VariableKind::Event => "event",
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column metadata captured when the dataset is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Variable {
    /// Canonical column name as it appears in the table header.
    pub name: String,
    pub kind: VariableKind,
    /// Sorted distinct values seen in the column (empty when high-cardinality).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub observed_values: Vec<String>,
    /// True when the column had too many distinct values to track.
    #[serde(default)]
    pub high_cardinality: bool,
}

impl Variable {
    pub fn new(name: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            name: name.into(),
            kind,
            observed_values: Vec::new(),
            high_cardinality: false,
        }
    }

    pub fn with_observed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values: Vec<String> = values.into_iter().map(Into::into).collect();
        values.sort();
        values.dedup();
        self.observed_values = values;
        self
    }
}

/// Immutable snapshot of a dataset's columns and their inferred kinds.
///
/// Built once per dataset load and shared by reference with every planning
/// stage; nothing downstream mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DatasetSchema {
    /// Dataset name (usually the directory or file stem).
    pub name: String,
    /// Variables keyed by canonical column name.
    pub variables: BTreeMap<String, Variable>,
}

impl DatasetSchema {
    pub fn new(name: impl Into<String>, variables: impl IntoIterator<Item = Variable>) -> Self {
        Self {
            name: name.into(),
            variables: variables
                .into_iter()
                .map(|variable| (variable.name.clone(), variable))
                .collect(),
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.variables.contains_key(column)
    }

    pub fn variable(&self, column: &str) -> Option<&Variable> {
        self.variables.get(column)
    }

    pub fn kind(&self, column: &str) -> Option<VariableKind> {
        self.variables.get(column).map(|variable| variable.kind)
    }

    /// Observed values of a column; empty for unknown or high-cardinality columns.
    pub fn observed_values(&self, column: &str) -> &[String] {
        self.variables
            .get(column)
            .map(|variable| variable.observed_values.as_slice())
            .unwrap_or(&[])
    }

    /// Column names in sorted order.
    pub fn column_names(&self) -> Vec<&str> {
        self.variables.keys().map(String::as_str).collect()
    }

    /// Sorted, owned column names for error payloads.
    pub fn sorted_columns(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }

    /// Up to `limit` observed values for each categorical column.
    pub fn categorical_samples(&self, limit: usize) -> Vec<(&str, &[String])> {
        self.variables
            .values()
            .filter(|variable| variable.kind == VariableKind::Categorical)
            .filter(|variable| !variable.observed_values.is_empty())
            .map(|variable| {
                let end = variable.observed_values.len().min(limit);
                (variable.name.as_str(), &variable.observed_values[..end])
            })
            .collect()
    }
}
