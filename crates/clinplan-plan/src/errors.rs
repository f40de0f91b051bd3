use thiserror::Error;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// Structured validation issue with location and hint.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub code: String,
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ValidationIssue {
    /// Create a new validation issue.
    pub fn new(
        severity: IssueSeverity,
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            path: path.into(),
            message: message.into(),
            hint,
        }
    }
}

/// Aggregated validation report with errors and warnings.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Returns true when there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error issue.
    pub fn push_error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    /// Add a warning issue.
    pub fn push_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }
}

/// A condition string whose clauses cannot be merged into one predicate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("ambiguous condition: disjunction spans different columns ({})", .columns.join(", "))]
    AmbiguousCondition { columns: Vec<String> },
}

/// Candidate plan could not be turned into a structured plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("malformed plan: {reason} (raw: {excerpt:?})")]
    MalformedPlan { reason: String, excerpt: String },
    #[error("{field}: {source}")]
    Condition {
        field: String,
        #[source]
        source: ConditionError,
    },
}

/// Reasons the safety validator refuses a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(
        "unsupported analysis mode '{mode}'. supported modes: survival, case_control, association_scan"
    )]
    UnsupportedMode { mode: String },
    #[error("{mode} analysis requires '{field}'")]
    MissingField { mode: String, field: String },
    #[error("{field} '{value}' not found in dataset. available columns: {}", .available.join(", "))]
    UnknownColumn {
        field: String,
        value: String,
        available: Vec<String>,
    },
    #[error("{field} '{value}' should be {expected}, but detected as {found}")]
    TypeMismatch {
        field: String,
        value: String,
        expected: String,
        found: String,
    },
}

impl ValidationError {
    /// Stable machine-readable code for reports.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::UnsupportedMode { .. } => "unsupported_mode",
            ValidationError::MissingField { .. } => "missing_field",
            ValidationError::UnknownColumn { .. } => "unknown_column",
            ValidationError::TypeMismatch { .. } => "type_mismatch",
        }
    }

    /// Name of the plan field that was rejected.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::UnsupportedMode { .. } => "mode",
            ValidationError::MissingField { field, .. }
            | ValidationError::UnknownColumn { field, .. }
            | ValidationError::TypeMismatch { field, .. } => field.as_str(),
        }
    }

    /// Convert into a report issue with a JSON-pointer-ish path and a hint.
    pub fn to_issue(&self) -> ValidationIssue {
        let hint = match self {
            ValidationError::UnsupportedMode { .. } => {
                Some("use one of: survival, case_control, association_scan".to_string())
            }
            ValidationError::MissingField { field, .. } => {
                Some(format!("set '{field}' to a dataset column"))
            }
            ValidationError::UnknownColumn { .. } => {
                Some("pick a column from the available list".to_string())
            }
            ValidationError::TypeMismatch { .. } => None,
        };
        ValidationIssue::new(
            IssueSeverity::Error,
            self.code(),
            field_pointer(self.field()),
            self.to_string(),
            hint,
        )
    }
}

fn field_pointer(field: &str) -> String {
    let mut pointer = String::new();
    for part in field.split('.') {
        pointer.push('/');
        match part.split_once('[') {
            Some((name, rest)) => {
                pointer.push_str(name);
                pointer.push('/');
                pointer.push_str(rest.trim_end_matches(']'));
            }
            None => pointer.push_str(part),
        }
    }
    pointer
}

/// Plan file errors that are not validation verdicts.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("schema error: {0}")]
    Schema(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_column_message_lists_available_columns() {
        let err = ValidationError::UnknownColumn {
            field: "target_variable".to_string(),
            value: "BRAF_status".to_string(),
            available: vec!["OS_MONTHS".to_string(), "OS_STATUS".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "target_variable 'BRAF_status' not found in dataset. available columns: OS_MONTHS, OS_STATUS"
        );
    }

    #[test]
    fn issue_paths_follow_field_names() {
        let err = ValidationError::UnknownColumn {
            field: "filters[2].column".to_string(),
            value: "AGE".to_string(),
            available: Vec::new(),
        };
        let issue = err.to_issue();
        assert_eq!(issue.code, "unknown_column");
        assert_eq!(issue.path, "/filters/2/column");
        assert_eq!(issue.severity, IssueSeverity::Error);
    }
}
