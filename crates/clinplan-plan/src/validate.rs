use clinplan_core::{DatasetSchema, VariableKind};
use jsonschema::JSONSchema;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::{
    IssueSeverity, PlanError, ValidationError, ValidationIssue, ValidationReport,
    VerificationError,
};
use crate::model::{AnalysisMode, AnalysisPlan, ConditionExpression};
use crate::schema::plan_json_schema_value;
use crate::verify::verify;

/// A plan that passed the safety validator.
///
/// Only [`accept`] builds one, and it is neither `Clone` nor mutable, so the
/// executor receives exactly the plan that was checked, once.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct AcceptedPlan {
    plan: AnalysisPlan,
}

impl AcceptedPlan {
    pub fn plan(&self) -> &AnalysisPlan {
        &self.plan
    }

    pub fn into_inner(self) -> AnalysisPlan {
        self.plan
    }
}

/// Accepted plan with accumulated warnings.
#[derive(Debug)]
pub struct CheckedPlan {
    pub plan: AcceptedPlan,
    pub warnings: Vec<ValidationIssue>,
}

/// Check a plan against the schema, stopping at the first violation.
pub fn validate(plan: &AnalysisPlan, schema: &DatasetSchema) -> Result<(), ValidationError> {
    match violations(plan, schema).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Validate and wrap the plan for the executor.
pub fn accept(plan: AnalysisPlan, schema: &DatasetSchema) -> Result<AcceptedPlan, ValidationError> {
    match validate(&plan, schema) {
        Ok(()) => {
            info!(event = "plan_accepted", mode = %plan.mode);
            Ok(AcceptedPlan { plan })
        }
        Err(err) => {
            warn!(
                event = "plan_rejected",
                mode = %plan.mode,
                code = err.code(),
                field = err.field(),
                error = %err
            );
            Err(err)
        }
    }
}

/// Every violation of the plan, in rule order.
pub fn violations(plan: &AnalysisPlan, schema: &DatasetSchema) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mode = plan.mode.as_str().to_string();
    match &plan.mode {
        AnalysisMode::Unsupported(raw) => {
            errors.push(ValidationError::UnsupportedMode { mode: raw.clone() });
            return errors;
        }
        AnalysisMode::Survival => {
            require_column(
                &mut errors,
                &mode,
                "grouping_variable",
                plan.grouping_variable.as_deref(),
                schema,
            );
            if check_column(&mut errors, "time_col", &plan.time_col, schema) {
                check_time_kind(&mut errors, &plan.time_col, schema);
            }
            check_column(&mut errors, "event_col", &plan.event_col, schema);
        }
        AnalysisMode::CaseControl | AnalysisMode::AssociationScan => {
            require_column(
                &mut errors,
                &mode,
                "target_variable",
                plan.target_variable.as_deref(),
                schema,
            );
        }
    }

    if let Some(condition) = &plan.case_condition {
        check_condition(&mut errors, "case_condition", condition, schema);
    }
    if let Some(condition) = &plan.control_condition {
        check_condition(&mut errors, "control_condition", condition, schema);
    }
    for (idx, filter) in plan.filters.iter().enumerate() {
        check_condition(&mut errors, &format!("filters[{idx}]"), filter, schema);
    }

    errors
}

/// Validation report with one issue per violation.
pub fn validate_plan_against_schema(plan: &AnalysisPlan, schema: &DatasetSchema) -> ValidationReport {
    let mut report = ValidationReport::default();
    for err in violations(plan, schema) {
        report.push_error(err.to_issue());
    }

    if plan.mode == AnalysisMode::Survival {
        let grouping = plan
            .grouping_variable
            .as_deref()
            .and_then(|column| schema.variable(column));
        if let Some(variable) = grouping {
            let numeric = matches!(variable.kind, VariableKind::Continuous | VariableKind::Time);
            if numeric || variable.high_cardinality {
                report.push_warning(ValidationIssue::new(
                    IssueSeverity::Warning,
                    "grouping_not_categorical",
                    "/grouping_variable",
                    format!(
                        "grouping_variable '{}' ({}) does not look categorical",
                        variable.name, variable.kind
                    ),
                    Some("group survival curves by a categorical column".to_string()),
                ));
            }
        }
    }

    report
}

/// Validate a plan JSON document against the plan JSON Schema.
pub fn validate_plan_json(
    plan_json: &Value,
    plan_schema: &Value,
) -> Result<ValidationReport, PlanError> {
    let compiled =
        JSONSchema::compile(plan_schema).map_err(|err| PlanError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();

    if let Err(errors) = compiled.validate(plan_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "schema_violation",
                path,
                error.to_string(),
                None,
            ));
        }
    }

    Ok(report)
}

/// Verify a candidate plan document end-to-end, returning structured issues
/// on failure.
///
/// The candidate is verified first so legacy field names and string
/// conditions are normalised; the canonical plan is then checked against the
/// published plan JSON Schema and finally against the dataset schema.
pub fn check_plan(
    candidate: &Value,
    schema: &DatasetSchema,
) -> Result<CheckedPlan, ValidationReport> {
    let plan = verify(candidate, schema).map_err(|err| single_issue(verification_issue(&err)))?;

    let structural = serde_json::to_value(&plan)
        .map_err(PlanError::from)
        .and_then(|plan_json| {
            let plan_schema = plan_json_schema_value()?;
            validate_plan_json(&plan_json, &plan_schema)
        })
        .map_err(|err| {
            single_issue(ValidationIssue::new(
                IssueSeverity::Error,
                "schema_validation_error",
                "/",
                err.to_string(),
                None,
            ))
        })?;
    if !structural.is_ok() {
        return Err(structural);
    }

    let report = validate_plan_against_schema(&plan, schema);
    if !report.is_ok() {
        return Err(report);
    }

    let plan = accept(plan, schema).map_err(|err| single_issue(err.to_issue()))?;
    Ok(CheckedPlan {
        plan,
        warnings: report.warnings,
    })
}

fn single_issue(issue: ValidationIssue) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.push_error(issue);
    report
}

fn verification_issue(err: &VerificationError) -> ValidationIssue {
    match err {
        VerificationError::MalformedPlan { .. } => ValidationIssue::new(
            IssueSeverity::Error,
            "malformed_plan",
            "/",
            err.to_string(),
            Some("provide a JSON object with at least a 'mode' field".to_string()),
        ),
        VerificationError::Condition { field, .. } => ValidationIssue::new(
            IssueSeverity::Error,
            "ambiguous_condition",
            format!("/{field}"),
            err.to_string(),
            Some("split the condition or use one column per disjunction".to_string()),
        ),
    }
}

fn require_column(
    errors: &mut Vec<ValidationError>,
    mode: &str,
    field: &str,
    value: Option<&str>,
    schema: &DatasetSchema,
) {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(column) => {
            check_column(errors, field, column, schema);
        }
        None => errors.push(ValidationError::MissingField {
            mode: mode.to_string(),
            field: field.to_string(),
        }),
    }
}

fn check_column(
    errors: &mut Vec<ValidationError>,
    field: &str,
    column: &str,
    schema: &DatasetSchema,
) -> bool {
    if schema.contains(column) {
        return true;
    }
    errors.push(ValidationError::UnknownColumn {
        field: field.to_string(),
        value: column.to_string(),
        available: schema.sorted_columns(),
    });
    false
}

fn check_time_kind(errors: &mut Vec<ValidationError>, column: &str, schema: &DatasetSchema) {
    let Some(kind) = schema.kind(column) else {
        return;
    };
    if !matches!(kind, VariableKind::Continuous | VariableKind::Time) {
        errors.push(ValidationError::TypeMismatch {
            field: "time_col".to_string(),
            value: column.to_string(),
            expected: "continuous or time".to_string(),
            found: kind.to_string(),
        });
    }
}

fn check_condition(
    errors: &mut Vec<ValidationError>,
    field: &str,
    condition: &ConditionExpression,
    schema: &DatasetSchema,
) {
    check_column(errors, &format!("{field}.column"), &condition.column, schema);
    if let Some((expected, found)) = condition.shape_violation() {
        errors.push(ValidationError::TypeMismatch {
            field: format!("{field}.value"),
            value: condition.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}
