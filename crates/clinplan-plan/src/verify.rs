use clinplan_core::DatasetSchema;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::condition::{RawCondition, parse_raw_condition};
use crate::errors::VerificationError;
use crate::model::{AnalysisMode, AnalysisPlan, ConditionExpression, Operator};
use crate::reconcile::{MatchConfidence, resolve};

/// Characters of raw output kept in a `MalformedPlan` error.
pub const EXCERPT_CHARS: usize = 200;

const MODE_FIELDS: &[&str] = &["mode", "query_type"];
const TARGET_FIELDS: &[&str] = &["target_variable", "target"];
const GROUPING_FIELDS: &[&str] = &["grouping_variable", "group_by", "group_variable"];

/// First `limit` characters of `raw`.
pub fn excerpt(raw: &str, limit: usize) -> String {
    raw.chars().take(limit).collect()
}

/// `MalformedPlan` carrying the whole offending text; truncated on the way out.
fn malformed(reason: impl Into<String>, raw: &str) -> VerificationError {
    VerificationError::MalformedPlan {
        reason: reason.into(),
        excerpt: raw.to_string(),
    }
}

/// Turn candidate plan fields into a structured plan.
///
/// Column-naming fields are reconciled against the schema: the target and
/// survival columns strictly, grouping and condition columns loosely.
/// Unresolved names are kept as claimed so the validator can report them.
/// Fields absent from the candidate stay unset.
pub fn verify(candidate: &Value, schema: &DatasetSchema) -> Result<AnalysisPlan, VerificationError> {
    verify_with_excerpt(candidate, schema, EXCERPT_CHARS)
}

/// [`verify`] with `MalformedPlan` excerpts cut to `excerpt_chars`.
pub fn verify_with_excerpt(
    candidate: &Value,
    schema: &DatasetSchema,
    excerpt_chars: usize,
) -> Result<AnalysisPlan, VerificationError> {
    verify_fields(candidate, schema).map_err(|err| match err {
        VerificationError::MalformedPlan { reason, excerpt: raw } => {
            VerificationError::MalformedPlan {
                reason,
                excerpt: excerpt(&raw, excerpt_chars),
            }
        }
        other => other,
    })
}

fn verify_fields(
    candidate: &Value,
    schema: &DatasetSchema,
) -> Result<AnalysisPlan, VerificationError> {
    let Some(fields) = candidate.as_object() else {
        return Err(malformed("expected a JSON object", &raw_text(candidate)));
    };

    let mode = match string_field(fields, MODE_FIELDS, candidate)? {
        Some(mode) => AnalysisMode::parse(&mode),
        None => return Err(malformed("missing 'mode'", &raw_text(candidate))),
    };
    let mut plan = AnalysisPlan::new(mode);

    if let Some(target) = string_field(fields, TARGET_FIELDS, candidate)? {
        plan.target_variable = Some(reconcile_column("target_variable", &target, schema, true));
    }
    if let Some(grouping) = string_field(fields, GROUPING_FIELDS, candidate)? {
        plan.grouping_variable =
            Some(reconcile_column("grouping_variable", &grouping, schema, false));
    }
    if let Some(time_col) = string_field(fields, &["time_col"], candidate)? {
        plan.time_col = reconcile_column("time_col", &time_col, schema, true);
    }
    if let Some(event_col) = string_field(fields, &["event_col"], candidate)? {
        plan.event_col = reconcile_column("event_col", &event_col, schema, true);
    }

    if let Some(value) = lookup(fields, &["case_condition"]) {
        plan.case_condition = condition_field("case_condition", value, schema)?;
    }
    if let Some(value) = lookup(fields, &["control_condition"]) {
        plan.control_condition = condition_field("control_condition", value, schema)?;
    }
    if let Some(value) = lookup(fields, &["filters"]) {
        plan.filters = filters_field(value, schema)?;
    }

    debug!(event = "plan_verified", mode = %plan.mode, filters = plan.filters.len());
    Ok(plan)
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// First present, non-null field among `names`; earlier names win.
fn lookup<'a>(fields: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| fields.get(*name))
        .find(|value| !value.is_null())
}

fn string_field(
    fields: &Map<String, Value>,
    names: &[&str],
    candidate: &Value,
) -> Result<Option<String>, VerificationError> {
    match lookup(fields, names) {
        None => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.trim().to_string())),
        Some(_) => Err(malformed(
            format!("'{}' must be a string", names[0]),
            &raw_text(candidate),
        )),
    }
}

fn reconcile_column(field: &str, claimed: &str, schema: &DatasetSchema, strict: bool) -> String {
    let result = resolve(claimed, schema, strict);
    match result.confidence {
        MatchConfidence::Exact => {}
        MatchConfidence::Fuzzy => info!(
            event = "column_reconciled",
            field,
            claimed,
            resolved = %result.resolved,
            score = result.score,
            strict
        ),
        MatchConfidence::Unresolved => {
            warn!(event = "column_unresolved", field, claimed, strict)
        }
    }
    result.resolved
}

fn condition_field(
    field: &str,
    value: &Value,
    schema: &DatasetSchema,
) -> Result<Option<ConditionExpression>, VerificationError> {
    let raw = match value {
        Value::String(text) => match parse_raw_condition(text) {
            Ok(Some(raw)) => raw,
            Ok(None) if text.trim().is_empty() => return Ok(None),
            Ok(None) => {
                warn!(event = "condition_unparsed", field, condition = %text);
                return Err(malformed(format!("{field}: unrecognised condition"), text));
            }
            Err(source) => {
                return Err(VerificationError::Condition {
                    field: field.to_string(),
                    source,
                });
            }
        },
        Value::Object(map) => condition_from_object(field, map)?,
        other => {
            return Err(malformed(
                format!("{field}: expected a condition string or object"),
                &other.to_string(),
            ));
        }
    };
    finish_condition(field, raw, schema).map(Some)
}

/// `{"column": .., "operator"|"op": .., "value": ..}`.
fn condition_from_object(
    field: &str,
    map: &Map<String, Value>,
) -> Result<RawCondition, VerificationError> {
    let raw = || Value::Object(map.clone()).to_string();

    let column = match lookup(map, &["column", "col"]) {
        Some(Value::String(column)) if !column.trim().is_empty() => column.trim().to_string(),
        _ => return Err(malformed(format!("{field}: condition needs a column"), &raw())),
    };
    let value = lookup(map, &["value", "values"])
        .ok_or_else(|| malformed(format!("{field}: condition needs a value"), &raw()))?;
    let literals =
        literals(value).ok_or_else(|| malformed(format!("{field}: unsupported value"), &raw()))?;

    let operator = match lookup(map, &["operator", "op"]) {
        Some(Value::String(token)) => Operator::from_token(token).ok_or_else(|| {
            malformed(format!("{field}: unsupported operator '{token}'"), &raw())
        })?,
        Some(_) => return Err(malformed(format!("{field}: operator must be a string"), &raw())),
        None if value.is_array() => Operator::In,
        None => Operator::Eq,
    };

    Ok(RawCondition {
        column,
        operator,
        literals,
    })
}

fn literals(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => items.iter().map(literal).collect(),
        other => literal(other).map(|literal| vec![literal]),
    }
}

fn literal(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn finish_condition(
    field: &str,
    raw: RawCondition,
    schema: &DatasetSchema,
) -> Result<ConditionExpression, VerificationError> {
    let column = reconcile_column(&format!("{field}.column"), &raw.column, schema, false);
    let raw = RawCondition { column, ..raw };
    let rendered = format!("{} {} {:?}", raw.column, raw.operator, raw.literals);
    raw.resolve(Some(schema))
        .ok_or_else(|| malformed(format!("{field}: empty value set"), &rendered))
}

/// Filters arrive as a list of conditions or as a `{column: value}` map.
fn filters_field(
    value: &Value,
    schema: &DatasetSchema,
) -> Result<Vec<ConditionExpression>, VerificationError> {
    match value {
        Value::Array(items) => {
            let mut filters = Vec::with_capacity(items.len());
            for (idx, item) in items.iter().enumerate() {
                if let Some(condition) = condition_field(&format!("filters[{idx}]"), item, schema)? {
                    filters.push(condition);
                }
            }
            Ok(filters)
        }
        Value::Object(map) => {
            let mut filters = Vec::with_capacity(map.len());
            for (idx, (column, value)) in map.iter().enumerate() {
                let field = format!("filters[{idx}]");
                let literals = literals(value).ok_or_else(|| {
                    malformed(format!("{field}: unsupported value"), &value.to_string())
                })?;
                let operator = if value.is_array() {
                    Operator::In
                } else {
                    Operator::Eq
                };
                let raw = RawCondition {
                    column: column.clone(),
                    operator,
                    literals,
                };
                filters.push(finish_condition(&field, raw, schema)?);
            }
            Ok(filters)
        }
        other => Err(malformed(
            "filters must be a list or an object",
            &other.to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConditionError;
    use crate::model::{ConditionValue, DEFAULT_EVENT_COL, DEFAULT_TIME_COL, Scalar};
    use clinplan_core::{Variable, VariableKind};
    use serde_json::json;

    fn schema() -> DatasetSchema {
        DatasetSchema::new(
            "demo",
            [
                Variable::new("TP53_Mutation", VariableKind::Categorical)
                    .with_observed_values(["Mutated", "Wild Type"]),
                Variable::new("TUMOR_STAGE", VariableKind::Categorical).with_observed_values([
                    "Stage I", "Stage II", "Stage III", "Stage IV",
                ]),
                Variable::new("AGE", VariableKind::Continuous),
                Variable::new("OS_MONTHS", VariableKind::Continuous),
                Variable::new("OS_STATUS", VariableKind::Event),
            ],
        )
    }

    #[test]
    fn grouping_typo_is_reconciled_loosely() {
        let plan = verify(
            &json!({"mode": "survival", "grouping_variable": "TP53_Mutaton"}),
            &schema(),
        )
        .expect("verified");
        assert_eq!(plan.grouping_variable.as_deref(), Some("TP53_Mutation"));
        assert_eq!(plan.time_col, DEFAULT_TIME_COL);
        assert_eq!(plan.event_col, DEFAULT_EVENT_COL);
        assert!(plan.target_variable.is_none());
    }

    #[test]
    fn target_keeps_claim_when_unresolved() {
        let plan = verify(
            &json!({"mode": "case_control", "target": "BRAF_status"}),
            &schema(),
        )
        .expect("verified");
        assert_eq!(plan.target_variable.as_deref(), Some("BRAF_status"));
    }

    #[test]
    fn canonical_field_wins_over_alias() {
        let plan = verify(
            &json!({"mode": "survival", "grouping_variable": "AGE", "group_by": "TUMOR_STAGE"}),
            &schema(),
        )
        .expect("verified");
        assert_eq!(plan.grouping_variable.as_deref(), Some("AGE"));
    }

    #[test]
    fn prose_is_malformed_with_excerpt() {
        let prose = "I think you should run a survival analysis. ".repeat(10);
        let err = verify(&Value::String(prose.clone()), &schema()).expect_err("malformed");
        match err {
            VerificationError::MalformedPlan { excerpt, .. } => {
                assert_eq!(excerpt.chars().count(), EXCERPT_CHARS);
                assert!(prose.starts_with(&excerpt));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn excerpt_limit_is_configurable() {
        let prose = "x".repeat(500);
        let err = verify_with_excerpt(&Value::String(prose), &schema(), 300).expect_err("malformed");
        match err {
            VerificationError::MalformedPlan { excerpt, .. } => {
                assert_eq!(excerpt.chars().count(), 300);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = verify_with_excerpt(&json!({"target_variable": "AGE"}), &schema(), 5)
            .expect_err("malformed");
        match err {
            VerificationError::MalformedPlan { excerpt, .. } => assert_eq!(excerpt, "{\"tar"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_mode_is_malformed() {
        let err = verify(&json!({"target_variable": "AGE"}), &schema()).expect_err("malformed");
        assert!(matches!(err, VerificationError::MalformedPlan { .. }));
    }

    #[test]
    fn string_conditions_use_observed_values() {
        let plan = verify(
            &json!({
                "mode": "case_control",
                "target_variable": "TP53_Mutation",
                "case_condition": "tumor_stage is late stage",
                "control_condition": "TUMOR_STAGE is 'stage i'",
            }),
            &schema(),
        )
        .expect("verified");

        let case = plan.case_condition.expect("case condition");
        assert_eq!(case.column, "TUMOR_STAGE");
        assert_eq!(case.operator, Operator::In);
        assert_eq!(
            case.value,
            ConditionValue::Set(vec![
                Scalar::Text("Stage III".to_string()),
                Scalar::Text("Stage IV".to_string()),
            ])
        );

        let control = plan.control_condition.expect("control condition");
        assert_eq!(
            control.value,
            ConditionValue::Scalar(Scalar::Text("Stage I".to_string()))
        );
    }

    #[test]
    fn unparseable_condition_is_malformed() {
        let err = verify(
            &json!({"mode": "case_control", "case_condition": "the sick ones"}),
            &schema(),
        )
        .expect_err("malformed");
        assert!(matches!(err, VerificationError::MalformedPlan { .. }));
    }

    #[test]
    fn ambiguous_condition_names_the_field() {
        let err = verify(
            &json!({"mode": "case_control", "case_condition": "AGE is 1 or OS_STATUS is 1"}),
            &schema(),
        )
        .expect_err("ambiguous");
        match err {
            VerificationError::Condition { field, source } => {
                assert_eq!(field, "case_condition");
                assert!(matches!(source, ConditionError::AmbiguousCondition { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn filters_accept_strings_objects_and_maps() {
        let listed = verify(
            &json!({
                "mode": "association_scan",
                "target_variable": "TP53_Mutation",
                "filters": ["AGE greater than 60", {"col": "TUMOR_STAGE", "op": "is", "value": "Stage IV"}],
            }),
            &schema(),
        )
        .expect("verified");
        assert_eq!(listed.filters.len(), 2);
        assert_eq!(listed.filters[0].operator, Operator::Gt);
        assert_eq!(listed.filters[1].operator, Operator::Eq);

        let mapped = verify(
            &json!({
                "mode": "association_scan",
                "target_variable": "TP53_Mutation",
                "filters": {"TUMOR_STAGE": ["Stage III", "Stage IV"]},
            }),
            &schema(),
        )
        .expect("verified");
        assert_eq!(mapped.filters.len(), 1);
        assert_eq!(mapped.filters[0].operator, Operator::In);
    }
}
