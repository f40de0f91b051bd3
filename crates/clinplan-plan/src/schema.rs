use schemars::schema::RootSchema;
use schemars::schema_for;
use serde_json::Value;

use crate::errors::PlanError;
use crate::model::AnalysisPlan;

/// Emit the JSON Schema for `plan.json`.
pub fn plan_json_schema() -> RootSchema {
    schema_for!(AnalysisPlan)
}

/// The plan JSON Schema as a JSON value, ready for compilation.
pub fn plan_json_schema_value() -> Result<Value, PlanError> {
    Ok(serde_json::to_value(plan_json_schema())?)
}
