//! Analysis plan contract and the deterministic gates a plan passes through:
//! condition grammar, column reconciliation, verification and the safety
//! validator.

pub mod condition;
pub mod errors;
pub mod model;
pub mod reconcile;
pub mod schema;
pub mod semantic;
pub mod validate;
pub mod verify;

pub use condition::{RawCondition, parse_condition, parse_raw_condition};
pub use errors::{
    ConditionError, IssueSeverity, PlanError, ValidationError, ValidationIssue,
    ValidationReport, VerificationError,
};
pub use model::{
    AnalysisMode, AnalysisPlan, ConditionExpression, ConditionValue, DEFAULT_EVENT_COL,
    DEFAULT_TIME_COL, Operator, Scalar,
};
pub use reconcile::{LOOSE_THRESHOLD, MatchConfidence, MatchResult, STRICT_THRESHOLD, resolve};
pub use schema::{plan_json_schema, plan_json_schema_value};
pub use semantic::map_literal;
pub use validate::{
    AcceptedPlan, CheckedPlan, accept, check_plan, validate, validate_plan_against_schema,
    validate_plan_json, violations,
};
pub use verify::{EXCERPT_CHARS, excerpt, verify, verify_with_excerpt};
