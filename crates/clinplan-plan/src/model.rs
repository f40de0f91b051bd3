use std::fmt;

use clinplan_core::table::render_number;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default survival time column when the plan does not name one.
pub const DEFAULT_TIME_COL: &str = "OS_MONTHS";
/// Default survival event column when the plan does not name one.
pub const DEFAULT_EVENT_COL: &str = "OS_STATUS";

/// Statistical analysis family requested by a plan.
///
/// Anything outside the three supported modes is kept verbatim so the safety
/// validator can reject it with the exact string that was claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AnalysisMode {
    Survival,
    CaseControl,
    AssociationScan,
    Unsupported(String),
}

impl AnalysisMode {
    /// Parse a mode name, accepting the spellings seen in generated plans.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "survival" => AnalysisMode::Survival,
            "case_control" => AnalysisMode::CaseControl,
            "association_scan" | "global_scan" => AnalysisMode::AssociationScan,
            _ => AnalysisMode::Unsupported(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AnalysisMode::Survival => "survival",
            AnalysisMode::CaseControl => "case_control",
            AnalysisMode::AssociationScan => "association_scan",
            AnalysisMode::Unsupported(raw) => raw.as_str(),
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, AnalysisMode::Unsupported(_))
    }
}

impl From<String> for AnalysisMode {
    fn from(value: String) -> Self {
        AnalysisMode::parse(&value)
    }
}

impl From<AnalysisMode> for String {
    fn from(value: AnalysisMode) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Operator {
    #[serde(rename = "==", alias = "=", alias = "eq", alias = "is")]
    Eq,
    #[serde(rename = "!=", alias = "neq", alias = "is not")]
    Neq,
    #[serde(rename = ">", alias = "gt", alias = "greater than")]
    Gt,
    #[serde(rename = "<", alias = "lt", alias = "less than")]
    Lt,
    #[serde(rename = "in", alias = "is in")]
    In,
    #[serde(rename = "not in", alias = "is not in")]
    NotIn,
}

impl Operator {
    /// Map a natural-language or symbolic operator token.
    pub fn from_token(token: &str) -> Option<Self> {
        let normalized = token
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        match normalized.as_str() {
            "is" | "==" | "=" | "eq" => Some(Operator::Eq),
            "is not" | "!=" | "neq" => Some(Operator::Neq),
            "greater than" | "is greater than" | ">" | "gt" => Some(Operator::Gt),
            "less than" | "is less than" | "<" | "lt" => Some(Operator::Lt),
            "is in" | "in" => Some(Operator::In),
            "is not in" | "not in" => Some(Operator::NotIn),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Neq => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::In => "in",
            Operator::NotIn => "not in",
        }
    }

    /// True for set-membership operators.
    pub fn is_set(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    /// Set-membership counterpart of an equality operator.
    pub fn promoted(&self) -> Self {
        match self {
            Operator::Eq => Operator::In,
            Operator::Neq => Operator::NotIn,
            other => *other,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A single literal: number or text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Numeric if the literal parses as a finite float, text otherwise.
    pub fn from_literal(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(number) if number.is_finite() => Scalar::Number(number),
            _ => Scalar::Text(trimmed.to_string()),
        }
    }

    pub fn render(&self) -> String {
        match self {
            Scalar::Number(number) => render_number(*number),
            Scalar::Text(text) => text.clone(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ConditionValue {
    Set(Vec<Scalar>),
    Scalar(Scalar),
}

/// Structured predicate over one column.
///
/// `In`/`NotIn` carry a non-empty set; every other operator carries a scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConditionExpression {
    pub column: String,
    #[serde(alias = "op")]
    pub operator: Operator,
    pub value: ConditionValue,
}

impl ConditionExpression {
    pub fn scalar(column: impl Into<String>, operator: Operator, value: Scalar) -> Self {
        Self {
            column: column.into(),
            operator,
            value: ConditionValue::Scalar(value),
        }
    }

    /// Build a set-membership condition; `None` when the set ends up empty.
    pub fn set(
        column: impl Into<String>,
        operator: Operator,
        values: impl IntoIterator<Item = Scalar>,
    ) -> Option<Self> {
        let mut members: Vec<Scalar> = Vec::new();
        for value in values {
            if !members.contains(&value) {
                members.push(value);
            }
        }
        if members.is_empty() {
            return None;
        }
        Some(Self {
            column: column.into(),
            operator: operator.promoted(),
            value: ConditionValue::Set(members),
        })
    }

    /// Describe how the operator/value pairing breaks the shape invariant.
    pub fn shape_violation(&self) -> Option<(&'static str, &'static str)> {
        match (&self.value, self.operator.is_set()) {
            (ConditionValue::Set(values), true) if values.is_empty() => {
                Some(("a non-empty set", "an empty set"))
            }
            (ConditionValue::Scalar(_), true) => Some(("a non-empty set", "a single value")),
            (ConditionValue::Set(_), false) => Some(("a single value", "a set")),
            _ => None,
        }
    }
}

impl fmt::Display for ConditionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            ConditionValue::Scalar(value) => {
                write!(f, "{} {} {}", self.column, self.operator, value)
            }
            ConditionValue::Set(values) => {
                let rendered: Vec<String> = values.iter().map(Scalar::render).collect();
                write!(
                    f,
                    "{} {} {{{}}}",
                    self.column,
                    self.operator,
                    rendered.join(", ")
                )
            }
        }
    }
}

fn default_time_col() -> String {
    DEFAULT_TIME_COL.to_string()
}

fn default_event_col() -> String {
    DEFAULT_EVENT_COL.to_string()
}

/// Analysis plan handed from the planner to the statistical executor.
///
/// A plan is a candidate until the safety validator accepts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisPlan {
    /// One of `survival`, `case_control`, `association_scan`.
    #[schemars(with = "String")]
    pub mode: AnalysisMode,
    /// Primary analysis target (case-control and association scans).
    #[serde(default, alias = "target", skip_serializing_if = "Option::is_none")]
    pub target_variable: Option<String>,
    /// Grouping column (survival curves, display grouping).
    #[serde(
        default,
        alias = "group_by",
        alias = "group_variable",
        skip_serializing_if = "Option::is_none"
    )]
    pub grouping_variable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_condition: Option<ConditionExpression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_condition: Option<ConditionExpression>,
    #[serde(default = "default_time_col")]
    pub time_col: String,
    #[serde(default = "default_event_col")]
    pub event_col: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<ConditionExpression>,
}

impl AnalysisPlan {
    /// Empty plan for a mode with survival column defaults.
    pub fn new(mode: AnalysisMode) -> Self {
        Self {
            mode,
            target_variable: None,
            grouping_variable: None,
            case_condition: None,
            control_condition: None,
            time_col: default_time_col(),
            event_col: default_event_col(),
            filters: Vec::new(),
        }
    }
}
