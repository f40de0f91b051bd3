use std::fmt::Write as _;

use clinplan_core::DatasetSchema;
use clinplan_plan::{AnalysisPlan, EXCERPT_CHARS, excerpt, verify_with_excerpt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::{CompletionClient, CompletionRequest, Message};
use crate::error::PipelineError;
use crate::extract::extract_json;

/// Hard cap on sampled values per categorical column in the prompt.
pub const MAX_SAMPLE_VALUES: usize = 10;

const PLANNER_INSTRUCTIONS: &str = r#"You convert clinical research questions into a JSON analysis plan for the dataset described below.
Respond with a single JSON object and nothing else.

Fields:
- "mode": one of "survival", "case_control", "association_scan".
- "target_variable": column analysed by case_control and association_scan.
- "grouping_variable": column whose groups are compared by survival.
- "case_condition", "control_condition": condition strings selecting the two cohorts.
- "time_col", "event_col": survival columns, default "OS_MONTHS" and "OS_STATUS".
- "filters": list of condition strings applied before the analysis.

Conditions use exactly one of these forms, with column names copied from the column list:
- <column> is <value>
- <column> is not <value>
- <column> greater than <number>
- <column> less than <number>
- <column> is in {<value>, <value>}
- <column> is not in {<value>, <value>}"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub model: String,
    /// Send observed categorical values along with column names.
    pub include_value_samples: bool,
    /// Per-column sample size, clamped to [`MAX_SAMPLE_VALUES`].
    pub max_sample_values: usize,
    /// Characters of raw output kept in `MalformedPlan` errors.
    pub excerpt_chars: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            include_value_samples: true,
            max_sample_values: MAX_SAMPLE_VALUES,
            excerpt_chars: EXCERPT_CHARS,
        }
    }
}

/// Turns a query into a verified candidate plan through the collaborator.
pub struct Planner<C> {
    client: C,
    config: PlannerConfig,
}

impl<C: CompletionClient> Planner<C> {
    pub fn new(client: C, config: PlannerConfig) -> Self {
        Self { client, config }
    }

    /// Request, extract and verify a plan.
    ///
    /// Any failure along the way is a `MalformedPlan`; no default plan is
    /// ever substituted.
    pub fn plan(&self, query: &str, schema: &DatasetSchema) -> Result<AnalysisPlan, PipelineError> {
        let request = self.build_request(query, schema);
        info!(
            event = "plan_requested",
            model = %request.model,
            columns = schema.variables.len()
        );

        let response = self.client.complete(&request).map_err(|err| {
            warn!(event = "plan_completion_failed", error = %err);
            PipelineError::MalformedPlan {
                reason: format!("completion failed: {err}"),
                excerpt: String::new(),
            }
        })?;
        info!(event = "plan_response_received", chars = response.chars().count());

        let candidate = extract_json(&response).map_err(|failure| {
            warn!(event = "plan_extraction_failed", reason = %failure.reason());
            PipelineError::MalformedPlan {
                reason: failure.reason(),
                excerpt: excerpt(&response, self.config.excerpt_chars),
            }
        })?;

        Ok(verify_with_excerpt(&candidate, schema, self.config.excerpt_chars)?)
    }

    /// System instructions plus dataset description, then the user query.
    pub fn build_request(&self, query: &str, schema: &DatasetSchema) -> CompletionRequest {
        CompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message::system(self.system_prompt(schema)),
                Message::user(query.trim()),
            ],
        }
    }

    fn system_prompt(&self, schema: &DatasetSchema) -> String {
        let mut prompt = String::from(PLANNER_INSTRUCTIONS);
        let _ = write!(prompt, "\n\nDataset: {}\nColumns:", schema.name);
        for variable in schema.variables.values() {
            let _ = write!(prompt, "\n- {} ({})", variable.name, variable.kind);
        }

        let limit = self.config.max_sample_values.min(MAX_SAMPLE_VALUES);
        if self.config.include_value_samples && limit > 0 {
            let samples = schema.categorical_samples(limit);
            if !samples.is_empty() {
                prompt.push_str("\nObserved values:");
                for (column, values) in samples {
                    let _ = write!(prompt, "\n- {column}: {}", values.join(", "));
                }
            }
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ScriptedClient;
    use clinplan_core::{Variable, VariableKind};

    fn schema() -> DatasetSchema {
        let stages: Vec<String> = (1..=14).map(|idx| format!("S{idx:02}")).collect();
        DatasetSchema::new(
            "demo",
            [
                Variable::new("SITE", VariableKind::Categorical).with_observed_values(stages),
                Variable::new("OS_MONTHS", VariableKind::Continuous),
                Variable::new("OS_STATUS", VariableKind::Event),
            ],
        )
    }

    #[test]
    fn prompt_lists_columns_and_caps_samples() {
        let client = ScriptedClient::new(Vec::<String>::new());
        let config = PlannerConfig {
            max_sample_values: 50,
            ..PlannerConfig::default()
        };
        let planner = Planner::new(&client, config);
        let request = planner.build_request("survival by site", &schema());

        let system = &request.messages[0].content;
        assert!(system.contains("- OS_MONTHS (continuous)"));
        assert!(system.contains("- SITE: S01, S02"));
        assert!(system.contains("S10"));
        assert!(!system.contains("S11"));
        assert_eq!(request.messages[1].content, "survival by site");
    }

    #[test]
    fn samples_can_be_disabled() {
        let client = ScriptedClient::new(Vec::<String>::new());
        let config = PlannerConfig {
            include_value_samples: false,
            ..PlannerConfig::default()
        };
        let planner = Planner::new(&client, config);
        let request = planner.build_request("q", &schema());
        assert!(!request.messages[0].content.contains("Observed values"));
    }

    #[test]
    fn prose_response_is_malformed_with_excerpt() {
        let client = ScriptedClient::new(["I recommend a survival analysis of SITE."]);
        let planner = Planner::new(&client, PlannerConfig::default());
        let err = planner.plan("survival by site", &schema()).expect_err("malformed");
        match err {
            PipelineError::MalformedPlan { excerpt, .. } => {
                assert_eq!(excerpt, "I recommend a survival analysis of SITE.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn configured_excerpt_limit_covers_verification_failures() {
        let response = r#"{"target_variable": "SITE", "note": "no mode given"}"#;
        let client = ScriptedClient::new([response]);
        let config = PlannerConfig {
            excerpt_chars: 10,
            ..PlannerConfig::default()
        };
        let planner = Planner::new(&client, config);
        let err = planner.plan("compare sites", &schema()).expect_err("malformed");
        match err {
            PipelineError::MalformedPlan { reason, excerpt } => {
                assert!(reason.contains("mode"));
                assert_eq!(excerpt.chars().count(), 10);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn completion_failure_is_malformed() {
        let client = ScriptedClient::new(Vec::<String>::new());
        let planner = Planner::new(&client, PlannerConfig::default());
        assert!(matches!(
            planner.plan("survival by site", &schema()),
            Err(PipelineError::MalformedPlan { .. })
        ));
    }
}
