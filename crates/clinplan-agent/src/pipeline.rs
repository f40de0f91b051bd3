use clinplan_core::DatasetSchema;
use clinplan_plan::{AcceptedPlan, accept};

use crate::clarify::ClarificationGate;
use crate::client::CompletionClient;
use crate::error::Result;
use crate::planner::{Planner, PlannerConfig};

/// What a query produced.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The query was too vague; ask the user this instead.
    NeedsClarification(String),
    Accepted(AcceptedPlan),
}

/// Clarification gate, planner, verifier and safety validator in sequence.
///
/// Holds no per-query state; one pipeline can serve many queries against the
/// same schema.
pub struct Pipeline<C> {
    client: C,
    config: PlannerConfig,
}

impl<C: CompletionClient> Pipeline<C> {
    pub fn new(client: C, config: PlannerConfig) -> Self {
        Self { client, config }
    }

    pub fn run(&self, query: &str, schema: &DatasetSchema) -> Result<PipelineOutcome> {
        let gate = ClarificationGate::new(&self.client, self.config.model.clone());
        if let Some(question) = gate.needs_clarification(query) {
            return Ok(PipelineOutcome::NeedsClarification(question));
        }

        let planner = Planner::new(&self.client, self.config.clone());
        let plan = planner.plan(query, schema)?;
        Ok(PipelineOutcome::Accepted(accept(plan, schema)?))
    }
}
