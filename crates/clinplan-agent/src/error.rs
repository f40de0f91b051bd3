use clinplan_plan::{ConditionError, ValidationError, VerificationError};
use thiserror::Error;

/// Failure of the generative collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("completion service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion service returned no text")]
    EmptyResponse,
    #[error("no scripted response left")]
    Exhausted,
}

/// Reasons a query does not produce an accepted plan.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed plan: {reason} (raw: {excerpt:?})")]
    MalformedPlan { reason: String, excerpt: String },
    #[error("{field}: {source}")]
    Ambiguous {
        field: String,
        #[source]
        source: ConditionError,
    },
    #[error("plan rejected: {0}")]
    Rejected(#[from] ValidationError),
}

impl From<VerificationError> for PipelineError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::MalformedPlan { reason, excerpt } => {
                PipelineError::MalformedPlan { reason, excerpt }
            }
            VerificationError::Condition { field, source } => {
                PipelineError::Ambiguous { field, source }
            }
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
