//! Generative collaborator seam and the query pipeline built on it.
//!
//! Everything here is synchronous; the only blocking point is
//! [`CompletionClient::complete`].

pub mod clarify;
pub mod client;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod planner;

pub use clarify::{CLARIFYING_PROMPT, ClarificationGate, is_vague};
pub use client::{CompletionClient, CompletionRequest, Message, Role, ScriptedClient};
pub use error::{CompletionError, PipelineError, Result};
pub use extract::{ExtractFailure, extract_json};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use planner::{MAX_SAMPLE_VALUES, Planner, PlannerConfig};
