use std::path::Path;
use std::time::Duration;

use clinplan_agent::{CompletionClient, CompletionError, CompletionRequest, ScriptedClient};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::settings::{LlmProvider, LlmSettings};

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("environment variable {0} is not set")]
    MissingApiKey(String),
    #[error("llm provider is off; pass --replay to use canned responses")]
    Disabled,
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("replay line {line}: {source}")]
    Replay {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// OpenAI-compatible `/chat/completions` endpoint over blocking HTTP.
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn from_settings(settings: &LlmSettings) -> Result<Self, CollaboratorError> {
        let api_key = std::env::var(&settings.api_key_env)
            .map_err(|_| CollaboratorError::MissingApiKey(settings.api_key_env.clone()))?;
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key,
        })
    }
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

impl CompletionClient for OpenAiClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let body = json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": 0.0,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|err| CompletionError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|err| CompletionError::Transport(err.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CompletionError::EmptyResponse)
    }
}

/// Canned responses, one JSON string per non-blank line.
pub fn parse_replay(content: &str) -> Result<ScriptedClient, CollaboratorError> {
    let mut responses = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let response: String = serde_json::from_str(line)
            .map_err(|source| CollaboratorError::Replay { line: idx + 1, source })?;
        responses.push(response);
    }
    Ok(ScriptedClient::new(responses))
}

/// Collaborator for a run: replay file when given, otherwise the configured
/// provider.
pub fn build_client(
    settings: &LlmSettings,
    replay: Option<&Path>,
) -> Result<Box<dyn CompletionClient>, CollaboratorError> {
    if let Some(path) = replay {
        let content = std::fs::read_to_string(path)?;
        return Ok(Box::new(parse_replay(&content)?));
    }
    match settings.provider {
        LlmProvider::OpenAi => Ok(Box::new(OpenAiClient::from_settings(settings)?)),
        LlmProvider::Off => Err(CollaboratorError::Disabled),
    }
}

/// Label recorded in the run config.
pub fn describe(settings: &LlmSettings, replay: Option<&Path>) -> String {
    match (replay, settings.provider) {
        (Some(path), _) => format!("replay:{}", path.display()),
        (None, LlmProvider::OpenAi) => format!("openai:{}", settings.model),
        (None, LlmProvider::Off) => "off".to_string(),
    }
}
