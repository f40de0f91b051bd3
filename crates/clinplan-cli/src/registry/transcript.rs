use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use clinplan_agent::{CompletionClient, CompletionError, CompletionRequest};
use serde::Serialize;
use tracing::warn;

use super::RegistryResult;

#[derive(Serialize)]
struct TranscriptEntry<'a> {
    at: String,
    request: &'a CompletionRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Appends every exchange with the collaborator to `llm_transcript.jsonl`.
pub struct TranscriptClient<C> {
    inner: C,
    file: Mutex<File>,
}

impl<C: CompletionClient> TranscriptClient<C> {
    pub fn create(inner: C, path: &Path) -> RegistryResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            inner,
            file: Mutex::new(file),
        })
    }

    fn record(&self, entry: &TranscriptEntry<'_>) {
        let line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(err) => {
                warn!(event = "transcript_write_failed", error = %err);
                return;
            }
        };
        let written = self
            .file
            .lock()
            .map_err(|_| std::io::Error::other("transcript lock poisoned"))
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(err) = written {
            warn!(event = "transcript_write_failed", error = %err);
        }
    }
}

impl<C: CompletionClient> CompletionClient for TranscriptClient<C> {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let result = self.inner.complete(request);
        self.record(&TranscriptEntry {
            at: Utc::now().to_rfc3339(),
            request,
            response: result.as_deref().ok(),
            error: result.as_ref().err().map(ToString::to_string),
        });
        result
    }
}
