use tracing::{debug, info, warn};

use crate::client::{CompletionClient, CompletionRequest, Message};

/// Asked when a query matches a known-vague phrasing.
pub const CLARIFYING_PROMPT: &str = "Your question is too broad to plan an analysis. \
Which outcome and which patient groups should be compared? For example: \
\"compare survival by TP53 mutation status\" or \
\"is KRAS mutation more frequent in late-stage than early-stage patients?\"";

/// Phrasings that never carry enough intent to plan from.
const VAGUE_PHRASES: &[&str] = &[
    "is the data good",
    "is this data good",
    "analyze data",
    "analyze the data",
    "analyse data",
    "analyse the data",
    "analyze this",
    "run an analysis",
    "run analysis",
    "do an analysis",
    "tell me something",
    "anything interesting",
    "what can you find",
    "what does the data say",
    "show me the data",
];

const GATE_INSTRUCTIONS: &str = "You screen clinical research questions before an \
analysis plan is built. If the question names an outcome or variable and the groups \
to compare, answer with the single word CLEAR. Otherwise answer with one short \
clarifying question and nothing else.";

/// Screens queries that are too vague to plan.
pub struct ClarificationGate<C> {
    client: C,
    model: String,
}

impl<C: CompletionClient> ClarificationGate<C> {
    pub fn new(client: C, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Clarifying question for the user, or `None` to proceed.
    ///
    /// Known-vague phrasings are answered locally. Otherwise the collaborator
    /// decides; anything but a response with a standalone `CLEAR` token is returned as the
    /// question, and a failed call proceeds.
    pub fn needs_clarification(&self, query: &str) -> Option<String> {
        if is_vague(query) {
            info!(event = "clarification_short_circuit", query);
            return Some(CLARIFYING_PROMPT.to_string());
        }

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::system(GATE_INSTRUCTIONS), Message::user(query)],
        };
        match self.client.complete(&request) {
            Ok(response) if has_clear_token(&response) => {
                debug!(event = "clarification_clear");
                None
            }
            Ok(response) if response.trim().is_empty() => {
                warn!(event = "clarification_fail_open", error = "empty response");
                None
            }
            Ok(response) => {
                info!(event = "clarification_requested");
                Some(response.trim().to_string())
            }
            Err(err) => {
                warn!(event = "clarification_fail_open", error = %err);
                None
            }
        }
    }
}

/// `CLEAR` as a whole word; `UNCLEAR` does not count.
fn has_clear_token(response: &str) -> bool {
    response
        .split(|ch: char| !ch.is_alphanumeric())
        .any(|token| token == "CLEAR")
}

/// True when the query matches a known-vague phrasing.
pub fn is_vague(query: &str) -> bool {
    let normalized = query
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if normalized.is_empty() {
        return true;
    }
    VAGUE_PHRASES.iter().any(|phrase| normalized == *phrase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ScriptedClient;
    use crate::error::CompletionError;

    #[test]
    fn vague_query_short_circuits_without_a_call() {
        let client = ScriptedClient::new(["CLEAR"]);
        let gate = ClarificationGate::new(&client, "test");
        assert_eq!(
            gate.needs_clarification("is the data good"),
            Some(CLARIFYING_PROMPT.to_string())
        );
        assert_eq!(
            gate.needs_clarification("  Analyze data?! "),
            Some(CLARIFYING_PROMPT.to_string())
        );
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn clear_token_proceeds() {
        let client = ScriptedClient::new(["CLEAR."]);
        let gate = ClarificationGate::new(&client, "test");
        assert_eq!(
            gate.needs_clarification("survival by TP53 mutation status"),
            None
        );
        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages[1].content, "survival by TP53 mutation status");
    }

    #[test]
    fn other_responses_are_the_question() {
        let client = ScriptedClient::new(["  Which outcome do you mean? "]);
        let gate = ClarificationGate::new(&client, "test");
        assert_eq!(
            gate.needs_clarification("compare the groups"),
            Some("Which outcome do you mean?".to_string())
        );
    }

    #[test]
    fn unclear_is_not_the_clear_token() {
        let reply = "Your question is UNCLEAR: which outcome should be compared?";
        let client = ScriptedClient::new([reply]);
        let gate = ClarificationGate::new(&client, "test");
        assert_eq!(
            gate.needs_clarification("compare the groups"),
            Some(reply.to_string())
        );
        assert!(has_clear_token("**CLEAR**"));
        assert!(!has_clear_token("clearly unclear"));
    }

    #[test]
    fn failures_fail_open() {
        let client = ScriptedClient::with_results([Err(CompletionError::Transport(
            "connection reset".to_string(),
        ))]);
        let gate = ClarificationGate::new(&client, "test");
        assert_eq!(gate.needs_clarification("compare the groups"), None);
    }
}
