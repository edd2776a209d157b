//! The terminal artifact of a turn and its templated texts.

use serde::{Deserialize, Serialize};

use super::error::TurnError;
use super::state::Intent;

pub const GREETING_TEMPLATE: &str =
    "Hello! Thanks for reaching out. How can I help you today?";

pub const CLARIFICATION_TEMPLATE: &str =
    "Could you provide more details about your question?";

pub const APOLOGY_TEMPLATE: &str = "I apologize, but I encountered an error processing your request. Please try again or contact support.";

/// Result of one turn. Exactly one is produced per `process_message` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub text: String,
    /// In [0, 1]. 0 for degraded turns.
    pub confidence: f32,
    /// Source ids of the chunks the answer was generated from.
    pub sources: Vec<String>,
    pub needs_clarification: bool,
    pub intent: Intent,
    /// True when the knowledge base was searched this turn.
    pub used_retrieval: bool,
    /// Set when a collaborator failed and the apology template was returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    /// Apology returned when the retriever or generator failed. `used_retrieval` reports
    /// whether the knowledge base had already been searched when the failure happened.
    pub fn degraded(intent: Intent, used_retrieval: bool, error: &TurnError) -> Self {
        Self {
            text: APOLOGY_TEMPLATE.to_string(),
            confidence: 0.0,
            sources: Vec::new(),
            needs_clarification: false,
            intent,
            used_retrieval,
            error: Some(error.to_string()),
        }
    }

    /// Reply to an empty message: ask for details, no collaborator involved.
    pub fn empty_message() -> Self {
        Self {
            text: CLARIFICATION_TEMPLATE.to_string(),
            confidence: 0.0,
            sources: Vec::new(),
            needs_clarification: true,
            intent: Intent::Other,
            used_retrieval: false,
            error: None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_has_zero_confidence_and_no_sources() {
        let r = AgentResponse::degraded(
            Intent::Question,
            false,
            &TurnError::RetrieverUnavailable("connection refused".to_string()),
        );
        assert_eq!(r.text, APOLOGY_TEMPLATE);
        assert_eq!(r.confidence, 0.0);
        assert!(r.sources.is_empty());
        assert!(r.is_degraded());
        assert!(r.error.unwrap().contains("connection refused"));
    }

    #[test]
    fn serializes_camel_case() {
        let v = serde_json::to_value(AgentResponse::empty_message()).unwrap();
        assert_eq!(v["needsClarification"], true);
        assert_eq!(v["intent"], "other");
        assert!(v.get("error").is_none());
    }
}
