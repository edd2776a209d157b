use crate::knowledge::RetrieverError;

use super::generator::GeneratorError;

/// Collaborator failures inside a turn. Never leaves the loop: each becomes a degraded response.
/// Low confidence is not an error; it routes to `TurnState::AskClarification`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TurnError {
    #[error("retriever unavailable: {0}")]
    RetrieverUnavailable(String),
    #[error("generator unavailable: {0}")]
    GeneratorUnavailable(String),
}

impl From<RetrieverError> for TurnError {
    fn from(e: RetrieverError) -> Self {
        TurnError::RetrieverUnavailable(e.to_string())
    }
}

impl From<GeneratorError> for TurnError {
    fn from(e: GeneratorError) -> Self {
        TurnError::GeneratorUnavailable(e.to_string())
    }
}
