//! Error taxonomy for the Assessment Core (§7).
//!
//! Error *kinds* are fixed by the spec; this module gives them concrete
//! shape in the teacher's `thiserror`-composition style (see
//! `types/error.rs`'s `RuntimeError` composing per-subsystem enums via
//! `#[from]`).

use thiserror::Error;

use crate::types::{QuestionId, SessionId};

/// The single error type every core service operation returns.
#[derive(Error, Debug, Clone)]
pub enum AssessmentError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("generation exhausted after {attempts} attempts: {reason}")]
    GenerationExhausted { attempts: u32, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("session {session_id} is terminal (completed)")]
    SessionTerminal { session_id: SessionId },

    #[error("question {question_id} does not belong to session {session_id}")]
    QuestionNotInSession {
        session_id: SessionId,
        question_id: QuestionId,
    },

    #[error("tool error: {0}")]
    Tool(#[from] crate::tools::ToolError),

    #[error("inference error: {0}")]
    Inference(#[from] crate::llm::InferenceError),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
}

impl AssessmentError {
    /// Stable machine-readable code for HTTP/RPC mapping, independent of
    /// the (free-form) display message. §7: "the caller sees a small
    /// closed set of codes mapped to status and retry guidance."
    pub fn code(&self) -> &'static str {
        match self {
            AssessmentError::Validation(_) => "VALIDATION_ERROR",
            AssessmentError::NotFound(_) => "NOT_FOUND",
            AssessmentError::PreconditionFailed(_) => "PRECONDITION_FAILED",
            AssessmentError::Transient(_) => "TRANSIENT",
            AssessmentError::GenerationExhausted { .. } => "GEN_EXHAUSTED",
            AssessmentError::Cancelled => "CANCELLED",
            AssessmentError::SessionTerminal { .. } => "SESSION_TERMINAL",
            AssessmentError::QuestionNotInSession { .. } => "QUESTION_NOT_IN_SESSION",
            AssessmentError::Tool(_) => "TOOL_ERROR",
            AssessmentError::Inference(_) => "INFERENCE_ERROR",
            AssessmentError::Config(_) => "CONFIG_ERROR",
            AssessmentError::Store(_) => "STORE_ERROR",
        }
    }

    /// Whether the caller may reasonably retry the same request unmodified.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AssessmentError::Transient(_) | AssessmentError::GenerationExhausted { .. }
        )
    }
}

pub type AssessmentResult<T> = Result<T, AssessmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_strings() {
        assert_eq!(AssessmentError::Cancelled.code(), "CANCELLED");
        assert_eq!(
            AssessmentError::GenerationExhausted {
                attempts: 3,
                reason: "no valid items".into()
            }
            .code(),
            "GEN_EXHAUSTED"
        );
    }

    #[test]
    fn retryability_matches_spec_kinds() {
        assert!(AssessmentError::Transient("timeout".into()).is_retryable());
        assert!(!AssessmentError::NotFound("session".into()).is_retryable());
        assert!(!AssessmentError::Cancelled.is_retryable());
    }
}
