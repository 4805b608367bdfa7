//! AttemptAnswer: a user's stored answer to one question (§3.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AnswerId, QuestionId, SessionId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptAnswer {
    pub answer_id: AnswerId,
    pub session_id: SessionId,
    pub question_id: QuestionId,
    /// Free-form JSON-like payload; the core stores it without
    /// interpretation until the scoring pipeline inspects it by `item_type`.
    pub user_answer: serde_json::Value,
    pub response_time_ms: u64,
    pub is_correct: Option<bool>,
    pub score: Option<f64>,
    pub saved_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AttemptAnswer {
    pub fn new(
        session_id: SessionId,
        question_id: QuestionId,
        user_answer: serde_json::Value,
        response_time_ms: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            answer_id: AnswerId::new(),
            session_id,
            question_id,
            user_answer,
            response_time_ms,
            is_correct: None,
            score: None,
            saved_at: now,
            created_at: now,
        }
    }

    /// An answer is unscored if it has never been graded, or was graded
    /// to a hard zero with `is_correct=false` (§4.8 step 2: the set of
    /// answers a `score_round` call reconsiders).
    pub fn is_unscored(&self) -> bool {
        match (self.is_correct, self.score) {
            (None, _) => true,
            (Some(false), Some(score)) if score == 0.0 => true,
            _ => false,
        }
    }
}
