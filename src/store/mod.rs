//! The transactional persistence boundary (§3.2, §5).
//!
//! All entities are persisted in a transactional store; within the core,
//! reads/writes are grouped so that `Session` status changes happen in the
//! same atomic unit as the rows that justify them. The trait below names
//! those atomic combos explicitly (`autosave`, `complete_round`) rather than
//! exposing a generic transaction handle, the same way the tool surface
//! (C1) is a named capability set rather than a class hierarchy.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{
    AttemptAnswer, ProfileSurvey, Question, QuestionId, RoundResult, Session, SessionId,
    SessionStatus, UserId,
};

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("question not found: {0}")]
    QuestionNotFound(QuestionId),

    #[error("question {question_id} does not belong to session {session_id}")]
    QuestionNotInSession {
        session_id: SessionId,
        question_id: QuestionId,
    },

    #[error("session {0} is terminal")]
    SessionTerminal(SessionId),
}

/// The store's view of an autosave write: the session (post deadline-check)
/// and the upserted answer.
pub struct AutosaveOutcome {
    pub session: Session,
    pub answer: AttemptAnswer,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn put_profile(&self, survey: ProfileSurvey) -> Result<(), StoreError>;
    async fn latest_profile(&self, user_id: UserId) -> Result<Option<ProfileSurvey>, StoreError>;

    async fn open_session(&self, session: Session) -> Result<(), StoreError>;
    async fn get_session(&self, session_id: SessionId) -> Result<Option<Session>, StoreError>;
    /// Most recent non-`completed` session for a user (backs `/questions/resume`).
    async fn latest_open_session(&self, user_id: UserId) -> Result<Option<Session>, StoreError>;
    async fn delete_session(&self, session_id: SessionId) -> Result<(), StoreError>;

    /// Explicit status transition (pause/resume/complete) outside of the
    /// scoring or autosave paths (§4.10's "explicit pause/resume/complete"
    /// rows). Does not itself check auto-complete preconditions; callers
    /// (C10) enforce those before calling.
    async fn set_session_status(
        &self,
        session_id: SessionId,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> Result<Session, StoreError>;

    /// Idempotent on `(session_id, ordinal)` per §4.1's `save_generated_question`.
    async fn save_question(&self, question: Question) -> Result<Question, StoreError>;
    async fn list_questions(&self, session_id: SessionId) -> Result<Vec<Question>, StoreError>;
    async fn get_question(&self, question_id: QuestionId) -> Result<Option<Question>, StoreError>;

    async fn get_answer(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
    ) -> Result<Option<AttemptAnswer>, StoreError>;
    async fn list_answers(&self, session_id: SessionId) -> Result<Vec<AttemptAnswer>, StoreError>;

    /// §4.7: sets `started_at` if unset, upserts the answer keyed by
    /// `(session_id, question_id)`, then — still in the same transaction —
    /// evaluates the deadline and flips the session to `paused` if exceeded.
    async fn autosave(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
        user_answer: serde_json::Value,
        response_time_ms: u64,
        now: DateTime<Utc>,
    ) -> Result<AutosaveOutcome, StoreError>;

    /// Persists a scored answer's `is_correct`/`score` (§4.8 step 3).
    async fn record_scored_answer(&self, answer: AttemptAnswer) -> Result<(), StoreError>;

    /// §4.8 step 5 / §9's "no split-brain state": inserts the `RoundResult`
    /// and, iff `auto_complete` and every question is now scored, flips the
    /// session to `completed` — in the same atomic unit. Returns the result
    /// and whether the session was completed by this call.
    async fn complete_round(
        &self,
        session_id: SessionId,
        result: RoundResult,
        auto_complete: bool,
    ) -> Result<(RoundResult, bool), StoreError>;

    async fn latest_round_result(
        &self,
        session_id: SessionId,
    ) -> Result<Option<RoundResult>, StoreError>;
}
