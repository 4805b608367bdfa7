//! Session State Machine (C10, §4.10): owns explicit status transitions
//! and the `PRECONDITION_FAILED` rule for manual completion. Auto-complete
//! itself lives in the scoring transaction (C8); this module only covers
//! the transitions a caller can trigger directly.

use std::sync::Arc;

use crate::error::{AssessmentError, AssessmentResult};
use crate::store::Store;
use crate::types::{Session, SessionId, SessionStatus};

pub struct SessionMachine {
    store: Arc<dyn Store>,
}

impl SessionMachine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn pause(&self, session_id: SessionId) -> AssessmentResult<Session> {
        self.transition(session_id, SessionStatus::Paused).await
    }

    pub async fn resume(&self, session_id: SessionId) -> AssessmentResult<Session> {
        self.transition(session_id, SessionStatus::InProgress).await
    }

    /// Explicit `complete`: allowed only if every question in the session
    /// has an answer (§4.10). Scored-ness is not required here — that's
    /// the auto-complete path's stricter condition.
    pub async fn complete(&self, session_id: SessionId) -> AssessmentResult<Session> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| AssessmentError::NotFound(format!("session {session_id}")))?;
        if session.status.is_terminal() {
            return Err(AssessmentError::SessionTerminal { session_id });
        }

        let questions = self.store.list_questions(session_id).await?;
        let answers = self.store.list_answers(session_id).await?;
        let answered: std::collections::HashSet<_> =
            answers.iter().map(|a| a.question_id).collect();
        let all_answered = questions.iter().all(|q| answered.contains(&q.question_id));
        if !all_answered {
            return Err(AssessmentError::PreconditionFailed(
                "not all questions have an answer".into(),
            ));
        }

        self.transition(session_id, SessionStatus::Completed).await
    }

    async fn transition(
        &self,
        session_id: SessionId,
        to: SessionStatus,
    ) -> AssessmentResult<Session> {
        let session = self
            .store
            .set_session_status(session_id, to, chrono::Utc::now())
            .await?;
        Ok(session)
    }
}
