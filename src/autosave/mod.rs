//! Autosave Service (C7, §4.7): upserts answers, stamps timing, auto-pauses
//! on deadline. Thin wrapper over `Store::autosave`, which owns the
//! single-transaction semantics; this module owns the precondition checks
//! that must be surfaced as structured errors before the store is touched.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::error::{AssessmentError, AssessmentResult};
use crate::store::Store;
use crate::types::{QuestionId, SessionId, SessionStatus};

#[derive(Debug, Clone, Serialize)]
pub struct SaveAnswerOutcome {
    pub saved: bool,
    pub saved_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeStatus {
    pub elapsed_ms: i64,
    pub remaining_ms: i64,
    pub exceeded: bool,
}

pub struct AutosaveService {
    store: Arc<dyn Store>,
}

impl AutosaveService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn save_answer(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
        user_answer: serde_json::Value,
        response_time_ms: u64,
    ) -> AssessmentResult<SaveAnswerOutcome> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| AssessmentError::NotFound(format!("session {session_id}")))?;
        if session.status.is_terminal() {
            return Err(AssessmentError::SessionTerminal { session_id });
        }

        let outcome = self
            .store
            .autosave(session_id, question_id, user_answer, response_time_ms, Utc::now())
            .await
            .map_err(|e| match e {
                crate::store::StoreError::QuestionNotInSession { session_id, question_id } => {
                    AssessmentError::QuestionNotInSession { session_id, question_id }
                }
                crate::store::StoreError::SessionTerminal(session_id) => {
                    AssessmentError::SessionTerminal { session_id }
                }
                other => AssessmentError::Store(other),
            })?;

        Ok(SaveAnswerOutcome {
            saved: true,
            saved_at: outcome.answer.saved_at,
        })
    }

    pub async fn time_status(&self, session_id: SessionId) -> AssessmentResult<TimeStatus> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| AssessmentError::NotFound(format!("session {session_id}")))?;

        let Some(started_at) = session.started_at else {
            return Ok(TimeStatus {
                elapsed_ms: 0,
                remaining_ms: session.time_limit_ms as i64,
                exceeded: false,
            });
        };

        let now = session.reference_instant(Utc::now());
        let elapsed_ms = (now - started_at).num_milliseconds();
        let remaining_ms = session.time_limit_ms as i64 - elapsed_ms;
        Ok(TimeStatus {
            elapsed_ms,
            remaining_ms,
            exceeded: elapsed_ms > session.time_limit_ms as i64,
        })
    }

    /// Explicit resume (§4.7: "resuming is an explicit operation only").
    pub async fn resume(&self, session_id: SessionId) -> AssessmentResult<()> {
        self.store
            .set_session_status(session_id, SessionStatus::InProgress, Utc::now())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::types::{AnswerSchema, ItemType, Question, Session, SurveyId, UserId};

    async fn setup() -> (AutosaveService, Arc<dyn Store>, SessionId, QuestionId) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let session = Session::open(UserId::new(), SurveyId::new(), 1, 600_000);
        let session_id = session.session_id;
        store.open_session(session).await.unwrap();
        let question = Question {
            question_id: QuestionId::new(),
            session_id,
            ordinal: 1,
            item_type: ItemType::MultipleChoice,
            stem: "s".into(),
            choices: Some(vec!["A".into(), "B".into()]),
            answer_schema: AnswerSchema::exact_match("A", "canonical"),
            difficulty: 3,
            category: "rust".into(),
            created_at: Utc::now(),
        };
        let question_id = question.question_id;
        store.save_question(question).await.unwrap();
        (AutosaveService::new(store.clone()), store, session_id, question_id)
    }

    #[tokio::test]
    async fn save_answer_sets_started_at_on_first_call() {
        let (service, store, session_id, question_id) = setup().await;
        service
            .save_answer(session_id, question_id, serde_json::json!({"selected_key": "A"}), 100)
            .await
            .unwrap();
        let session = store.get_session(session_id).await.unwrap().unwrap();
        assert!(session.started_at.is_some());
    }

    #[tokio::test]
    async fn save_answer_rejects_question_outside_session() {
        let (service, _store, session_id, _question_id) = setup().await;
        let stray = QuestionId::new();
        let err = service
            .save_answer(session_id, stray, serde_json::json!({"selected_key": "A"}), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, AssessmentError::QuestionNotInSession { .. }));
    }

    #[tokio::test]
    async fn time_status_before_start_reports_full_budget() {
        let (_service, store, session_id, _question_id) = setup().await;
        let status_service = AutosaveService::new(store);
        let status = status_service.time_status(session_id).await.unwrap();
        assert_eq!(status.elapsed_ms, 0);
        assert!(!status.exceeded);
    }
}
