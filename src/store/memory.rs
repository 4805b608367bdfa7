//! In-memory `Store` implementation backing tests and the CLI demo binary.
//!
//! Each session is guarded by its own `tokio::sync::Mutex`, giving the
//! "row-level lock on the session" §5 calls for: concurrent `score_round`
//! calls on the same session serialize through that lock, while unrelated
//! sessions proceed independently. Grounded on the teacher's
//! `DashMap`-of-handles composition (`scheduler/mod.rs`'s
//! `Arc<DashMap<AgentId, ScheduledTask>>`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::types::{
    AttemptAnswer, ProfileSurvey, Question, QuestionId, RoundResult, Session, SessionId,
    SessionStatus, UserId,
};

use super::{AutosaveOutcome, Store, StoreError};

struct SessionRow {
    session: Session,
    questions: Vec<Question>,
    answers: std::collections::HashMap<QuestionId, AttemptAnswer>,
    round_result: Option<RoundResult>,
}

#[derive(Default)]
pub struct MemoryStore {
    profiles: DashMap<UserId, Vec<ProfileSurvey>>,
    sessions: DashMap<SessionId, Arc<Mutex<SessionRow>>>,
    user_sessions: DashMap<UserId, Vec<SessionId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn session_handle(&self, session_id: SessionId) -> Result<Arc<Mutex<SessionRow>>, StoreError> {
        self.sessions
            .get(&session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(StoreError::SessionNotFound(session_id))
    }

    /// True only once every question has a recorded, scored answer. A
    /// question with no entry in `answers` at all (never submitted) fails
    /// this, which is what keeps `complete_round` from auto-completing a
    /// partial round: scoring never synthesizes an answer row to paper over
    /// a missing one.
    fn all_scored(row: &SessionRow) -> bool {
        row.questions.iter().all(|q| {
            row.answers
                .get(&q.question_id)
                .is_some_and(|a| a.is_correct.is_some())
        })
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put_profile(&self, survey: ProfileSurvey) -> Result<(), StoreError> {
        self.profiles.entry(survey.user_id).or_default().push(survey);
        Ok(())
    }

    async fn latest_profile(&self, user_id: UserId) -> Result<Option<ProfileSurvey>, StoreError> {
        Ok(self
            .profiles
            .get(&user_id)
            .and_then(|v| v.iter().max_by_key(|s| s.submitted_at).cloned()))
    }

    async fn open_session(&self, session: Session) -> Result<(), StoreError> {
        let session_id = session.session_id;
        let user_id = session.user_id;
        self.sessions.insert(
            session_id,
            Arc::new(Mutex::new(SessionRow {
                session,
                questions: Vec::new(),
                answers: std::collections::HashMap::new(),
                round_result: None,
            })),
        );
        self.user_sessions.entry(user_id).or_default().push(session_id);
        Ok(())
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Option<Session>, StoreError> {
        match self.sessions.get(&session_id) {
            Some(entry) => Ok(Some(entry.value().lock().await.session.clone())),
            None => Ok(None),
        }
    }

    async fn latest_open_session(&self, user_id: UserId) -> Result<Option<Session>, StoreError> {
        let Some(ids) = self.user_sessions.get(&user_id) else {
            return Ok(None);
        };
        let mut candidates = Vec::new();
        for id in ids.value().iter().rev() {
            if let Some(handle) = self.sessions.get(id) {
                let row = handle.value().lock().await;
                if row.session.status != SessionStatus::Completed {
                    candidates.push(row.session.clone());
                }
            }
        }
        Ok(candidates.into_iter().max_by_key(|s| s.created_at))
    }

    async fn delete_session(&self, session_id: SessionId) -> Result<(), StoreError> {
        self.sessions.remove(&session_id);
        Ok(())
    }

    async fn set_session_status(
        &self,
        session_id: SessionId,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let handle = self.session_handle(session_id)?;
        let mut row = handle.lock().await;
        if row.session.status.is_terminal() {
            return Err(StoreError::SessionTerminal(session_id));
        }
        match status {
            SessionStatus::Paused => {
                row.session.status = SessionStatus::Paused;
                row.session.paused_at = Some(now);
            }
            SessionStatus::InProgress => {
                row.session.status = SessionStatus::InProgress;
                row.session.paused_at = None;
            }
            SessionStatus::Completed => {
                row.session.status = SessionStatus::Completed;
            }
        }
        Ok(row.session.clone())
    }

    async fn save_question(&self, question: Question) -> Result<Question, StoreError> {
        let handle = self.session_handle(question.session_id)?;
        let mut row = handle.lock().await;
        if let Some(existing) = row
            .questions
            .iter()
            .find(|q| q.ordinal == question.ordinal)
        {
            // Idempotent on (session_id, ordinal): first write wins.
            return Ok(existing.clone());
        }
        row.questions.push(question.clone());
        Ok(question)
    }

    async fn list_questions(&self, session_id: SessionId) -> Result<Vec<Question>, StoreError> {
        let handle = self.session_handle(session_id)?;
        let row = handle.lock().await;
        let mut qs = row.questions.clone();
        qs.sort_by_key(|q| q.ordinal);
        Ok(qs)
    }

    async fn get_question(&self, question_id: QuestionId) -> Result<Option<Question>, StoreError> {
        for entry in self.sessions.iter() {
            let row = entry.value().lock().await;
            if let Some(q) = row.questions.iter().find(|q| q.question_id == question_id) {
                return Ok(Some(q.clone()));
            }
        }
        Ok(None)
    }

    async fn get_answer(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
    ) -> Result<Option<AttemptAnswer>, StoreError> {
        let handle = self.session_handle(session_id)?;
        let row = handle.lock().await;
        Ok(row.answers.get(&question_id).cloned())
    }

    async fn list_answers(&self, session_id: SessionId) -> Result<Vec<AttemptAnswer>, StoreError> {
        let handle = self.session_handle(session_id)?;
        let row = handle.lock().await;
        Ok(row.answers.values().cloned().collect())
    }

    async fn autosave(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
        user_answer: serde_json::Value,
        response_time_ms: u64,
        now: DateTime<Utc>,
    ) -> Result<AutosaveOutcome, StoreError> {
        let handle = self.session_handle(session_id)?;
        let mut row = handle.lock().await;

        if row.session.status.is_terminal() {
            return Err(StoreError::SessionTerminal(session_id));
        }
        if !row.questions.iter().any(|q| q.question_id == question_id) {
            return Err(StoreError::QuestionNotInSession {
                session_id,
                question_id,
            });
        }

        if row.session.started_at.is_none() {
            row.session.started_at = Some(now);
        }

        let answer = row
            .answers
            .entry(question_id)
            .and_modify(|a| {
                a.user_answer = user_answer.clone();
                a.response_time_ms = response_time_ms;
                a.saved_at = now;
                a.is_correct = None;
                a.score = None;
            })
            .or_insert_with(|| {
                let mut a = AttemptAnswer::new(session_id, question_id, user_answer, response_time_ms);
                a.saved_at = now;
                a
            })
            .clone();

        // Deadline check, same transaction, after the write commits logically.
        let started_at = row.session.started_at.expect("set above");
        let elapsed = now - started_at;
        let exceeded = elapsed.num_milliseconds() as i64 > row.session.time_limit_ms as i64;
        if exceeded && row.session.status == SessionStatus::InProgress {
            row.session.status = SessionStatus::Paused;
            row.session.paused_at = Some(now);
        }

        Ok(AutosaveOutcome {
            session: row.session.clone(),
            answer,
        })
    }

    async fn record_scored_answer(&self, answer: AttemptAnswer) -> Result<(), StoreError> {
        let handle = self.session_handle(answer.session_id)?;
        let mut row = handle.lock().await;
        row.answers.insert(answer.question_id, answer);
        Ok(())
    }

    async fn complete_round(
        &self,
        session_id: SessionId,
        result: RoundResult,
        auto_complete: bool,
    ) -> Result<(RoundResult, bool), StoreError> {
        let handle = self.session_handle(session_id)?;
        let mut row = handle.lock().await;
        if row.session.status.is_terminal() {
            return Err(StoreError::SessionTerminal(session_id));
        }
        row.round_result = Some(result.clone());
        let mut completed = false;
        if auto_complete && Self::all_scored(&row) {
            row.session.status = SessionStatus::Completed;
            completed = true;
        }
        Ok((result, completed))
    }

    async fn latest_round_result(
        &self,
        session_id: SessionId,
    ) -> Result<Option<RoundResult>, StoreError> {
        let handle = self.session_handle(session_id)?;
        let row = handle.lock().await;
        Ok(row.round_result.clone())
    }
}
