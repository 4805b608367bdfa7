//! Scoring Service (C8, §4.8): scores all unscored answers, aggregates a
//! round result, applies the time penalty, and (optionally) auto-completes.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::answer_schema::parse_boolish;
use crate::error::{AssessmentError, AssessmentResult};
use crate::store::Store;
use crate::types::{AnswerPayload, ItemType, Question, RoundResult, SessionId};

#[derive(Debug, Clone, Serialize)]
pub struct ScoreRoundOutcome {
    pub score: f64,
    pub correct_count: u32,
    pub total_count: u32,
    pub wrong_categories: BTreeMap<String, u32>,
    pub auto_completed: bool,
}

pub struct ScoringService {
    store: Arc<dyn Store>,
}

impl ScoringService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn score_round(
        &self,
        session_id: SessionId,
        auto_complete: bool,
    ) -> AssessmentResult<ScoreRoundOutcome> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| AssessmentError::NotFound(format!("session {session_id}")))?;
        if session.status == crate::types::SessionStatus::Completed {
            // §4.8 step-5 idempotence: a fully scored, completed round
            // returns its existing RoundResult unchanged.
            if let Some(existing) = self.store.latest_round_result(session_id).await? {
                return Ok(ScoreRoundOutcome {
                    score: existing.score,
                    correct_count: existing.correct_count,
                    total_count: existing.total_count,
                    wrong_categories: existing.wrong_categories,
                    auto_completed: false,
                });
            }
        }

        let questions = self.store.list_questions(session_id).await?;
        let answers = self.store.list_answers(session_id).await?;
        let answers_by_question: std::collections::HashMap<_, _> =
            answers.into_iter().map(|a| (a.question_id, a)).collect();

        let now = Utc::now();
        let reference = session.reference_instant(now);
        let elapsed_ms = session
            .started_at
            .map(|started| (reference - started).num_milliseconds().max(0))
            .unwrap_or(0);

        let mut correct_count = 0u32;
        let mut wrong_categories: BTreeMap<String, u32> = BTreeMap::new();
        let mut final_scores = Vec::with_capacity(questions.len());

        for question in &questions {
            let existing = answers_by_question.get(&question.question_id);
            let (is_correct, final_score) = match existing {
                Some(answer) if !answer.is_unscored() => {
                    (answer.is_correct.unwrap_or(false), answer.score.unwrap_or(0.0))
                }
                Some(answer) => {
                    let (is_correct, base_score) = score_item(question, &answer.user_answer);
                    let final_score = apply_time_penalty(base_score, elapsed_ms, session.time_limit_ms);
                    let mut scored = answer.clone();
                    scored.is_correct = Some(is_correct);
                    scored.score = Some(final_score);
                    self.store.record_scored_answer(scored).await?;
                    (is_correct, final_score)
                }
                None => {
                    // §4.8 tie-break: an unanswered question counts wrong in this
                    // round's aggregates. No answer row is synthesized for it, so
                    // auto-complete still requires a real answer for every question.
                    (false, 0.0)
                }
            };

            if is_correct {
                correct_count += 1;
            } else {
                *wrong_categories.entry(question.category.clone()).or_insert(0) += 1;
            }
            final_scores.push(final_score);
        }

        let total_count = questions.len() as u32;
        let avg_score = if final_scores.is_empty() {
            0.0
        } else {
            final_scores.iter().sum::<f64>() / final_scores.len() as f64
        };

        let result = RoundResult::new(
            session_id,
            session.round_index,
            avg_score,
            correct_count,
            total_count,
            wrong_categories.clone(),
        );
        let (result, completed) = self.store.complete_round(session_id, result, auto_complete).await?;

        Ok(ScoreRoundOutcome {
            score: result.score,
            correct_count: result.correct_count,
            total_count: result.total_count,
            wrong_categories: result.wrong_categories,
            auto_completed: completed,
        })
    }
}

/// `(is_correct, base_score)` for one item, by `item_type` (§4.8 step 2).
fn score_item(question: &Question, user_answer: &serde_json::Value) -> (bool, f64) {
    match question.item_type {
        ItemType::MultipleChoice => {
            let selected = user_answer.get("selected_key").and_then(|v| v.as_str()).unwrap_or("");
            if let AnswerPayload::ExactMatch { correct_answer } = &question.answer_schema.payload {
                let is_correct = selected.trim() == correct_answer.trim();
                (is_correct, if is_correct { 100.0 } else { 0.0 })
            } else {
                (false, 0.0)
            }
        }
        ItemType::TrueFalse => {
            let given = user_answer
                .get("answer")
                .and_then(|v| match v {
                    serde_json::Value::Bool(b) => Some(*b),
                    serde_json::Value::String(s) => parse_boolish(s),
                    serde_json::Value::Number(n) => n.as_i64().map(|i| i != 0),
                    _ => None,
                });
            if let AnswerPayload::TrueFalse { correct_bool } = &question.answer_schema.payload {
                let is_correct = given == Some(*correct_bool);
                (is_correct, if is_correct { 100.0 } else { 0.0 })
            } else {
                (false, 0.0)
            }
        }
        ItemType::ShortAnswer => {
            let text = match user_answer {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Object(map) => map
                    .get("text")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                _ => String::new(),
            };
            if let AnswerPayload::KeywordMatch { keywords } = &question.answer_schema.payload {
                if keywords.is_empty() {
                    let is_correct = !text.trim().is_empty();
                    return (is_correct, if is_correct { 100.0 } else { 0.0 });
                }
                let lower = text.to_lowercase();
                let mut seen = std::collections::HashSet::new();
                let hits = keywords
                    .iter()
                    .map(|k| k.to_lowercase())
                    .filter(|k| seen.insert(k.clone()))
                    .filter(|k| lower.contains(k.as_str()))
                    .count();
                let base_score = 100.0 * hits as f64 / keywords.len() as f64;
                (hits == keywords.len(), base_score)
            } else {
                (false, 0.0)
            }
        }
    }
}

/// §4.8 step 3's time-penalty formula: linear erosion, fully erased at 2x
/// overtime.
fn apply_time_penalty(base_score: f64, elapsed_ms: i64, time_limit_ms: u64) -> f64 {
    if elapsed_ms <= time_limit_ms as i64 {
        return base_score;
    }
    let excess_ratio = (elapsed_ms - time_limit_ms as i64) as f64 / time_limit_ms as f64;
    (base_score - excess_ratio * base_score).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::types::{AnswerSchema, Question, QuestionId, Session, SurveyId, UserId};

    fn mc_question(session_id: SessionId, ordinal: u32, category: &str) -> Question {
        Question {
            question_id: QuestionId::new(),
            session_id,
            ordinal,
            item_type: ItemType::MultipleChoice,
            stem: format!("q{ordinal}"),
            choices: Some(vec!["A".into(), "B".into()]),
            answer_schema: AnswerSchema::exact_match("A", "canonical"),
            difficulty: 3,
            category: category.into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn happy_path_all_correct_auto_completes() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let session = Session::open(UserId::new(), SurveyId::new(), 1, 600_000);
        let session_id = session.session_id;
        store.open_session(session).await.unwrap();

        for i in 1..=5 {
            let q = mc_question(session_id, i, "rust");
            let qid = q.question_id;
            store.save_question(q).await.unwrap();
            store
                .autosave(session_id, qid, serde_json::json!({"selected_key": "A"}), 100, Utc::now())
                .await
                .unwrap();
        }

        let service = ScoringService::new(store.clone());
        let outcome = service.score_round(session_id, true).await.unwrap();
        assert_eq!(outcome.score, 100.0);
        assert_eq!(outcome.correct_count, 5);
        assert_eq!(outcome.total_count, 5);
        assert!(outcome.wrong_categories.is_empty());
        assert!(outcome.auto_completed);
    }

    #[tokio::test]
    async fn partial_answers_keep_session_open() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let session = Session::open(UserId::new(), SurveyId::new(), 1, 600_000);
        let session_id = session.session_id;
        store.open_session(session).await.unwrap();

        for i in 1..=5 {
            let q = mc_question(session_id, i, "rust");
            let qid = q.question_id;
            store.save_question(q).await.unwrap();
            if i <= 3 {
                store
                    .autosave(session_id, qid, serde_json::json!({"selected_key": "A"}), 100, Utc::now())
                    .await
                    .unwrap();
            }
        }

        let service = ScoringService::new(store.clone());
        let outcome = service.score_round(session_id, true).await.unwrap();
        assert_eq!(outcome.total_count, 5);
        assert!(!outcome.auto_completed);
        assert_eq!(outcome.wrong_categories.get("rust"), Some(&2));
    }

    #[test]
    fn short_answer_partial_credit_matches_scenario_s3() {
        let session_id = SessionId::new();
        let q = Question {
            question_id: QuestionId::new(),
            session_id,
            ordinal: 1,
            item_type: ItemType::ShortAnswer,
            stem: "describe prep".into(),
            choices: None,
            answer_schema: AnswerSchema::keyword_match(
                vec!["data cleaning".into(), "feature engineering".into(), "normalization".into()],
                "canonical",
            ),
            difficulty: 5,
            category: "ml".into(),
            created_at: Utc::now(),
        };
        let (is_correct, score) = score_item(&q, &serde_json::json!("Data Cleaning and normalization"));
        assert!(!is_correct);
        assert!((score - 66.666).abs() < 0.01);
    }

    #[test]
    fn time_penalty_erases_fully_at_2x_overtime() {
        let limit = 1_200_000u64;
        let elapsed = (limit as f64 * 1.55) as i64; // matches scenario S4
        let score = apply_time_penalty(100.0, elapsed, limit);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn time_penalty_is_monotonic_nonincreasing() {
        let limit = 600_000u64;
        let s1 = apply_time_penalty(80.0, 700_000, limit);
        let s2 = apply_time_penalty(80.0, 900_000, limit);
        assert!(s2 <= s1);
    }
}
