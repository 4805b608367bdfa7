//! Generation Service (C6, §4.6): opens a session, drives C3 with retries,
//! and persists the resulting items.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::adaptive::AdaptiveParams;
use crate::agent::{run_react_loop, CancellationToken, ReactConfig, ReactTermination};
use crate::config::GenerationConfig;
use crate::error::{AssessmentError, AssessmentResult};
use crate::llm::{InferenceProvider, ToolDefinition};
use crate::output::{self, GeneratedItem};
use crate::store::Store;
use crate::tools::{DraftQuestion, ToolSurface};
use crate::types::{ProfileSurvey, Question, SessionId, SurveyId, UserId};

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub session_id: SessionId,
    pub questions: Vec<Question>,
    pub attempt_number: u32,
    pub total_tokens: u32,
}

pub struct GenerationService {
    store: Arc<dyn Store>,
    tools: Arc<dyn ToolSurface>,
    provider: Arc<dyn InferenceProvider>,
    config: GenerationConfig,
}

impl GenerationService {
    pub fn new(
        store: Arc<dyn Store>,
        tools: Arc<dyn ToolSurface>,
        provider: Arc<dyn InferenceProvider>,
        config: GenerationConfig,
    ) -> Self {
        Self { store, tools, provider, config }
    }

    /// §4.6.1: fresh session every call; retakes never resurrect a
    /// `completed` session.
    pub async fn generate_round(
        &self,
        user_id: UserId,
        survey_id: SurveyId,
        round_index: u32,
        n: u32,
        adaptive_params: Option<AdaptiveParams>,
        time_limit_ms: u64,
        cancel: &CancellationToken,
    ) -> AssessmentResult<GenerationOutcome> {
        let profile = self
            .store
            .latest_profile(user_id)
            .await?
            .ok_or_else(|| AssessmentError::NotFound(format!("profile for user {user_id}")))?;

        let session = crate::types::Session::open(user_id, survey_id, round_index, time_limit_ms);
        let session_id = session.session_id;
        self.store.open_session(session).await?;

        let (system_prompt, user_prompt, tool_defs) =
            build_agent_input(&profile, round_index, n, adaptive_params.as_ref());

        let mut attempt_number = 0u32;
        let mut accumulated: Vec<GeneratedItem> = Vec::new();
        let mut last_diagnostic = String::new();

        for attempt in 1..=self.config.max_attempts {
            attempt_number = attempt;
            if cancel.is_cancelled() {
                return Err(AssessmentError::Cancelled);
            }

            let outcome = run_react_loop(
                self.provider.as_ref(),
                self.tools.clone(),
                session_id,
                system_prompt.clone(),
                user_prompt.clone(),
                tool_defs.clone(),
                ReactConfig { max_iterations: self.config.max_iterations },
                cancel,
            )
            .await;

            if outcome.termination == ReactTermination::Cancelled {
                return Err(AssessmentError::Cancelled);
            }

            let conversion = output::convert(&outcome.transcript);
            if !conversion.items.is_empty() {
                accumulated = conversion.items;
                break;
            }
            last_diagnostic = conversion
                .diagnostics
                .first()
                .map(|d| d.reason.clone())
                .unwrap_or_else(|| "no valid items produced".into());

            if attempt < self.config.max_attempts {
                let backoff = self.config.backoff_base * attempt;
                tokio::time::sleep(backoff).await;
            }
        }

        if accumulated.is_empty() {
            self.store.delete_session(session_id).await?;
            return Err(AssessmentError::GenerationExhausted {
                attempts: attempt_number,
                reason: last_diagnostic,
            });
        }

        if accumulated.len() < self.config.min_items as usize {
            self.store.delete_session(session_id).await?;
            return Err(AssessmentError::GenerationExhausted {
                attempts: attempt_number,
                reason: format!(
                    "only {} valid item(s), below min_items={}",
                    accumulated.len(),
                    self.config.min_items
                ),
            });
        }

        let mut saved = Vec::with_capacity(accumulated.len());
        for (idx, item) in accumulated.into_iter().enumerate() {
            let draft = DraftQuestion {
                ordinal: (idx + 1) as u32,
                item_type: item_type_str(item.item_type),
                stem: item.stem,
                choices: item.choices,
                answer_schema: serde_json::to_value(&item.answer_schema).unwrap(),
                correct_answer: None,
                difficulty: item.difficulty,
                category: item.category,
            };
            let result = self.tools.save_generated_question(session_id, draft).await?;
            if let Some(question) = self.store.get_question(result.question_id).await? {
                saved.push(question);
            }
        }

        Ok(GenerationOutcome {
            session_id,
            questions: saved,
            attempt_number,
            total_tokens: 0,
        })
    }
}

fn item_type_str(t: crate::types::ItemType) -> String {
    match t {
        crate::types::ItemType::MultipleChoice => "multiple_choice".into(),
        crate::types::ItemType::TrueFalse => "true_false".into(),
        crate::types::ItemType::ShortAnswer => "short_answer".into(),
    }
}

fn build_agent_input(
    profile: &ProfileSurvey,
    round_index: u32,
    n: u32,
    adaptive_params: Option<&AdaptiveParams>,
) -> (String, String, Vec<ToolDefinition>) {
    // Prompt content is never fed through a templating facility that would
    // reinterpret `{...}` (§9); this is a plain owned String.
    let system_prompt = "You are an assessment item generator. Use the available tools to \
        research the user's profile and assemble high-quality questions, then \
        reply with 'Final Answer:' followed by a JSON array of question objects."
        .to_string();

    let mut user_prompt = format!(
        "Generate {n} questions for round {round_index}. Profile: level={:?}, years={}, role={}, duty={}, interests={:?}.",
        profile.self_level, profile.years, profile.job_role, profile.duty, profile.interests
    );
    if let Some(params) = adaptive_params {
        user_prompt.push_str(&format!(
            " Adaptive hints: target_difficulty={}, category_weights={:?}, include_short_answer={}.",
            params.target_difficulty, params.category_weights, params.include_short_answer
        ));
    }

    let tool_defs = crate::tools::TOOL_NAMES
        .iter()
        .map(|name| ToolDefinition {
            name: name.to_string(),
            description: format!("Assessment tool: {name}"),
            parameters: serde_json::json!({"type": "object"}),
        })
        .collect();

    (system_prompt, user_prompt, tool_defs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FinishReason, InferenceResponse, MockInferenceProvider, Usage};
    use crate::store::memory::MemoryStore;
    use crate::tools::DefaultToolSurface;
    use crate::types::SelfLevel;
    use std::collections::BTreeSet;

    fn sample_item_json(ordinal: u32) -> serde_json::Value {
        serde_json::json!({
            "item_type": "multiple_choice",
            "stem": format!("question {ordinal}"),
            "choices": ["A", "B", "C", "D"],
            "correct_answer": "A",
            "answer_schema": {"type": "exact_match", "correct_answer": "A"},
            "difficulty": 5,
            "category": "rust",
        })
    }

    async fn seeded_store() -> (Arc<dyn Store>, UserId, SurveyId) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let user_id = UserId::new();
        let mut interests = BTreeSet::new();
        interests.insert("rust".to_string());
        let profile = ProfileSurvey::new(user_id, SelfLevel::Intermediate, 3, "engineer", "backend", interests);
        let survey_id = profile.survey_id;
        store.put_profile(profile).await.unwrap();
        (store, user_id, survey_id)
    }

    #[tokio::test]
    async fn generate_round_persists_items_on_first_attempt() {
        let (store, user_id, survey_id) = seeded_store().await;
        let tools: Arc<dyn ToolSurface> = Arc::new(DefaultToolSurface::new(store.clone()));
        let items: Vec<_> = (1..=5).map(sample_item_json).collect();
        let provider: Arc<dyn InferenceProvider> = Arc::new(MockInferenceProvider::new(vec![InferenceResponse {
            content: format!("Final Answer: {}", serde_json::Value::Array(items)),
            tool_calls: vec![],
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        }]));
        let service = GenerationService::new(store.clone(), tools, provider, GenerationConfig::default());
        let outcome = service
            .generate_round(user_id, survey_id, 1, 5, None, 600_000, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.questions.len(), 5);
        assert_eq!(outcome.attempt_number, 1);
    }

    #[tokio::test]
    async fn generate_round_retries_then_exhausts() {
        let (store, user_id, survey_id) = seeded_store().await;
        let tools: Arc<dyn ToolSurface> = Arc::new(DefaultToolSurface::new(store.clone()));
        let empty_reply = InferenceResponse {
            content: "Final Answer: []".into(),
            tool_calls: vec![],
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        };
        let provider: Arc<dyn InferenceProvider> =
            Arc::new(MockInferenceProvider::new(vec![empty_reply.clone(), empty_reply.clone(), empty_reply]));
        let config = GenerationConfig {
            backoff_base: Duration::from_millis(1),
            ..GenerationConfig::default()
        };
        let service = GenerationService::new(store.clone(), tools, provider, config);
        let err = service
            .generate_round(user_id, survey_id, 1, 5, None, 600_000, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "GEN_EXHAUSTED");
        assert!(store.get_session(SessionId::new()).await.unwrap().is_none());
    }
}
