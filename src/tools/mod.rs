//! Tool Surface (C1, §4.1): six named capabilities the agent may invoke.
//!
//! "The tool surface is a capability set, not a class hierarchy;
//! implementations are swappable (real store vs. fakes for tests). The
//! agent sees only names, argument schemas, and responses." — grounded on
//! the teacher's `ToolInvocationEnforcer`/`McpClient` split between a
//! capability trait and a dispatch-by-name entry point
//! (`integrations/tool_invocation.rs`, `integrations/mcp/mod.rs`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::answer_schema;
use crate::store::Store;
use crate::types::{ItemType, Question, QuestionId, SessionId, UserId};

#[derive(Error, Debug, Clone)]
pub enum ToolError {
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    #[error("invalid tool arguments: {0}")]
    Invalid(String),

    #[error("UNKNOWN_TOOL: {0}")]
    UnknownTool(String),

    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
}

/// The six tool names, exactly as the agent's system prompt advertises them.
pub const TOOL_NAMES: [&str; 6] = [
    "get_user_profile",
    "search_question_templates",
    "get_difficulty_keywords",
    "validate_question_quality",
    "save_generated_question",
    "score_and_explain",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub self_level: String,
    pub years: u32,
    pub job_role: String,
    pub duty: String,
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionTemplate {
    pub stem: String,
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    pub correct_answer: String,
    pub correct_rate: f64,
    pub usage_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyKeywords {
    pub keywords: Vec<String>,
    pub concepts: Vec<String>,
    pub example_questions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ValidateQuestionInput {
    pub stem: String,
    pub item_type: String,
    #[serde(default)]
    pub choices: Option<Vec<String>>,
    #[serde(default)]
    pub correct_answer: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Pass,
    Revise,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub is_valid: bool,
    pub semantic_score: f64,
    pub rule_score: f64,
    pub final_score: f64,
    pub issues: Vec<String>,
    pub recommendation: Recommendation,
}

/// A question as proposed by the agent, prior to schema normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftQuestion {
    pub ordinal: u32,
    pub item_type: String,
    pub stem: String,
    #[serde(default)]
    pub choices: Option<Vec<String>>,
    /// Any of the shapes §4.5 recognizes; normalized on save.
    pub answer_schema: serde_json::Value,
    #[serde(default)]
    pub correct_answer: Option<String>,
    pub difficulty: u8,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveQuestionResult {
    pub question_id: QuestionId,
    pub saved_at: chrono::DateTime<chrono::Utc>,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreAndExplainResult {
    pub is_correct: bool,
    pub base_score: f64,
    pub explanation: String,
}

#[async_trait]
pub trait ToolSurface: Send + Sync {
    async fn get_user_profile(&self, user_id: UserId) -> Result<ProfileResponse, ToolError>;

    async fn search_question_templates(
        &self,
        interests: &[String],
        difficulty: u8,
        category: &str,
    ) -> Result<Vec<QuestionTemplate>, ToolError>;

    async fn get_difficulty_keywords(
        &self,
        difficulty: u8,
        category: &str,
    ) -> Result<DifficultyKeywords, ToolError>;

    async fn validate_question_quality(
        &self,
        input: &ValidateQuestionInput,
    ) -> Result<QualityReport, ToolError>;

    async fn save_generated_question(
        &self,
        session_id: SessionId,
        draft: DraftQuestion,
    ) -> Result<SaveQuestionResult, ToolError>;

    async fn score_and_explain(
        &self,
        question: &Question,
        user_answer: &serde_json::Value,
    ) -> Result<ScoreAndExplainResult, ToolError>;

    /// Dynamic dispatch by name for the ReAct loop (C3): the model names a
    /// tool and supplies JSON arguments; unknown names surface as a tool
    /// result rather than raising (§4.3 failure modes).
    async fn invoke(
        &self,
        session_id: SessionId,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError>;
}

/// Default tool surface backed by the persistence store plus a small
/// curated reference dataset for templates/keywords (these are reference
/// few-shot material, not user data — a fixture table is the right shape,
/// same role as the teacher's `MockMcpClient` fixtures play in tests).
pub struct DefaultToolSurface {
    store: Arc<dyn Store>,
}

impl DefaultToolSurface {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolSurface for DefaultToolSurface {
    async fn get_user_profile(&self, user_id: UserId) -> Result<ProfileResponse, ToolError> {
        let survey = self
            .store
            .latest_profile(user_id)
            .await?
            .ok_or_else(|| ToolError::NotFound(format!("no profile for user {user_id}")))?;
        Ok(ProfileResponse {
            self_level: format!("{:?}", survey.self_level).to_lowercase(),
            years: survey.years,
            job_role: survey.job_role,
            duty: survey.duty,
            interests: survey.interests.into_iter().collect(),
        })
    }

    async fn search_question_templates(
        &self,
        interests: &[String],
        difficulty: u8,
        category: &str,
    ) -> Result<Vec<QuestionTemplate>, ToolError> {
        let mut templates = reference_templates(category, difficulty);
        let interests_lower: Vec<String> = interests.iter().map(|i| i.to_lowercase()).collect();
        let matches_interest = |t: &QuestionTemplate| {
            interests_lower.iter().any(|i| t.stem.to_lowercase().contains(i.as_str()))
        };
        // Category match already filtered by `reference_templates`; interests
        // only refine ordering, putting stem matches first.
        templates.sort_by(|a, b| {
            matches_interest(b)
                .cmp(&matches_interest(a))
                .then(
                    b.correct_rate
                        .partial_cmp(&a.correct_rate)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(b.usage_count.cmp(&a.usage_count))
        });
        templates.truncate(5);
        Ok(templates)
    }

    async fn get_difficulty_keywords(
        &self,
        difficulty: u8,
        category: &str,
    ) -> Result<DifficultyKeywords, ToolError> {
        Ok(reference_keywords(category, difficulty))
    }

    async fn validate_question_quality(
        &self,
        input: &ValidateQuestionInput,
    ) -> Result<QualityReport, ToolError> {
        Ok(score_quality(input))
    }

    async fn save_generated_question(
        &self,
        session_id: SessionId,
        draft: DraftQuestion,
    ) -> Result<SaveQuestionResult, ToolError> {
        if draft.stem.trim().is_empty() {
            return Err(ToolError::Invalid("stem must not be empty".into()));
        }
        if draft.category.trim().is_empty() {
            return Err(ToolError::Invalid("category must not be empty".into()));
        }
        let item_type = parse_item_type(&draft.item_type)
            .ok_or_else(|| ToolError::Invalid(format!("unknown item_type {}", draft.item_type)))?;

        let schema = answer_schema::normalize(
            &draft.answer_schema,
            item_type,
            draft.correct_answer.as_deref(),
        )
        .map_err(|e| ToolError::Invalid(e.to_string()))?;

        let question = Question {
            question_id: QuestionId::new(),
            session_id,
            ordinal: draft.ordinal,
            item_type,
            stem: draft.stem,
            choices: draft.choices,
            answer_schema: schema,
            difficulty: draft.difficulty,
            category: draft.category,
            created_at: chrono::Utc::now(),
        };
        let saved = self.store.save_question(question).await?;
        Ok(SaveQuestionResult {
            question_id: saved.question_id,
            saved_at: saved.created_at,
            success: true,
        })
    }

    async fn score_and_explain(
        &self,
        question: &Question,
        user_answer: &serde_json::Value,
    ) -> Result<ScoreAndExplainResult, ToolError> {
        use crate::types::AnswerPayload;
        let text = extract_text(user_answer);
        match &question.answer_schema.payload {
            AnswerPayload::KeywordMatch { keywords } if !keywords.is_empty() => {
                let normalized_text = text.to_lowercase();
                let hits = keywords
                    .iter()
                    .filter(|k| normalized_text.contains(&k.to_lowercase()))
                    .count();
                let base_score = 100.0 * hits as f64 / keywords.len() as f64;
                Ok(ScoreAndExplainResult {
                    is_correct: hits == keywords.len(),
                    base_score,
                    explanation: format!(
                        "matched {hits}/{} required keywords",
                        keywords.len()
                    ),
                })
            }
            AnswerPayload::KeywordMatch { .. } => {
                let is_correct = !text.trim().is_empty();
                Ok(ScoreAndExplainResult {
                    is_correct,
                    base_score: if is_correct { 100.0 } else { 0.0 },
                    explanation: "no keywords required; scored on non-empty response".into(),
                })
            }
            AnswerPayload::ExactMatch { correct_answer } => {
                let is_correct = text.trim() == correct_answer.trim();
                Ok(ScoreAndExplainResult {
                    is_correct,
                    base_score: if is_correct { 100.0 } else { 0.0 },
                    explanation: format!("expected '{correct_answer}'"),
                })
            }
            AnswerPayload::TrueFalse { correct_bool } => {
                let given = crate::answer_schema::parse_boolish(&text);
                let is_correct = given == Some(*correct_bool);
                Ok(ScoreAndExplainResult {
                    is_correct,
                    base_score: if is_correct { 100.0 } else { 0.0 },
                    explanation: format!("expected {correct_bool}"),
                })
            }
        }
    }

    async fn invoke(
        &self,
        session_id: SessionId,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        match name {
            "get_user_profile" => {
                let user_id: UserId = serde_json::from_value(
                    arguments
                        .get("user_id")
                        .cloned()
                        .ok_or_else(|| ToolError::Invalid("missing user_id".into()))?,
                )
                .map_err(|e| ToolError::Invalid(e.to_string()))?;
                let resp = self.get_user_profile(user_id).await?;
                Ok(serde_json::to_value(resp).unwrap())
            }
            "search_question_templates" => {
                let interests: Vec<String> = arguments
                    .get("interests")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .unwrap_or_default();
                let difficulty = arguments
                    .get("difficulty")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(5) as u8;
                let category = arguments
                    .get("category")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let resp = self
                    .search_question_templates(&interests, difficulty, category)
                    .await?;
                Ok(serde_json::to_value(resp).unwrap())
            }
            "get_difficulty_keywords" => {
                let difficulty = arguments
                    .get("difficulty")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(5) as u8;
                let category = arguments
                    .get("category")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let resp = self.get_difficulty_keywords(difficulty, category).await?;
                Ok(serde_json::to_value(resp).unwrap())
            }
            "validate_question_quality" => {
                let input: ValidateQuestionInput = serde_json::from_value(arguments)
                    .map_err(|e| ToolError::Invalid(e.to_string()))?;
                let resp = self.validate_question_quality(&input).await?;
                Ok(serde_json::to_value(resp).unwrap())
            }
            "save_generated_question" => {
                let draft: DraftQuestion = serde_json::from_value(arguments)
                    .map_err(|e| ToolError::Invalid(e.to_string()))?;
                let resp = self.save_generated_question(session_id, draft).await?;
                Ok(serde_json::to_value(resp).unwrap())
            }
            "score_and_explain" => {
                let question: Question = serde_json::from_value(
                    arguments
                        .get("question")
                        .cloned()
                        .ok_or_else(|| ToolError::Invalid("missing question".into()))?,
                )
                .map_err(|e| ToolError::Invalid(e.to_string()))?;
                let user_answer = arguments
                    .get("user_answer")
                    .cloned()
                    .unwrap_or(serde_json::Value::Null);
                let resp = self.score_and_explain(&question, &user_answer).await?;
                Ok(serde_json::to_value(resp).unwrap())
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

fn extract_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => map
            .get("text")
            .or_else(|| map.get("selected_key"))
            .and_then(|x| x.as_str())
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

fn parse_item_type(s: &str) -> Option<ItemType> {
    match s {
        "multiple_choice" => Some(ItemType::MultipleChoice),
        "true_false" => Some(ItemType::TrueFalse),
        "short_answer" => Some(ItemType::ShortAnswer),
        _ => None,
    }
}

/// Rule + heuristic quality scoring per §4.1: "acceptable iff final_score
/// >= 0.7 and no hard rule is violated (stem length <= 250 chars; MC has
/// 4-5 choices; correct answer present and among choices for MC)."
fn score_quality(input: &ValidateQuestionInput) -> QualityReport {
    let mut issues = Vec::new();

    if input.stem.len() > 250 {
        issues.push("stem exceeds 250 characters".to_string());
    }
    if input.stem.trim().is_empty() {
        issues.push("stem is empty".to_string());
    }

    let is_mc = input.item_type == "multiple_choice";
    if is_mc {
        match &input.choices {
            Some(choices) if (4..=5).contains(&choices.len()) => {
                if let Some(correct) = &input.correct_answer {
                    if !choices.iter().any(|c| c.trim() == correct.trim()) {
                        issues.push("correct_answer is not among choices".to_string());
                    }
                } else {
                    issues.push("correct_answer is missing".to_string());
                }
            }
            Some(choices) => issues.push(format!(
                "multiple_choice requires 4-5 choices, got {}",
                choices.len()
            )),
            None => issues.push("multiple_choice requires choices".to_string()),
        }
    }

    let hard_violation = issues.iter().any(|i| {
        i.contains("250 characters")
            || i.contains("4-5 choices")
            || i.contains("correct_answer")
            || i.contains("is empty")
            || i.contains("requires choices")
    });

    let rule_score = if issues.is_empty() {
        1.0
    } else {
        (1.0 - 0.25 * issues.len() as f64).max(0.0)
    };

    // Heuristic stand-in for semantic scoring: reward stems with enough
    // specificity (word count) without rambling, a pure function of the
    // input so the capability stays side-effect free.
    let word_count = input.stem.split_whitespace().count();
    let semantic_score = match word_count {
        0..=3 => 0.3,
        4..=30 => 0.6 + (word_count as f64 / 30.0).min(1.0) * 0.4,
        _ => 0.6,
    };

    let final_score = 0.5 * rule_score + 0.5 * semantic_score;
    let is_valid = final_score >= 0.7 && !hard_violation;

    let recommendation = if is_valid {
        Recommendation::Pass
    } else if hard_violation {
        Recommendation::Reject
    } else {
        Recommendation::Revise
    };

    QualityReport {
        is_valid,
        semantic_score,
        rule_score,
        final_score,
        issues,
        recommendation,
    }
}

fn reference_templates(category: &str, difficulty: u8) -> Vec<QuestionTemplate> {
    let base_rate = 0.9 - (difficulty as f64 / 20.0);
    (1..=5)
        .map(|i| QuestionTemplate {
            stem: format!("Sample {category} question #{i} (difficulty {difficulty})"),
            item_type: "multiple_choice".into(),
            choices: Some(vec!["A".into(), "B".into(), "C".into(), "D".into()]),
            correct_answer: "A".into(),
            correct_rate: (base_rate - i as f64 * 0.02).clamp(0.1, 0.95),
            usage_count: (50 - i * 5) as u32,
        })
        .collect()
}

fn reference_keywords(category: &str, difficulty: u8) -> DifficultyKeywords {
    DifficultyKeywords {
        keywords: vec![
            format!("{category}-fundamentals"),
            format!("{category}-difficulty-{difficulty}"),
        ],
        concepts: vec![format!("{category} concept at level {difficulty}")],
        example_questions: vec![format!("What is a key {category} concept at level {difficulty}?")],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn surface() -> DefaultToolSurface {
        DefaultToolSurface::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn get_user_profile_not_found() {
        let surface = surface();
        let err = surface.get_user_profile(UserId::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn search_question_templates_sorted_and_capped() {
        let surface = surface();
        let templates = surface
            .search_question_templates(&[], 5, "rust")
            .await
            .unwrap();
        assert!(templates.len() <= 5);
        for pair in templates.windows(2) {
            assert!(pair[0].correct_rate >= pair[1].correct_rate);
        }
    }

    #[test]
    fn quality_report_rejects_too_many_choices() {
        let input = ValidateQuestionInput {
            stem: "What is ownership in Rust?".into(),
            item_type: "multiple_choice".into(),
            choices: Some(vec!["A".into(), "B".into(), "C".into()]),
            correct_answer: Some("A".into()),
        };
        let report = score_quality(&input);
        assert!(!report.is_valid);
        assert_eq!(report.recommendation, Recommendation::Reject);
    }

    #[test]
    fn quality_report_passes_clean_mc() {
        let input = ValidateQuestionInput {
            stem: "Which trait governs ownership transfer semantics in Rust?".into(),
            item_type: "multiple_choice".into(),
            choices: Some(vec!["A".into(), "B".into(), "C".into(), "D".into()]),
            correct_answer: Some("A".into()),
        };
        let report = score_quality(&input);
        assert!(report.is_valid);
        assert_eq!(report.recommendation, Recommendation::Pass);
    }

    #[tokio::test]
    async fn invoke_unknown_tool_surfaces_structured_error() {
        let surface = surface();
        let err = surface
            .invoke(SessionId::new(), "delete_everything", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }
}
