//! Question and the canonical AnswerSchema (§3.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{QuestionId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

/// The canonical, tagged answer-schema record. Exactly one payload variant
/// is ever populated; equality is by value (derive covers this because each
/// payload lives in its own enum variant, not an `Option` soup).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerPayload {
    ExactMatch { correct_answer: String },
    KeywordMatch { keywords: Vec<String> },
    TrueFalse { correct_bool: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerSchema {
    #[serde(flatten)]
    pub payload: AnswerPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Audit tag recording which normalizer input shape produced this
    /// record (e.g. "legacy_correct_key", "canonical", "inferred").
    pub source_format: String,
    pub created_at: DateTime<Utc>,
}

impl AnswerSchema {
    pub fn exact_match(
        correct_answer: impl Into<String>,
        source_format: impl Into<String>,
    ) -> Self {
        Self {
            payload: AnswerPayload::ExactMatch {
                correct_answer: correct_answer.into(),
            },
            explanation: None,
            source_format: source_format.into(),
            created_at: Utc::now(),
        }
    }

    pub fn keyword_match(keywords: Vec<String>, source_format: impl Into<String>) -> Self {
        Self {
            payload: AnswerPayload::KeywordMatch { keywords },
            explanation: None,
            source_format: source_format.into(),
            created_at: Utc::now(),
        }
    }

    pub fn true_false(correct_bool: bool, source_format: impl Into<String>) -> Self {
        Self {
            payload: AnswerPayload::TrueFalse { correct_bool },
            explanation: None,
            source_format: source_format.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question_id: QuestionId,
    pub session_id: SessionId,
    pub ordinal: u32,
    pub item_type: ItemType,
    pub stem: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    pub answer_schema: AnswerSchema,
    pub difficulty: u8,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

impl Question {
    /// `choices` is non-empty iff `item_type=multiple_choice` (§3.1).
    pub fn choices_invariant_holds(&self) -> bool {
        match self.item_type {
            ItemType::MultipleChoice => self.choices.as_ref().is_some_and(|c| !c.is_empty()),
            _ => self.choices.is_none() || self.choices.as_ref().unwrap().is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_schema_exactly_one_payload() {
        let a = AnswerSchema::exact_match("B", "canonical");
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["kind"], "exact_match");
        assert_eq!(json["correct_answer"], "B");
        assert!(json.get("keywords").is_none());
        assert!(json.get("correct_bool").is_none());
    }

    #[test]
    fn answer_schema_serde_roundtrip() {
        let a = AnswerSchema::keyword_match(
            vec!["data cleaning".into(), "normalization".into()],
            "canonical",
        )
        .with_explanation("why");
        let json = serde_json::to_string(&a).unwrap();
        let restored: AnswerSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, a);
    }

    #[test]
    fn choices_invariant_mc_requires_nonempty() {
        let q = Question {
            question_id: QuestionId::new(),
            session_id: SessionId::new(),
            ordinal: 1,
            item_type: ItemType::MultipleChoice,
            stem: "stem".into(),
            choices: Some(vec!["A".into(), "B".into()]),
            answer_schema: AnswerSchema::exact_match("A", "canonical"),
            difficulty: 3,
            category: "rust".into(),
            created_at: Utc::now(),
        };
        assert!(q.choices_invariant_holds());
    }
}
