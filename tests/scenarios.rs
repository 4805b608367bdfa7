//! End-to-end scenarios driving the generation -> autosave -> scoring ->
//! adaptive pipeline through its public services, one test per scenario.

use std::collections::BTreeSet;
use std::sync::Arc;

use assessment_core::adaptive;
use assessment_core::agent::CancellationToken;
use assessment_core::autosave::AutosaveService;
use assessment_core::config::GenerationConfig;
use assessment_core::generation::GenerationService;
use assessment_core::llm::{FinishReason, InferenceResponse, MockInferenceProvider, Usage};
use assessment_core::scoring::ScoringService;
use assessment_core::session_machine::SessionMachine;
use assessment_core::store::memory::MemoryStore;
use assessment_core::store::Store;
use assessment_core::tools::DefaultToolSurface;
use assessment_core::types::{ProfileSurvey, SelfLevel, SurveyId, UserId};

fn mc_item(ordinal: u32, category: &str) -> serde_json::Value {
    serde_json::json!({
        "item_type": "multiple_choice",
        "stem": format!("question {ordinal}"),
        "choices": ["A", "B", "C", "D"],
        "correct_answer": "A",
        "answer_schema": {"type": "exact_match", "correct_answer": "A"},
        "difficulty": 5,
        "category": category,
    })
}

fn short_answer_item(ordinal: u32) -> serde_json::Value {
    serde_json::json!({
        "item_type": "short_answer",
        "stem": format!("describe step {ordinal}"),
        "correct_answer": "data cleaning, feature engineering, normalization",
        "answer_schema": {
            "type": "keyword_match",
            "keywords": ["data cleaning", "feature engineering", "normalization"],
        },
        "difficulty": 5,
        "category": "ml",
    })
}

async fn seed(interests: &[&str]) -> (Arc<dyn Store>, UserId, SurveyId) {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let user_id = UserId::new();
    let interests: BTreeSet<String> = interests.iter().map(|s| s.to_string()).collect();
    let profile = ProfileSurvey::new(user_id, SelfLevel::Intermediate, 3, "engineer", "backend", interests);
    let survey_id = profile.survey_id;
    store.put_profile(profile).await.unwrap();
    (store, user_id, survey_id)
}

fn scripted_provider(items: Vec<serde_json::Value>) -> Arc<MockInferenceProvider> {
    Arc::new(MockInferenceProvider::new(vec![InferenceResponse {
        content: format!("Final Answer: {}", serde_json::Value::Array(items)),
        tool_calls: vec![],
        finish_reason: FinishReason::Stop,
        usage: Usage::default(),
    }]))
}

/// S1: happy path, five multiple-choice items, all answered correctly and
/// well within the time budget auto-completes the round at 100.
#[tokio::test]
async fn s1_happy_path_multiple_choice_auto_completes_at_100() {
    let (store, user_id, survey_id) = seed(&["rust"]).await;
    let tools = Arc::new(DefaultToolSurface::new(store.clone()));
    let provider = scripted_provider((1..=5).map(|i| mc_item(i, "rust")).collect());
    let generation = GenerationService::new(store.clone(), tools, provider, GenerationConfig::default());

    let outcome = generation
        .generate_round(user_id, survey_id, 1, 5, None, 1_200_000, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.questions.len(), 5);

    let autosave = AutosaveService::new(store.clone());
    for q in &outcome.questions {
        autosave
            .save_answer(outcome.session_id, q.question_id, serde_json::json!({"selected_key": "A"}), 5_000)
            .await
            .unwrap();
    }

    let scoring = ScoringService::new(store.clone());
    let result = scoring.score_round(outcome.session_id, true).await.unwrap();
    assert_eq!(result.score, 100.0);
    assert_eq!(result.correct_count, 5);
    assert!(result.auto_completed);
}

/// S2: only 3 of 5 questions answered keeps the session open (no
/// auto-complete) and the unanswered two count as wrong.
#[tokio::test]
async fn s2_partial_answers_keep_session_open() {
    let (store, user_id, survey_id) = seed(&["rust"]).await;
    let tools = Arc::new(DefaultToolSurface::new(store.clone()));
    let provider = scripted_provider((1..=5).map(|i| mc_item(i, "rust")).collect());
    let generation = GenerationService::new(store.clone(), tools, provider, GenerationConfig::default());

    let outcome = generation
        .generate_round(user_id, survey_id, 1, 5, None, 1_200_000, &CancellationToken::new())
        .await
        .unwrap();

    let autosave = AutosaveService::new(store.clone());
    for q in outcome.questions.iter().take(3) {
        autosave
            .save_answer(outcome.session_id, q.question_id, serde_json::json!({"selected_key": "A"}), 5_000)
            .await
            .unwrap();
    }

    let scoring = ScoringService::new(store.clone());
    let result = scoring.score_round(outcome.session_id, true).await.unwrap();
    assert_eq!(result.total_count, 5);
    assert_eq!(result.correct_count, 3);
    assert!(!result.auto_completed);
    assert_eq!(result.wrong_categories.get("rust"), Some(&2));

    let session_machine = SessionMachine::new(store.clone());
    let err = session_machine.complete(outcome.session_id).await.unwrap_err();
    assert!(matches!(err, assessment_core::AssessmentError::PreconditionFailed(_)));
}

/// S3: a short-answer item hit on 2 of 3 keywords earns partial credit,
/// not full or zero credit.
#[tokio::test]
async fn s3_short_answer_partial_keyword_credit() {
    let (store, user_id, survey_id) = seed(&["ml"]).await;
    let tools = Arc::new(DefaultToolSurface::new(store.clone()));
    let provider = scripted_provider(vec![short_answer_item(1)]);
    let generation = GenerationService::new(store.clone(), tools, provider, GenerationConfig::default());

    let outcome = generation
        .generate_round(user_id, survey_id, 1, 1, None, 1_200_000, &CancellationToken::new())
        .await
        .unwrap();
    let question = &outcome.questions[0];

    let autosave = AutosaveService::new(store.clone());
    autosave
        .save_answer(
            outcome.session_id,
            question.question_id,
            serde_json::json!("Data Cleaning and Normalization, but not the feature step"),
            10_000,
        )
        .await
        .unwrap();

    let scoring = ScoringService::new(store.clone());
    let result = scoring.score_round(outcome.session_id, true).await.unwrap();
    assert_eq!(result.correct_count, 0);
    assert!((result.score - 66.667).abs() < 0.01);
}

/// S4: answering well past 2x the time budget erases the score to 0 even
/// though the answer itself was correct.
#[tokio::test]
async fn s4_time_penalty_erases_score_at_2x_overtime() {
    let (store, user_id, survey_id) = seed(&["rust"]).await;
    let tools = Arc::new(DefaultToolSurface::new(store.clone()));
    let provider = scripted_provider(vec![mc_item(1, "rust")]);
    let generation = GenerationService::new(store.clone(), tools, provider, GenerationConfig::default());

    let time_limit_ms = 1_000u64;
    let outcome = generation
        .generate_round(user_id, survey_id, 1, 1, None, time_limit_ms, &CancellationToken::new())
        .await
        .unwrap();
    let question = &outcome.questions[0];

    let autosave = AutosaveService::new(store.clone());
    autosave
        .save_answer(outcome.session_id, question.question_id, serde_json::json!({"selected_key": "A"}), 100)
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(time_limit_ms * 3)).await;

    let scoring = ScoringService::new(store.clone());
    let result = scoring.score_round(outcome.session_id, true).await.unwrap();
    assert_eq!(result.score, 0.0);
}

/// S5: legacy `correct_key`/`correct_keywords` payloads normalize to the
/// canonical schema the same way a freshly generated item would.
#[test]
fn s5_legacy_schema_shapes_normalize_to_canonical() {
    use assessment_core::answer_schema::normalize;
    use assessment_core::types::{AnswerPayload, ItemType};

    let legacy_mc = serde_json::json!({"correct_key": "B", "explanation": "because B"});
    let schema = normalize(&legacy_mc, ItemType::MultipleChoice, None).unwrap();
    assert_eq!(schema.source_format, "legacy_correct_key");
    assert!(matches!(schema.payload, AnswerPayload::ExactMatch { correct_answer } if correct_answer == "B"));

    let legacy_keywords = serde_json::json!({"correct_keywords": ["Rust", "rust", " ownership "]});
    let schema = normalize(&legacy_keywords, ItemType::ShortAnswer, None).unwrap();
    assert_eq!(schema.source_format, "legacy_correct_keywords");
    match schema.payload {
        AnswerPayload::KeywordMatch { keywords } => {
            assert_eq!(keywords, vec!["Rust".to_string(), "ownership".to_string()]);
        }
        _ => panic!("expected keyword_match"),
    }
}

/// S6: a retake generates a brand-new session (never resurrects the
/// completed one) and the adaptive deriver reacts to the prior round.
#[tokio::test]
async fn s6_retake_opens_fresh_session_with_adaptive_difficulty() {
    let (store, user_id, survey_id) = seed(&["rust", "databases"]).await;
    let tools = Arc::new(DefaultToolSurface::new(store.clone()));
    let provider = scripted_provider((1..=5).map(|i| mc_item(i, "rust")).collect());
    let generation = GenerationService::new(store.clone(), tools.clone(), provider, GenerationConfig::default());

    let round1 = generation
        .generate_round(user_id, survey_id, 1, 5, None, 1_200_000, &CancellationToken::new())
        .await
        .unwrap();

    let autosave = AutosaveService::new(store.clone());
    for q in round1.questions.iter().take(1) {
        autosave
            .save_answer(round1.session_id, q.question_id, serde_json::json!({"selected_key": "A"}), 1_000)
            .await
            .unwrap();
    }
    // Remaining 4 unanswered -> low score, triggers the "difficulty down" band.
    let scoring = ScoringService::new(store.clone());
    let result = scoring.score_round(round1.session_id, true).await.unwrap();
    assert!(result.score < 40.0);

    let profile = store.latest_profile(user_id).await.unwrap().unwrap();
    let params = adaptive::derive(&profile, 5, &result, None);
    assert_eq!(params.target_difficulty, 4);
    assert!(params.category_weights["rust"] > params.category_weights["databases"]);

    let provider2 = scripted_provider((1..=5).map(|i| mc_item(i, "rust")).collect());
    let generation2 = GenerationService::new(store.clone(), tools, provider2, GenerationConfig::default());
    let round2 = generation2
        .generate_round(user_id, survey_id, 2, params.count, Some(params), 1_200_000, &CancellationToken::new())
        .await
        .unwrap();

    assert_ne!(round1.session_id, round2.session_id);
    let completed_session = store.get_session(round1.session_id).await.unwrap().unwrap();
    assert_eq!(completed_session.status, assessment_core::types::SessionStatus::Completed);
}
