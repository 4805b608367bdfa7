//! Thin HTTP facade over the core (§6, §10.5): "the HTTP facade of the
//! repository is merely a thin mapping." Auth, profile CRUD, and ranking
//! are external collaborators and are not implemented here; only the
//! endpoints whose contract the core must satisfy are routed.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::adaptive;
use crate::agent::CancellationToken;
use crate::autosave::AutosaveService;
use crate::error::AssessmentError;
use crate::generation::GenerationService;
use crate::scoring::ScoringService;
use crate::session_machine::SessionMachine;
use crate::store::Store;
use crate::types::{QuestionId, SessionId, SessionStatus, SurveyId, UserId};

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub generation: GenerationService,
    pub autosave: AutosaveService,
    pub scoring: ScoringService,
    pub session_machine: SessionMachine,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/questions/generate", post(generate))
        .route("/questions/generate-adaptive", post(generate_adaptive))
        .route("/questions/autosave", post(autosave))
        .route("/questions/score", post(score))
        .route("/questions/session/:id/status", put(set_status))
        .route("/questions/session/:id/time-status", get(time_status))
        .route("/questions/resume", get(resume))
        .with_state(state)
}

impl IntoResponse for AssessmentError {
    fn into_response(self) -> Response {
        let status = match &self {
            AssessmentError::Validation(_) => StatusCode::BAD_REQUEST,
            AssessmentError::NotFound(_) => StatusCode::NOT_FOUND,
            AssessmentError::PreconditionFailed(_) => StatusCode::CONFLICT,
            AssessmentError::SessionTerminal { .. } => StatusCode::CONFLICT,
            AssessmentError::QuestionNotInSession { .. } => StatusCode::BAD_REQUEST,
            AssessmentError::GenerationExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AssessmentError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            AssessmentError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            AssessmentError::Tool(_)
            | AssessmentError::Inference(_)
            | AssessmentError::Config(_)
            | AssessmentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({
            "code": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[derive(Deserialize)]
struct GenerateRequest {
    survey_id: SurveyId,
    round: u32,
    #[serde(default)]
    domain: Option<String>,
}

#[derive(Serialize)]
struct GenerateResponse {
    session_id: SessionId,
    questions: Vec<crate::types::Question>,
    attempt: u32,
}

const DEFAULT_TIME_LIMIT_MS: u64 = 1_200_000;

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AssessmentError> {
    let _ = req.domain;
    let profile = state
        .store
        .latest_profile(user_id_for_survey(&req.survey_id))
        .await?;
    let user_id = profile
        .map(|p| p.user_id)
        .ok_or_else(|| AssessmentError::NotFound(format!("profile for survey {}", req.survey_id)))?;

    let outcome = state
        .generation
        .generate_round(
            user_id,
            req.survey_id,
            req.round,
            5,
            None,
            DEFAULT_TIME_LIMIT_MS,
            &CancellationToken::new(),
        )
        .await?;
    Ok(Json(GenerateResponse {
        session_id: outcome.session_id,
        questions: outcome.questions,
        attempt: outcome.attempt_number,
    }))
}

#[derive(Deserialize)]
struct GenerateAdaptiveRequest {
    previous_session_id: SessionId,
}

async fn generate_adaptive(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateAdaptiveRequest>,
) -> Result<Json<GenerateResponse>, AssessmentError> {
    let prior_session = state
        .store
        .get_session(req.previous_session_id)
        .await?
        .ok_or_else(|| AssessmentError::NotFound(format!("session {}", req.previous_session_id)))?;
    let prior_result = state
        .store
        .latest_round_result(req.previous_session_id)
        .await?
        .ok_or_else(|| AssessmentError::PreconditionFailed("previous round has not been scored".into()))?;
    let profile = state
        .store
        .latest_profile(prior_session.user_id)
        .await?
        .ok_or_else(|| AssessmentError::NotFound(format!("profile for user {}", prior_session.user_id)))?;

    let prior_difficulty = profile.self_level.baseline_difficulty();
    let params = adaptive::derive(&profile, prior_difficulty, &prior_result, None);

    let outcome = state
        .generation
        .generate_round(
            prior_session.user_id,
            prior_session.survey_id,
            prior_session.round_index + 1,
            params.count,
            Some(params),
            DEFAULT_TIME_LIMIT_MS,
            &CancellationToken::new(),
        )
        .await?;
    Ok(Json(GenerateResponse {
        session_id: outcome.session_id,
        questions: outcome.questions,
        attempt: outcome.attempt_number,
    }))
}

#[derive(Deserialize)]
struct AutosaveRequest {
    session_id: SessionId,
    question_id: QuestionId,
    user_answer: serde_json::Value,
    response_time_ms: u64,
}

#[derive(Serialize)]
struct AutosaveResponse {
    saved: bool,
    saved_at: chrono::DateTime<chrono::Utc>,
}

async fn autosave(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AutosaveRequest>,
) -> Result<Json<AutosaveResponse>, AssessmentError> {
    let outcome = state
        .autosave
        .save_answer(req.session_id, req.question_id, req.user_answer, req.response_time_ms)
        .await?;
    Ok(Json(AutosaveResponse {
        saved: outcome.saved,
        saved_at: outcome.saved_at,
    }))
}

#[derive(Deserialize)]
struct ScoreRequest {
    session_id: SessionId,
    #[serde(default = "default_true")]
    auto_complete: bool,
}

fn default_true() -> bool {
    true
}

async fn score(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<crate::scoring::ScoreRoundOutcome>, AssessmentError> {
    let outcome = state.scoring.score_round(req.session_id, req.auto_complete).await?;
    Ok(Json(outcome))
}

#[derive(Deserialize)]
struct SetStatusRequest {
    status: SessionStatus,
}

#[derive(Serialize)]
struct SetStatusResponse {
    status: SessionStatus,
}

async fn set_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<SetStatusResponse>, AssessmentError> {
    let session = match req.status {
        SessionStatus::Paused => state.session_machine.pause(id).await?,
        SessionStatus::InProgress => state.session_machine.resume(id).await?,
        SessionStatus::Completed => {
            return Err(AssessmentError::Validation(
                "use /questions/score to complete a session".into(),
            ))
        }
    };
    Ok(Json(SetStatusResponse { status: session.status }))
}

async fn time_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
) -> Result<Json<crate::autosave::TimeStatus>, AssessmentError> {
    Ok(Json(state.autosave.time_status(id).await?))
}

#[derive(Deserialize)]
struct ResumeQuery {
    user_id: UserId,
}

#[derive(Serialize)]
struct ResumeResponse {
    session_id: SessionId,
    round: u32,
    status: SessionStatus,
}

async fn resume(
    State(state): State<Arc<AppState>>,
    axum::extract::Query(query): axum::extract::Query<ResumeQuery>,
) -> Result<Json<ResumeResponse>, AssessmentError> {
    let session = state
        .store
        .latest_open_session(query.user_id)
        .await?
        .ok_or_else(|| AssessmentError::NotFound("no open session for user".into()))?;
    Ok(Json(ResumeResponse {
        session_id: session.session_id,
        round: session.round_index,
        status: session.status,
    }))
}

/// Placeholder lookup the production collaborator owns (survey -> user);
/// the core only ever receives an already-resolved `user_id` in practice.
fn user_id_for_survey(_survey_id: &SurveyId) -> UserId {
    UserId::new()
}
