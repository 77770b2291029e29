//! services/api/src/web/wizard.rs
//!
//! Endpoints for the mock interview and career path wizards. Both share the
//! step/answer/result routes; only the start differs.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use moazer_core::domain::{Owner, PathMode, Session, SessionKind};
use moazer_core::wizard::{SessionReport, StepOutcome, StepView};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct StartInterviewRequest {
    pub job_title: String,
}

#[derive(Deserialize, ToSchema)]
pub struct StartCareerPathRequest {
    /// `SCHOOL` or `GRAD`.
    pub mode: String,
    /// Required in `GRAD` mode.
    pub major: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct StartResponse {
    pub session_id: Uuid,
    pub kind: String,
    pub next_step: u32,
    pub total_questions: u32,
}

#[derive(Serialize, ToSchema)]
pub struct StepResponse {
    pub session_id: Uuid,
    pub kind: String,
    pub status: String,
    pub step: u32,
    pub total: u32,
    pub planned_total: u32,
    pub phase: u8,
    pub question: String,
    pub previous_answer: Option<String>,
    pub suggested_path: Option<String>,
}

impl From<StepView> for StepResponse {
    fn from(view: StepView) -> Self {
        Self {
            session_id: view.session.id,
            kind: view.session.kind.as_str().to_string(),
            status: view.session.status.as_str().to_string(),
            step: view.step,
            total: view.total,
            planned_total: view.planned_total,
            phase: view.question.phase as u8,
            question: view.question.text,
            previous_answer: view.previous_answer,
            suggested_path: view.session.suggested_path,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitAnswerRequest {
    pub answer: String,
}

#[derive(Serialize, ToSchema)]
pub struct SubmitAnswerResponse {
    pub finished: bool,
    pub next_step: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub kind: String,
    pub topic: String,
    pub status: String,
    pub suggested_path: Option<String>,
    pub strengths: Option<String>,
    pub weaknesses: Option<String>,
    pub recommendation: Option<String>,
    pub overall_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        let summary = session.summary;
        Self {
            id: session.id,
            kind: session.kind.as_str().to_string(),
            topic: session.topic,
            status: session.status.as_str().to_string(),
            suggested_path: session.suggested_path,
            strengths: summary.as_ref().map(|s| s.strengths.clone()),
            weaknesses: summary.as_ref().map(|s| s.weaknesses.clone()),
            recommendation: summary.as_ref().map(|s| s.recommendation.clone()),
            overall_score: summary.and_then(|s| s.overall_score),
            created_at: session.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ResultEntryResponse {
    pub order: u32,
    pub phase: u8,
    pub question: String,
    pub answer: Option<String>,
    pub strengths: Option<String>,
    pub weaknesses: Option<String>,
    pub score: Option<u8>,
}

#[derive(Serialize, ToSchema)]
pub struct ResultResponse {
    pub session: SessionResponse,
    pub entries: Vec<ResultEntryResponse>,
}

impl From<SessionReport> for ResultResponse {
    fn from(report: SessionReport) -> Self {
        let entries = report
            .entries
            .into_iter()
            .map(|entry| {
                let feedback = entry.answer.as_ref().and_then(|a| a.feedback.clone());
                ResultEntryResponse {
                    order: entry.question.order,
                    phase: entry.question.phase as u8,
                    question: entry.question.text,
                    answer: entry.answer.map(|a| a.content),
                    strengths: feedback.as_ref().map(|f| f.strengths.clone()),
                    weaknesses: feedback.as_ref().map(|f| f.weaknesses.clone()),
                    score: feedback.and_then(|f| f.score),
                }
            })
            .collect();
        Self {
            session: report.session.into(),
            entries,
        }
    }
}

fn started(session: &Session) -> (StatusCode, Json<StartResponse>) {
    (
        StatusCode::CREATED,
        Json(StartResponse {
            session_id: session.id,
            kind: session.kind.as_str().to_string(),
            next_step: 1,
            total_questions: session.kind.first_phase_len() as u32,
        }),
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /interviews - Start a mock interview for a job title
#[utoipa::path(
    post,
    path = "/interviews",
    request_body = StartInterviewRequest,
    responses(
        (status = 201, description = "Session started", body = StartResponse),
        (status = 400, description = "Missing job title"),
        (status = 402, description = "No attempts left or guest trial used"),
        (status = 503, description = "AI service unavailable, retryable")
    )
)]
pub async fn start_interview_handler(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<Owner>,
    Json(req): Json<StartInterviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .wizard
        .start(owner, SessionKind::Interview, &req.job_title)
        .await?;
    Ok(started(&session))
}

/// POST /career-paths - Start a career path discovery session
#[utoipa::path(
    post,
    path = "/career-paths",
    request_body = StartCareerPathRequest,
    responses(
        (status = 201, description = "Session started", body = StartResponse),
        (status = 400, description = "Unknown mode or missing major"),
        (status = 402, description = "No attempts left or guest trial used"),
        (status = 503, description = "AI service unavailable, retryable")
    )
)]
pub async fn start_career_path_handler(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<Owner>,
    Json(req): Json<StartCareerPathRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mode = match req.mode.trim().to_ascii_uppercase().as_str() {
        "SCHOOL" => PathMode::School,
        "GRAD" => PathMode::Grad,
        other => return Err(ApiError::validation(format!("unknown mode '{}'", other))),
    };
    let topic = match mode {
        PathMode::School => "",
        PathMode::Grad => req.major.as_deref().unwrap_or(""),
    };
    let session = state
        .wizard
        .start(owner, SessionKind::CareerPath(mode), topic)
        .await?;
    Ok(started(&session))
}

/// GET /sessions/{id}/steps/{step} - Show one question of a session
#[utoipa::path(
    get,
    path = "/sessions/{id}/steps/{step}",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("step" = u32, Path, description = "1-based step")
    ),
    responses(
        (status = 200, description = "The question at this step", body = StepResponse),
        (status = 400, description = "Step out of range"),
        (status = 404, description = "No such session for this owner")
    )
)]
pub async fn get_step_handler(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<Owner>,
    Path((session_id, step)): Path<(Uuid, u32)>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.wizard.step(&owner, session_id, step).await?;
    Ok(Json(StepResponse::from(view)))
}

/// POST /sessions/{id}/steps/{step} - Answer a question and advance
#[utoipa::path(
    post,
    path = "/sessions/{id}/steps/{step}",
    request_body = SubmitAnswerRequest,
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("step" = u32, Path, description = "1-based step")
    ),
    responses(
        (status = 200, description = "Answer saved", body = SubmitAnswerResponse),
        (status = 400, description = "Step out of range"),
        (status = 404, description = "No such session for this owner"),
        (status = 503, description = "AI service unavailable, retryable")
    )
)]
pub async fn submit_answer_handler(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<Owner>,
    Path((session_id, step)): Path<(Uuid, u32)>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .wizard
        .submit_answer(&owner, session_id, step, &req.answer)
        .await?;
    let response = match outcome {
        StepOutcome::Next { step } => SubmitAnswerResponse {
            finished: false,
            next_step: Some(step),
        },
        StepOutcome::Finished => SubmitAnswerResponse {
            finished: true,
            next_step: None,
        },
    };
    Ok(Json(response))
}

/// GET /sessions/{id}/result - The question, answer and feedback log
#[utoipa::path(
    get,
    path = "/sessions/{id}/result",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session result", body = ResultResponse),
        (status = 404, description = "No such session for this owner")
    )
)]
pub async fn result_handler(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<Owner>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.wizard.result(&owner, session_id).await?;
    Ok(Json(ResultResponse::from(report)))
}

/// GET /sessions - The caller's sessions, newest first
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "Sessions owned by the caller", body = [SessionResponse]),
        (status = 401, description = "Login required")
    )
)]
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions: Vec<SessionResponse> = state
        .wizard
        .list_for_user(user_id)
        .await?
        .into_iter()
        .map(SessionResponse::from)
        .collect();
    Ok(Json(sessions))
}
