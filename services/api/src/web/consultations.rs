//! services/api/src/web/consultations.rs
//!
//! Student/expert consultation endpoints: requests, the status workflow,
//! chat, attachments and ratings.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use moazer_core::consultation::{ConsultationDetail, Participant};
use moazer_core::domain::{Attachment, ChatMessage, Consultation, Rating, User};
use moazer_core::ConsultationAction;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ExpertResponse {
    pub user_id: Uuid,
    pub display_name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateConsultationRequest {
    pub expert_id: Uuid,
    /// STUDY_PATH, CAREER_PATH, INTERVIEW, CV_REVIEW or GENERAL.
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// File references recorded with the request.
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ConsultationResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub expert_id: Option<Uuid>,
    pub kind: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Consultation> for ConsultationResponse {
    fn from(c: Consultation) -> Self {
        Self {
            id: c.id,
            student_id: c.student_id,
            expert_id: c.expert_id,
            kind: c.kind.as_str().to_string(),
            title: c.title,
            description: c.description,
            status: c.status.as_str().to_string(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<ChatMessage> for MessageResponse {
    fn from(m: ChatMessage) -> Self {
        Self {
            id: m.id,
            sender_id: m.sender_id,
            content: m.content,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AttachmentResponse {
    pub id: Uuid,
    pub uploaded_by: Uuid,
    pub file_ref: String,
    pub created_at: DateTime<Utc>,
}

impl From<Attachment> for AttachmentResponse {
    fn from(a: Attachment) -> Self {
        Self {
            id: a.id,
            uploaded_by: a.uploaded_by,
            file_ref: a.file_ref,
            created_at: a.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RatingResponse {
    pub stars: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl From<Rating> for RatingResponse {
    fn from(r: Rating) -> Self {
        Self {
            stars: r.stars,
            comment: r.comment,
            created_at: r.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ConsultationDetailResponse {
    pub consultation: ConsultationResponse,
    /// `STUDENT` or `EXPERT`: the caller's side of the consultation.
    pub viewer: String,
    pub messages: Vec<MessageResponse>,
    pub attachments: Vec<AttachmentResponse>,
    pub rating: Option<RatingResponse>,
}

impl From<ConsultationDetail> for ConsultationDetailResponse {
    fn from(d: ConsultationDetail) -> Self {
        let viewer = match d.viewer {
            Participant::Student => "STUDENT",
            Participant::Expert => "EXPERT",
        };
        Self {
            consultation: d.consultation.into(),
            viewer: viewer.to_string(),
            messages: d.messages.into_iter().map(Into::into).collect(),
            attachments: d.attachments.into_iter().map(Into::into).collect(),
            rating: d.rating.map(Into::into),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ActionResponse {
    pub consultation: ConsultationResponse,
    /// True when the student ended the consultation and must now rate it.
    pub rating_required: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct RateRequest {
    pub stars: i64,
    pub comment: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Deserialize, ToSchema)]
pub struct AttachRequest {
    pub file_ref: String,
}

async fn current_user(state: &AppState, user_id: Uuid) -> Result<User, ApiError> {
    Ok(state.db.get_user_by_id(user_id).await?)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /experts - Directory of experts a student can consult
#[utoipa::path(
    get,
    path = "/experts",
    responses((status = 200, description = "Experts", body = [ExpertResponse]))
)]
pub async fn list_experts_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let experts: Vec<ExpertResponse> = state
        .consultations
        .list_experts()
        .await?
        .into_iter()
        .map(|u| ExpertResponse {
            user_id: u.user_id,
            display_name: u.display_name,
        })
        .collect();
    Ok(Json(experts))
}

/// POST /consultations - Request a consultation from an expert
#[utoipa::path(
    post,
    path = "/consultations",
    request_body = CreateConsultationRequest,
    responses(
        (status = 201, description = "Consultation created as PENDING", body = ConsultationResponse),
        (status = 400, description = "Missing title, unknown type or target is not an expert"),
        (status = 403, description = "Only students can request consultations")
    )
)]
pub async fn create_consultation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateConsultationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let student = current_user(&state, user_id).await?;
    let consultation = state
        .consultations
        .create(
            &student,
            req.expert_id,
            &req.kind,
            &req.title,
            &req.description,
            req.attachments,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ConsultationResponse::from(consultation))))
}

/// GET /consultations - Consultations the caller takes part in
#[utoipa::path(
    get,
    path = "/consultations",
    responses((status = 200, description = "Newest updated first", body = [ConsultationResponse]))
)]
pub async fn list_consultations_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, user_id).await?;
    let items: Vec<ConsultationResponse> = state
        .consultations
        .list_for(&user)
        .await?
        .into_iter()
        .map(ConsultationResponse::from)
        .collect();
    Ok(Json(items))
}

/// GET /consultations/{id} - Consultation with chat, attachments and rating
#[utoipa::path(
    get,
    path = "/consultations/{id}",
    params(("id" = Uuid, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Consultation detail", body = ConsultationDetailResponse),
        (status = 404, description = "Not a participant or unknown id")
    )
)]
pub async fn consultation_detail_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(consultation_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.consultations.detail(user_id, consultation_id).await?;
    Ok(Json(ConsultationDetailResponse::from(detail)))
}

/// POST /consultations/{id}/actions/{action} - accept, reject, expert_end or student_end
#[utoipa::path(
    post,
    path = "/consultations/{id}/actions/{action}",
    params(
        ("id" = Uuid, Path, description = "Consultation id"),
        ("action" = String, Path, description = "accept, reject, expert_end or student_end")
    ),
    responses(
        (status = 200, description = "Action applied", body = ActionResponse),
        (status = 400, description = "Unknown action"),
        (status = 403, description = "Action belongs to the other participant"),
        (status = 404, description = "Not a participant or unknown id"),
        (status = 409, description = "Not allowed from the current status")
    )
)]
pub async fn consultation_action_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path((consultation_id, action)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let action = ConsultationAction::parse(&action)
        .ok_or_else(|| ApiError::validation(format!("unknown action '{}'", action)))?;
    let outcome = state
        .consultations
        .act(user_id, consultation_id, action)
        .await?;
    Ok(Json(ActionResponse {
        consultation: outcome.consultation.into(),
        rating_required: outcome.rating_required,
    }))
}

/// POST /consultations/{id}/rating - Rate and complete the consultation
#[utoipa::path(
    post,
    path = "/consultations/{id}/rating",
    request_body = RateRequest,
    params(("id" = Uuid, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Rating stored, consultation completed", body = RatingResponse),
        (status = 400, description = "Stars outside 1..5"),
        (status = 403, description = "Only the student can rate")
    )
)]
pub async fn rate_consultation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(consultation_id): Path<Uuid>,
    Json(req): Json<RateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rating = state
        .consultations
        .rate(user_id, consultation_id, req.stars, req.comment.as_deref())
        .await?;
    Ok(Json(RatingResponse::from(rating)))
}

/// GET /consultations/{id}/messages - The chat log, oldest first
#[utoipa::path(
    get,
    path = "/consultations/{id}/messages",
    params(("id" = Uuid, Path, description = "Consultation id")),
    responses((status = 200, description = "Messages", body = [MessageResponse]))
)]
pub async fn list_messages_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(consultation_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let messages: Vec<MessageResponse> = state
        .consultations
        .messages(user_id, consultation_id)
        .await?
        .into_iter()
        .map(MessageResponse::from)
        .collect();
    Ok(Json(messages))
}

/// POST /consultations/{id}/messages - Post a chat message
#[utoipa::path(
    post,
    path = "/consultations/{id}/messages",
    request_body = SendMessageRequest,
    params(("id" = Uuid, Path, description = "Consultation id")),
    responses(
        (status = 201, description = "Message stored", body = MessageResponse),
        (status = 400, description = "Empty message")
    )
)]
pub async fn send_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(consultation_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .consultations
        .send_message(user_id, consultation_id, &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}

/// POST /consultations/{id}/attachments - Record a file reference
#[utoipa::path(
    post,
    path = "/consultations/{id}/attachments",
    request_body = AttachRequest,
    params(("id" = Uuid, Path, description = "Consultation id")),
    responses(
        (status = 201, description = "Attachment recorded", body = AttachmentResponse),
        (status = 400, description = "Empty file reference")
    )
)]
pub async fn attach_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(consultation_id): Path<Uuid>,
    Json(req): Json<AttachRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let attachment = state
        .consultations
        .attach(user_id, consultation_id, &req.file_ref)
        .await?;
    Ok((StatusCode::CREATED, Json(AttachmentResponse::from(attachment))))
}
