//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification.

use crate::web::{auth, consultations, wallet, wizard};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        wallet::list_plans_handler,
        wallet::subscribe_handler,
        wallet::wallet_handler,
        wizard::start_interview_handler,
        wizard::start_career_path_handler,
        wizard::get_step_handler,
        wizard::submit_answer_handler,
        wizard::result_handler,
        wizard::list_sessions_handler,
        consultations::list_experts_handler,
        consultations::create_consultation_handler,
        consultations::list_consultations_handler,
        consultations::consultation_detail_handler,
        consultations::consultation_action_handler,
        consultations::rate_consultation_handler,
        consultations::list_messages_handler,
        consultations::send_message_handler,
        consultations::attach_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            wallet::PlanResponse,
            wallet::WalletResponse,
            wallet::SubscribeResponse,
            wizard::StartInterviewRequest,
            wizard::StartCareerPathRequest,
            wizard::StartResponse,
            wizard::StepResponse,
            wizard::SubmitAnswerRequest,
            wizard::SubmitAnswerResponse,
            wizard::SessionResponse,
            wizard::ResultEntryResponse,
            wizard::ResultResponse,
            consultations::ExpertResponse,
            consultations::CreateConsultationRequest,
            consultations::ConsultationResponse,
            consultations::ConsultationDetailResponse,
            consultations::ActionResponse,
            consultations::RateRequest,
            consultations::MessageResponse,
            consultations::SendMessageRequest,
            consultations::AttachmentResponse,
            consultations::AttachRequest,
            consultations::RatingResponse,
        )
    ),
    tags(
        (name = "Moazer API", description = "Career guidance: AI interviews, career path discovery and expert consultations.")
    )
)]
pub struct ApiDoc;
