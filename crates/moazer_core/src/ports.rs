//! crates/moazer_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Answer, Attachment, AuthSession, Charge, ChatMessage, Consultation, ConsultationStatus,
    NewConsultation, NewSession, PathMode, Plan, Question, QuestionFeedback, Rating, Role,
    Session, SessionSummary, UsageLog, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Oracle Request/Response Types
//=========================================================================================

/// What a batch of questions should be about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionBrief {
    /// Mock interview questions for a job title.
    Interview { job_title: String },
    /// Phase-1 career discovery questions. `major` is empty in school mode.
    PathDiscovery { mode: PathMode, major: String },
    /// Phase-2 questions specialized for a suggested path.
    PathSpecialization { path: String },
}

/// The context used to classify phase-1 answers into a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathContext {
    /// Pick exactly one of the fixed school path labels.
    School,
    /// Pick a precise sub-path inside the given major.
    Grad { major: String },
}

/// One question/answer pair sent for analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct QaItem {
    pub order: u32,
    pub question: String,
    pub answer: String,
}

/// Per-answer feedback as reported by the oracle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemFeedback {
    pub order: u32,
    pub strengths: String,
    pub weaknesses: String,
    pub score: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionAnalysis {
    pub items: Vec<ItemFeedback>,
    pub strengths: String,
    pub weaknesses: String,
    pub recommendation: String,
    pub overall_score: Option<f64>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    /// Creates the user together with a zero-balance wallet.
    async fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
        role: Role,
    ) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn list_users_by_role(&self, role: Role) -> PortResult<Vec<User>>;

    // --- Auth Methods ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<AuthSession>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Wallet & Plans ---
    /// Returns the balance, creating an empty wallet on first access.
    async fn wallet_balance(&self, user_id: Uuid) -> PortResult<u32>;

    /// Decrements the balance and appends a usage log in one atomic step.
    /// Returns `false` without mutating anything when the balance is short.
    async fn consume_attempts(&self, user_id: Uuid, amount: u32, product_code: &str)
        -> PortResult<bool>;

    /// Adds attempts and returns the new balance.
    async fn grant_attempts(&self, user_id: Uuid, amount: u32) -> PortResult<u32>;

    async fn usage_logs(&self, user_id: Uuid) -> PortResult<Vec<UsageLog>>;

    async fn create_plan(&self, name: &str, attempts: u32, price_sar: f64) -> PortResult<Plan>;

    async fn list_plans(&self) -> PortResult<Vec<Plan>>;

    async fn get_plan(&self, plan_id: Uuid) -> PortResult<Plan>;

    async fn guest_trial_used(&self, token: &str, product_code: &str) -> PortResult<bool>;

    // --- Wizard Sessions ---
    /// Creates the session and its first question batch and applies the charge, all or nothing.
    /// Returns `None` when the charge is refused; nothing is written in that case.
    async fn start_session(
        &self,
        new_session: NewSession,
        questions: Vec<String>,
        charge: Charge,
    ) -> PortResult<Option<Session>>;

    async fn get_session(&self, session_id: Uuid) -> PortResult<Session>;

    /// Sessions owned by an authenticated user, newest first.
    async fn list_sessions_for_user(&self, user_id: Uuid) -> PortResult<Vec<Session>>;

    /// Questions of a session ordered by position.
    async fn get_questions(&self, session_id: Uuid) -> PortResult<Vec<Question>>;

    async fn get_answers(&self, session_id: Uuid) -> PortResult<Vec<Answer>>;

    /// One answer per question; later submissions overwrite the content.
    async fn upsert_answer(
        &self,
        session_id: Uuid,
        question_id: Uuid,
        content: &str,
    ) -> PortResult<Answer>;

    /// Stores the suggested path and appends specialized questions after position
    /// `existing_count`. Returns `false` (and writes nothing) if the session no longer
    /// has exactly `existing_count` questions.
    async fn append_specialized_questions(
        &self,
        session_id: Uuid,
        existing_count: u32,
        suggested_path: &str,
        questions: Vec<String>,
    ) -> PortResult<bool>;

    /// Writes per-answer feedback, the summary and flips the status to FINISHED in one
    /// atomic step. Returns `false` (and writes nothing) if the session is not RUNNING.
    async fn finalize_session(
        &self,
        session_id: Uuid,
        feedback: Vec<QuestionFeedback>,
        summary: SessionSummary,
    ) -> PortResult<bool>;

    // --- Consultations ---
    /// Creates a PENDING consultation together with its initial attachments.
    async fn create_consultation(
        &self,
        new_consultation: NewConsultation,
        attachments: Vec<String>,
    ) -> PortResult<Consultation>;

    async fn get_consultation(&self, consultation_id: Uuid) -> PortResult<Consultation>;

    async fn list_consultations_for_student(&self, student_id: Uuid)
        -> PortResult<Vec<Consultation>>;

    async fn list_consultations_for_expert(&self, expert_id: Uuid)
        -> PortResult<Vec<Consultation>>;

    /// Compare-and-set on the status column. Returns `false` if the stored status is not `from`.
    async fn transition_consultation(
        &self,
        consultation_id: Uuid,
        from: ConsultationStatus,
        to: ConsultationStatus,
    ) -> PortResult<bool>;

    async fn add_chat_message(
        &self,
        consultation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> PortResult<ChatMessage>;

    async fn list_chat_messages(&self, consultation_id: Uuid) -> PortResult<Vec<ChatMessage>>;

    async fn add_attachment(
        &self,
        consultation_id: Uuid,
        uploaded_by: Uuid,
        file_ref: &str,
    ) -> PortResult<Attachment>;

    async fn list_attachments(&self, consultation_id: Uuid) -> PortResult<Vec<Attachment>>;

    /// Upserts the rating and marks the consultation COMPLETED in one atomic step.
    async fn rate_consultation(
        &self,
        consultation_id: Uuid,
        stars: u8,
        comment: &str,
    ) -> PortResult<Rating>;

    async fn get_rating(&self, consultation_id: Uuid) -> PortResult<Option<Rating>>;
}

/// The external AI text-generation service, treated as a black box.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Generates exactly `count` ordered questions. Fewer is a failure.
    async fn generate_questions(&self, brief: &QuestionBrief, count: usize)
        -> PortResult<Vec<String>>;

    /// Classifies phase-1 answers into a single path label.
    async fn classify(&self, context: &PathContext, answers: &str) -> PortResult<String>;

    /// Produces per-answer feedback and the session summary.
    async fn analyze_session(&self, topic: &str, items: &[QaItem]) -> PortResult<SessionAnalysis>;
}
