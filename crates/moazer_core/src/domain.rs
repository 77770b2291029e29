//! crates/moazer_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

//=========================================================================================
// Users & Auth
//=========================================================================================

/// The role a user signs up with. Resolved once at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Student,
    Expert,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Expert => "EXPERT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "STUDENT" => Some(Role::Student),
            "EXPERT" => Some(Role::Expert),
            _ => None,
        }
    }
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Wallet & Plans
//=========================================================================================

pub const PRODUCT_AI_INTERVIEW: &str = "ai_interview";
pub const PRODUCT_CAREER_PATH: &str = "career_path";

/// One append-only audit row per successful wallet decrement.
#[derive(Debug, Clone)]
pub struct UsageLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_code: String,
    pub amount: u32,
    pub created_at: DateTime<Utc>,
}

/// A prepaid plan that grants a fixed number of attempts.
#[derive(Debug, Clone)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub attempts: u32,
    pub price_sar: f64,
}

//=========================================================================================
// Wizard Sessions (mock interview & career path)
//=========================================================================================

/// Who owns a wizard session. Exactly one identity, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    User(Uuid),
    Guest(String),
}

impl Owner {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Owner::User(id) => Some(*id),
            Owner::Guest(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathMode {
    /// School students about to pick a university track.
    School,
    /// Graduates looking for a precise direction inside their major.
    Grad,
}

/// The fixed labels a school-mode career path is classified into.
pub const SCHOOL_PATH_LABELS: [&str; 6] = [
    "Technical",
    "Health",
    "Education",
    "Business/Administration",
    "Creative/Design",
    "Engineering",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Interview,
    CareerPath(PathMode),
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Interview => "INTERVIEW",
            SessionKind::CareerPath(PathMode::School) => "CAREER_SCHOOL",
            SessionKind::CareerPath(PathMode::Grad) => "CAREER_GRAD",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INTERVIEW" => Some(SessionKind::Interview),
            "CAREER_SCHOOL" => Some(SessionKind::CareerPath(PathMode::School)),
            "CAREER_GRAD" => Some(SessionKind::CareerPath(PathMode::Grad)),
            _ => None,
        }
    }

    /// The usage-log product code charged when a session of this kind starts.
    pub fn product_code(&self) -> &'static str {
        match self {
            SessionKind::Interview => PRODUCT_AI_INTERVIEW,
            SessionKind::CareerPath(_) => PRODUCT_CAREER_PATH,
        }
    }

    /// Number of questions generated when the session starts.
    pub fn first_phase_len(&self) -> usize {
        match self {
            SessionKind::Interview => 5,
            SessionKind::CareerPath(_) => 10,
        }
    }

    /// Number of specialized questions appended after phase 1, if the kind has a second phase.
    pub fn second_phase_len(&self) -> Option<usize> {
        match self {
            SessionKind::Interview => None,
            SessionKind::CareerPath(_) => Some(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Finished,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "RUNNING",
            SessionStatus::Finished => "FINISHED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "RUNNING" => Some(SessionStatus::Running),
            "FINISHED" => Some(SessionStatus::Finished),
            _ => None,
        }
    }
}

/// The session-level summary stored once the wizard finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub strengths: String,
    pub weaknesses: String,
    pub recommendation: String,
    /// 1.0..=5.0 with one decimal place, when known.
    pub overall_score: Option<f64>,
}

/// One run of the linear question/answer wizard.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub owner: Owner,
    pub kind: SessionKind,
    /// Job title for interviews, the major for graduate career paths, empty otherwise.
    pub topic: String,
    pub suggested_path: Option<String>,
    pub status: SessionStatus,
    pub summary: Option<SessionSummary>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_owned_by(&self, owner: &Owner) -> bool {
        &self.owner == owner
    }
}

/// A session about to be created, before the store assigns identity.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub owner: Owner,
    pub kind: SessionKind,
    pub topic: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    General = 1,
    Specialized = 2,
}

impl Phase {
    pub fn from_i32(value: i32) -> Self {
        if value == 2 {
            Phase::Specialized
        } else {
            Phase::General
        }
    }
}

#[derive(Debug, Clone)]
pub struct Question {
    pub id: Uuid,
    pub session_id: Uuid,
    /// 1-based, unique within the session.
    pub order: u32,
    pub text: String,
    pub phase: Phase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerFeedback {
    pub strengths: String,
    pub weaknesses: String,
    pub score: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub id: Uuid,
    pub session_id: Uuid,
    pub question_id: Uuid,
    pub content: String,
    pub feedback: Option<AnswerFeedback>,
    pub created_at: DateTime<Utc>,
}

/// Feedback for one question, written during finalization.
#[derive(Debug, Clone)]
pub struct QuestionFeedback {
    pub question_id: Uuid,
    pub feedback: AnswerFeedback,
}

/// How a session start is paid for.
#[derive(Debug, Clone)]
pub enum Charge {
    Wallet { user_id: Uuid, product_code: String },
    GuestTrial { token: String, product_code: String },
}

//=========================================================================================
// Consultations
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsultationType {
    StudyPath,
    CareerPath,
    Interview,
    CvReview,
    General,
}

impl ConsultationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationType::StudyPath => "STUDY_PATH",
            ConsultationType::CareerPath => "CAREER_PATH",
            ConsultationType::Interview => "INTERVIEW",
            ConsultationType::CvReview => "CV_REVIEW",
            ConsultationType::General => "GENERAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "STUDY_PATH" => Some(ConsultationType::StudyPath),
            "CAREER_PATH" => Some(ConsultationType::CareerPath),
            "INTERVIEW" => Some(ConsultationType::Interview),
            "CV_REVIEW" => Some(ConsultationType::CvReview),
            "GENERAL" => Some(ConsultationType::General),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsultationStatus {
    New,
    Pending,
    Active,
    Completed,
    Closed,
}

impl ConsultationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::New => "NEW",
            ConsultationStatus::Pending => "PENDING",
            ConsultationStatus::Active => "ACTIVE",
            ConsultationStatus::Completed => "COMPLETED",
            ConsultationStatus::Closed => "CLOSED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NEW" => Some(ConsultationStatus::New),
            "PENDING" => Some(ConsultationStatus::Pending),
            "ACTIVE" => Some(ConsultationStatus::Active),
            "COMPLETED" => Some(ConsultationStatus::Completed),
            "CLOSED" => Some(ConsultationStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Consultation {
    pub id: Uuid,
    pub student_id: Uuid,
    /// Null once the expert account is removed; the consultation is kept.
    pub expert_id: Option<Uuid>,
    pub kind: ConsultationType,
    pub title: String,
    pub description: String,
    pub status: ConsultationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewConsultation {
    pub student_id: Uuid,
    pub expert_id: Uuid,
    pub kind: ConsultationType,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub uploaded_by: Uuid,
    pub file_ref: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Rating {
    pub consultation_id: Uuid,
    pub stars: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}
