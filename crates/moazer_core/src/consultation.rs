//! crates/moazer_core/src/consultation.rs
//!
//! The student/expert consultation workflow: request, accept or reject, chat, end, rate.
//! Every state × action pair is defined in `transition`; anything it does not allow is
//! rejected without touching the stored row.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    Attachment, ChatMessage, Consultation, ConsultationStatus, ConsultationType, NewConsultation,
    Rating, Role, User,
};
use crate::error::{MoazerError, MoazerResult};
use crate::ports::DatabaseService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsultationAction {
    Accept,
    Reject,
    ExpertEnd,
    StudentEnd,
    Rate,
}

impl ConsultationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationAction::Accept => "accept",
            ConsultationAction::Reject => "reject",
            ConsultationAction::ExpertEnd => "expert_end",
            ConsultationAction::StudentEnd => "student_end",
            ConsultationAction::Rate => "rate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "accept" => Some(ConsultationAction::Accept),
            "reject" => Some(ConsultationAction::Reject),
            "expert_end" => Some(ConsultationAction::ExpertEnd),
            "student_end" => Some(ConsultationAction::StudentEnd),
            "rate" => Some(ConsultationAction::Rate),
            _ => None,
        }
    }

    /// The only participant allowed to perform the action.
    pub fn actor(&self) -> Participant {
        match self {
            ConsultationAction::Accept
            | ConsultationAction::Reject
            | ConsultationAction::ExpertEnd => Participant::Expert,
            ConsultationAction::StudentEnd | ConsultationAction::Rate => Participant::Student,
        }
    }
}

impl fmt::Display for ConsultationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    Student,
    Expert,
}

/// The effect of an allowed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(ConsultationStatus),
    /// Allowed, but the status is left alone (the student is sent to the rating step).
    Stay,
}

/// The full transition table. `None` means the action is not allowed in that state.
pub fn transition(status: ConsultationStatus, action: ConsultationAction) -> Option<Transition> {
    use ConsultationAction as A;
    use ConsultationStatus as S;

    match (status, action) {
        // Rating always completes, whatever the prior status.
        (_, A::Rate) => Some(Transition::To(S::Completed)),

        (S::Pending, A::Accept) => Some(Transition::To(S::Active)),
        (S::Pending, A::Reject) => Some(Transition::To(S::Closed)),
        (S::Pending, A::ExpertEnd) => Some(Transition::To(S::Completed)),
        (S::Pending, A::StudentEnd) => None,

        (S::Active, A::ExpertEnd) => Some(Transition::To(S::Completed)),
        (S::Active, A::StudentEnd) => Some(Transition::Stay),
        (S::Active, A::Accept | A::Reject) => None,

        (S::New, A::Accept | A::Reject | A::ExpertEnd | A::StudentEnd) => None,
        (S::Completed, A::Accept | A::Reject | A::ExpertEnd | A::StudentEnd) => None,
        (S::Closed, A::Accept | A::Reject | A::ExpertEnd | A::StudentEnd) => None,
    }
}

/// Result of a status action.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub consultation: Consultation,
    /// Set when the student ended the consultation and should now rate it.
    pub rating_required: bool,
}

#[derive(Debug, Clone)]
pub struct ConsultationDetail {
    pub consultation: Consultation,
    pub viewer: Participant,
    pub messages: Vec<ChatMessage>,
    pub attachments: Vec<Attachment>,
    pub rating: Option<Rating>,
}

#[derive(Clone)]
pub struct ConsultationService {
    db: Arc<dyn DatabaseService>,
}

impl ConsultationService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn list_experts(&self) -> MoazerResult<Vec<User>> {
        Ok(self.db.list_users_by_role(Role::Expert).await?)
    }

    /// Opens a PENDING consultation from a student to a real expert.
    pub async fn create(
        &self,
        student: &User,
        expert_id: Uuid,
        kind: &str,
        title: &str,
        description: &str,
        attachments: Vec<String>,
    ) -> MoazerResult<Consultation> {
        if student.role != Role::Student {
            return Err(MoazerError::Forbidden(
                "only students can request consultations".to_string(),
            ));
        }
        let title = title.trim();
        if title.is_empty() {
            return Err(MoazerError::Validation("title is required".to_string()));
        }
        let kind = ConsultationType::parse(kind)
            .ok_or_else(|| MoazerError::Validation(format!("unknown consultation type '{}'", kind)))?;

        let expert = match self.db.get_user_by_id(expert_id).await {
            Ok(user) if user.role == Role::Expert && user.user_id != student.user_id => user,
            Ok(_) | Err(crate::ports::PortError::NotFound(_)) => {
                return Err(MoazerError::Validation(format!(
                    "{} is not an expert",
                    expert_id
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let files = attachments
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();

        let consultation = self
            .db
            .create_consultation(
                NewConsultation {
                    student_id: student.user_id,
                    expert_id: expert.user_id,
                    kind,
                    title: title.to_string(),
                    description: description.trim().to_string(),
                },
                files,
            )
            .await?;
        info!(consultation_id = %consultation.id, expert_id = %expert.user_id, "Consultation requested");
        Ok(consultation)
    }

    /// Consultations the user takes part in, by role, most recently updated first.
    pub async fn list_for(&self, user: &User) -> MoazerResult<Vec<Consultation>> {
        let items = match user.role {
            Role::Student => self.db.list_consultations_for_student(user.user_id).await?,
            Role::Expert => self.db.list_consultations_for_expert(user.user_id).await?,
        };
        Ok(items)
    }

    pub async fn detail(&self, user_id: Uuid, consultation_id: Uuid) -> MoazerResult<ConsultationDetail> {
        let (consultation, viewer) = self.participant_view(user_id, consultation_id).await?;
        let messages = self.db.list_chat_messages(consultation.id).await?;
        let attachments = self.db.list_attachments(consultation.id).await?;
        let rating = self.db.get_rating(consultation.id).await?;
        Ok(ConsultationDetail {
            consultation,
            viewer,
            messages,
            attachments,
            rating,
        })
    }

    /// Applies accept / reject / expert_end / student_end.
    pub async fn act(
        &self,
        user_id: Uuid,
        consultation_id: Uuid,
        action: ConsultationAction,
    ) -> MoazerResult<ActionOutcome> {
        if action == ConsultationAction::Rate {
            return Err(MoazerError::Validation(
                "ratings are submitted with a star value".to_string(),
            ));
        }
        let (consultation, participant) = self.participant_view(user_id, consultation_id).await?;
        if participant != action.actor() {
            warn!(%consultation_id, action = %action, "Action attempted by the wrong participant");
            return Err(MoazerError::Forbidden(format!(
                "this participant cannot {} the consultation",
                action
            )));
        }

        let from = consultation.status;
        match transition(from, action) {
            None => {
                warn!(%consultation_id, action = %action, status = %from, "Transition not allowed");
                Err(MoazerError::InvalidTransition { from, action })
            }
            Some(Transition::Stay) => Ok(ActionOutcome {
                consultation,
                rating_required: true,
            }),
            Some(Transition::To(to)) => {
                if !self.db.transition_consultation(consultation.id, from, to).await? {
                    // Someone else moved it first.
                    let current = self.db.get_consultation(consultation.id).await?;
                    return Err(MoazerError::InvalidTransition {
                        from: current.status,
                        action,
                    });
                }
                info!(%consultation_id, action = %action, from = %from, to = %to, "Consultation status changed");
                let consultation = self.db.get_consultation(consultation.id).await?;
                Ok(ActionOutcome {
                    consultation,
                    rating_required: false,
                })
            }
        }
    }

    /// Student-only. Upserts the rating and completes the consultation.
    pub async fn rate(
        &self,
        user_id: Uuid,
        consultation_id: Uuid,
        stars: i64,
        comment: Option<&str>,
    ) -> MoazerResult<Rating> {
        let (consultation, participant) = self.participant_view(user_id, consultation_id).await?;
        if participant != ConsultationAction::Rate.actor() {
            return Err(MoazerError::Forbidden("only the student can rate".to_string()));
        }
        if !(1..=5).contains(&stars) {
            return Err(MoazerError::Validation("rating must be between 1 and 5".to_string()));
        }
        let from = consultation.status;
        if transition(from, ConsultationAction::Rate) != Some(Transition::To(ConsultationStatus::Completed)) {
            return Err(MoazerError::InvalidTransition {
                from,
                action: ConsultationAction::Rate,
            });
        }
        let rating = self
            .db
            .rate_consultation(consultation.id, stars as u8, comment.unwrap_or("").trim())
            .await?;
        info!(%consultation_id, stars, "Consultation rated and completed");
        Ok(rating)
    }

    /// Either participant, at any status. Messages are append-only.
    pub async fn send_message(
        &self,
        user_id: Uuid,
        consultation_id: Uuid,
        content: &str,
    ) -> MoazerResult<ChatMessage> {
        let (consultation, _) = self.participant_view(user_id, consultation_id).await?;
        let content = content.trim();
        if content.is_empty() {
            return Err(MoazerError::Validation("message is empty".to_string()));
        }
        Ok(self
            .db
            .add_chat_message(consultation.id, user_id, content)
            .await?)
    }

    pub async fn messages(&self, user_id: Uuid, consultation_id: Uuid) -> MoazerResult<Vec<ChatMessage>> {
        let (consultation, _) = self.participant_view(user_id, consultation_id).await?;
        Ok(self.db.list_chat_messages(consultation.id).await?)
    }

    pub async fn attach(
        &self,
        user_id: Uuid,
        consultation_id: Uuid,
        file_ref: &str,
    ) -> MoazerResult<Attachment> {
        let (consultation, _) = self.participant_view(user_id, consultation_id).await?;
        let file_ref = file_ref.trim();
        if file_ref.is_empty() {
            return Err(MoazerError::Validation("file reference is required".to_string()));
        }
        Ok(self
            .db
            .add_attachment(consultation.id, user_id, file_ref)
            .await?)
    }

    /// Loads the consultation and resolves the caller's side. Outsiders get `NotFound`
    /// so nothing is disclosed about the consultation.
    async fn participant_view(
        &self,
        user_id: Uuid,
        consultation_id: Uuid,
    ) -> MoazerResult<(Consultation, Participant)> {
        let consultation = self.db.get_consultation(consultation_id).await?;
        let participant = if consultation.student_id == user_id {
            Participant::Student
        } else if consultation.expert_id == Some(user_id) {
            Participant::Expert
        } else {
            warn!(%consultation_id, %user_id, "Consultation accessed by a non-participant");
            return Err(MoazerError::NotFound(format!(
                "Consultation {} not found",
                consultation_id
            )));
        };
        Ok((consultation, participant))
    }
}
