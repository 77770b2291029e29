//! crates/moazer_core/src/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. Every operation runs under
//! one lock, which gives the same all-or-nothing guarantees the SQL adapter gets from
//! transactions. Used by the test suites and by the `memory` storage backend.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    Answer, Attachment, AuthSession, Charge, ChatMessage, Consultation, ConsultationStatus,
    NewConsultation, NewSession, Owner, Phase, Plan, Question, QuestionFeedback, Rating, Role,
    Session, SessionStatus, SessionSummary, UsageLog, User, UserCredentials,
};
use crate::ports::{DatabaseService, PortError, PortResult};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, (User, String)>,
    auth_sessions: HashMap<String, AuthSession>,
    wallets: HashMap<Uuid, u32>,
    usage_logs: Vec<UsageLog>,
    plans: Vec<Plan>,
    guest_trials: HashSet<(String, String)>,
    sessions: HashMap<Uuid, Session>,
    questions: Vec<Question>,
    answers: Vec<Answer>,
    consultations: HashMap<Uuid, Consultation>,
    messages: Vec<ChatMessage>,
    attachments: Vec<Attachment>,
    ratings: HashMap<Uuid, Rating>,
}

/// A `DatabaseService` backed by plain collections.
#[derive(Default)]
pub struct InMemoryDatabase {
    tables: Mutex<Tables>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(what: &str, id: impl std::fmt::Display) -> PortError {
    PortError::NotFound(format!("{} {} not found", what, id))
}

impl Tables {
    fn charge(&mut self, charge: &Charge) -> bool {
        match charge {
            Charge::Wallet {
                user_id,
                product_code,
            } => self.consume(*user_id, 1, product_code),
            Charge::GuestTrial {
                token,
                product_code,
            } => self
                .guest_trials
                .insert((token.clone(), product_code.clone())),
        }
    }

    fn consume(&mut self, user_id: Uuid, amount: u32, product_code: &str) -> bool {
        let balance = self.wallets.entry(user_id).or_insert(0);
        if *balance < amount {
            return false;
        }
        *balance -= amount;
        self.usage_logs.push(UsageLog {
            id: Uuid::new_v4(),
            user_id,
            product_code: product_code.to_string(),
            amount,
            created_at: Utc::now(),
        });
        true
    }

    fn touch(&mut self, consultation_id: Uuid) {
        if let Some(c) = self.consultations.get_mut(&consultation_id) {
            c.updated_at = Utc::now();
        }
    }

    fn consultation(&self, consultation_id: Uuid) -> PortResult<&Consultation> {
        self.consultations
            .get(&consultation_id)
            .ok_or_else(|| not_found("Consultation", consultation_id))
    }
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
        role: Role,
    ) -> PortResult<User> {
        let mut t = self.tables.lock().await;
        if t.users.values().any(|(u, _)| u.email.eq_ignore_ascii_case(email)) {
            return Err(PortError::Unexpected(format!("email {} is already registered", email)));
        }
        let user = User {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            role,
        };
        t.users
            .insert(user.user_id, (user.clone(), hashed_password.to_string()));
        t.wallets.insert(user.user_id, 0);
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let t = self.tables.lock().await;
        t.users
            .get(&user_id)
            .map(|(u, _)| u.clone())
            .ok_or_else(|| not_found("User", user_id))
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let t = self.tables.lock().await;
        t.users
            .values()
            .find(|(u, _)| u.email.eq_ignore_ascii_case(email))
            .map(|(u, hash)| UserCredentials {
                user_id: u.user_id,
                email: u.email.clone(),
                hashed_password: hash.clone(),
            })
            .ok_or_else(|| not_found("User", email))
    }

    async fn list_users_by_role(&self, role: Role) -> PortResult<Vec<User>> {
        let t = self.tables.lock().await;
        let mut users: Vec<User> = t
            .users
            .values()
            .filter(|(u, _)| u.role == role)
            .map(|(u, _)| u.clone())
            .collect();
        users.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(users)
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<AuthSession> {
        let mut t = self.tables.lock().await;
        let session = AuthSession {
            id: session_id.to_string(),
            user_id,
            expires_at,
        };
        t.auth_sessions
            .insert(session_id.to_string(), session.clone());
        Ok(session)
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let t = self.tables.lock().await;
        match t.auth_sessions.get(session_id) {
            Some(s) if s.expires_at > Utc::now() => Ok(s.user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        let mut t = self.tables.lock().await;
        t.auth_sessions.remove(session_id);
        Ok(())
    }

    async fn wallet_balance(&self, user_id: Uuid) -> PortResult<u32> {
        let mut t = self.tables.lock().await;
        Ok(*t.wallets.entry(user_id).or_insert(0))
    }

    async fn consume_attempts(&self, user_id: Uuid, amount: u32, product_code: &str) -> PortResult<bool> {
        let mut t = self.tables.lock().await;
        Ok(t.consume(user_id, amount, product_code))
    }

    async fn grant_attempts(&self, user_id: Uuid, amount: u32) -> PortResult<u32> {
        let mut t = self.tables.lock().await;
        let balance = t.wallets.entry(user_id).or_insert(0);
        *balance = balance.saturating_add(amount);
        Ok(*balance)
    }

    async fn usage_logs(&self, user_id: Uuid) -> PortResult<Vec<UsageLog>> {
        let t = self.tables.lock().await;
        Ok(t.usage_logs
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_plan(&self, name: &str, attempts: u32, price_sar: f64) -> PortResult<Plan> {
        let mut t = self.tables.lock().await;
        let plan = Plan {
            id: Uuid::new_v4(),
            name: name.to_string(),
            attempts,
            price_sar,
        };
        t.plans.push(plan.clone());
        Ok(plan)
    }

    async fn list_plans(&self) -> PortResult<Vec<Plan>> {
        let t = self.tables.lock().await;
        let mut plans = t.plans.clone();
        plans.sort_by(|a, b| a.price_sar.total_cmp(&b.price_sar));
        Ok(plans)
    }

    async fn get_plan(&self, plan_id: Uuid) -> PortResult<Plan> {
        let t = self.tables.lock().await;
        t.plans
            .iter()
            .find(|p| p.id == plan_id)
            .cloned()
            .ok_or_else(|| not_found("Plan", plan_id))
    }

    async fn guest_trial_used(&self, token: &str, product_code: &str) -> PortResult<bool> {
        let t = self.tables.lock().await;
        Ok(t.guest_trials
            .contains(&(token.to_string(), product_code.to_string())))
    }

    async fn start_session(
        &self,
        new_session: NewSession,
        questions: Vec<String>,
        charge: Charge,
    ) -> PortResult<Option<Session>> {
        let mut t = self.tables.lock().await;
        if !t.charge(&charge) {
            return Ok(None);
        }
        let session = Session {
            id: Uuid::new_v4(),
            owner: new_session.owner,
            kind: new_session.kind,
            topic: new_session.topic,
            suggested_path: None,
            status: SessionStatus::Running,
            summary: None,
            created_at: Utc::now(),
        };
        for (i, text) in questions.into_iter().enumerate() {
            t.questions.push(Question {
                id: Uuid::new_v4(),
                session_id: session.id,
                order: i as u32 + 1,
                text,
                phase: Phase::General,
            });
        }
        t.sessions.insert(session.id, session.clone());
        Ok(Some(session))
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<Session> {
        let t = self.tables.lock().await;
        t.sessions
            .get(&session_id)
            .cloned()
            .ok_or_else(|| not_found("Session", session_id))
    }

    async fn list_sessions_for_user(&self, user_id: Uuid) -> PortResult<Vec<Session>> {
        let t = self.tables.lock().await;
        let owner = Owner::User(user_id);
        let mut sessions: Vec<Session> = t
            .sessions
            .values()
            .filter(|s| s.owner == owner)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn get_questions(&self, session_id: Uuid) -> PortResult<Vec<Question>> {
        let t = self.tables.lock().await;
        let mut questions: Vec<Question> = t
            .questions
            .iter()
            .filter(|q| q.session_id == session_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.order);
        Ok(questions)
    }

    async fn get_answers(&self, session_id: Uuid) -> PortResult<Vec<Answer>> {
        let t = self.tables.lock().await;
        Ok(t.answers
            .iter()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn upsert_answer(&self, session_id: Uuid, question_id: Uuid, content: &str) -> PortResult<Answer> {
        let mut t = self.tables.lock().await;
        if let Some(existing) = t
            .answers
            .iter_mut()
            .find(|a| a.session_id == session_id && a.question_id == question_id)
        {
            existing.content = content.to_string();
            return Ok(existing.clone());
        }
        let answer = Answer {
            id: Uuid::new_v4(),
            session_id,
            question_id,
            content: content.to_string(),
            feedback: None,
            created_at: Utc::now(),
        };
        t.answers.push(answer.clone());
        Ok(answer)
    }

    async fn append_specialized_questions(
        &self,
        session_id: Uuid,
        existing_count: u32,
        suggested_path: &str,
        questions: Vec<String>,
    ) -> PortResult<bool> {
        let mut t = self.tables.lock().await;
        let current = t
            .questions
            .iter()
            .filter(|q| q.session_id == session_id)
            .count() as u32;
        if current != existing_count {
            return Ok(false);
        }
        let session = t
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| not_found("Session", session_id))?;
        session.suggested_path = Some(suggested_path.to_string());
        for (i, text) in questions.into_iter().enumerate() {
            t.questions.push(Question {
                id: Uuid::new_v4(),
                session_id,
                order: existing_count + i as u32 + 1,
                text,
                phase: Phase::Specialized,
            });
        }
        Ok(true)
    }

    async fn finalize_session(
        &self,
        session_id: Uuid,
        feedback: Vec<QuestionFeedback>,
        summary: SessionSummary,
    ) -> PortResult<bool> {
        let mut t = self.tables.lock().await;
        let session = t
            .sessions
            .get(&session_id)
            .ok_or_else(|| not_found("Session", session_id))?;
        if session.status != SessionStatus::Running {
            return Ok(false);
        }
        for item in feedback {
            match t
                .answers
                .iter_mut()
                .find(|a| a.session_id == session_id && a.question_id == item.question_id)
            {
                Some(answer) => answer.feedback = Some(item.feedback),
                None => t.answers.push(Answer {
                    id: Uuid::new_v4(),
                    session_id,
                    question_id: item.question_id,
                    content: String::new(),
                    feedback: Some(item.feedback),
                    created_at: Utc::now(),
                }),
            }
        }
        if let Some(session) = t.sessions.get_mut(&session_id) {
            session.summary = Some(summary);
            session.status = SessionStatus::Finished;
        }
        Ok(true)
    }

    async fn create_consultation(
        &self,
        new_consultation: NewConsultation,
        attachments: Vec<String>,
    ) -> PortResult<Consultation> {
        let mut t = self.tables.lock().await;
        let now = Utc::now();
        let consultation = Consultation {
            id: Uuid::new_v4(),
            student_id: new_consultation.student_id,
            expert_id: Some(new_consultation.expert_id),
            kind: new_consultation.kind,
            title: new_consultation.title,
            description: new_consultation.description,
            status: ConsultationStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        for file_ref in attachments {
            t.attachments.push(Attachment {
                id: Uuid::new_v4(),
                consultation_id: consultation.id,
                uploaded_by: consultation.student_id,
                file_ref,
                created_at: now,
            });
        }
        t.consultations
            .insert(consultation.id, consultation.clone());
        Ok(consultation)
    }

    async fn get_consultation(&self, consultation_id: Uuid) -> PortResult<Consultation> {
        let t = self.tables.lock().await;
        t.consultation(consultation_id).cloned()
    }

    async fn list_consultations_for_student(&self, student_id: Uuid) -> PortResult<Vec<Consultation>> {
        let t = self.tables.lock().await;
        let mut items: Vec<Consultation> = t
            .consultations
            .values()
            .filter(|c| c.student_id == student_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(items)
    }

    async fn list_consultations_for_expert(&self, expert_id: Uuid) -> PortResult<Vec<Consultation>> {
        let t = self.tables.lock().await;
        let mut items: Vec<Consultation> = t
            .consultations
            .values()
            .filter(|c| c.expert_id == Some(expert_id))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(items)
    }

    async fn transition_consultation(
        &self,
        consultation_id: Uuid,
        from: ConsultationStatus,
        to: ConsultationStatus,
    ) -> PortResult<bool> {
        let mut t = self.tables.lock().await;
        let consultation = t
            .consultations
            .get_mut(&consultation_id)
            .ok_or_else(|| not_found("Consultation", consultation_id))?;
        if consultation.status != from {
            return Ok(false);
        }
        consultation.status = to;
        consultation.updated_at = Utc::now();
        Ok(true)
    }

    async fn add_chat_message(
        &self,
        consultation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> PortResult<ChatMessage> {
        let mut t = self.tables.lock().await;
        t.consultation(consultation_id)?;
        let message = ChatMessage {
            id: Uuid::new_v4(),
            consultation_id,
            sender_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        t.messages.push(message.clone());
        t.touch(consultation_id);
        Ok(message)
    }

    async fn list_chat_messages(&self, consultation_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        let t = self.tables.lock().await;
        Ok(t.messages
            .iter()
            .filter(|m| m.consultation_id == consultation_id)
            .cloned()
            .collect())
    }

    async fn add_attachment(
        &self,
        consultation_id: Uuid,
        uploaded_by: Uuid,
        file_ref: &str,
    ) -> PortResult<Attachment> {
        let mut t = self.tables.lock().await;
        t.consultation(consultation_id)?;
        let attachment = Attachment {
            id: Uuid::new_v4(),
            consultation_id,
            uploaded_by,
            file_ref: file_ref.to_string(),
            created_at: Utc::now(),
        };
        t.attachments.push(attachment.clone());
        t.touch(consultation_id);
        Ok(attachment)
    }

    async fn list_attachments(&self, consultation_id: Uuid) -> PortResult<Vec<Attachment>> {
        let t = self.tables.lock().await;
        Ok(t.attachments
            .iter()
            .filter(|a| a.consultation_id == consultation_id)
            .cloned()
            .collect())
    }

    async fn rate_consultation(&self, consultation_id: Uuid, stars: u8, comment: &str) -> PortResult<Rating> {
        let mut t = self.tables.lock().await;
        let consultation = t
            .consultations
            .get_mut(&consultation_id)
            .ok_or_else(|| not_found("Consultation", consultation_id))?;
        consultation.status = ConsultationStatus::Completed;
        consultation.updated_at = Utc::now();
        let rating = Rating {
            consultation_id,
            stars,
            comment: comment.to_string(),
            created_at: Utc::now(),
        };
        t.ratings.insert(consultation_id, rating.clone());
        Ok(rating)
    }

    async fn get_rating(&self, consultation_id: Uuid) -> PortResult<Option<Rating>> {
        let t = self.tables.lock().await;
        Ok(t.ratings.get(&consultation_id).cloned())
    }
}
