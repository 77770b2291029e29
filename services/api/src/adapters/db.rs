//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moazer_core::domain::{
    Answer, AnswerFeedback, Attachment, AuthSession, Charge, ChatMessage, Consultation,
    ConsultationStatus, ConsultationType, NewConsultation, NewSession, Owner, Phase, Plan,
    Question, QuestionFeedback, Rating, Role, Session, SessionKind, SessionStatus,
    SessionSummary, UsageLog, User, UserCredentials,
};
use moazer_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::error;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    error!("Database error: {}", e);
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} not found", what)),
        _ => unexpected(e),
    }
}

fn corrupt(column: &str, value: &str) -> PortError {
    PortError::Unexpected(format!("unexpected {} value '{}' in database", column, value))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
    display_name: String,
    role: String,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        let role = Role::parse(&self.role).ok_or_else(|| corrupt("role", &self.role))?;
        Ok(User {
            user_id: self.user_id,
            email: self.email,
            display_name: self.display_name,
            role,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct AuthSessionRecord {
    id: String,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct UsageLogRecord {
    id: Uuid,
    user_id: Uuid,
    product_code: String,
    amount: i32,
    created_at: DateTime<Utc>,
}
impl UsageLogRecord {
    fn to_domain(self) -> UsageLog {
        UsageLog {
            id: self.id,
            user_id: self.user_id,
            product_code: self.product_code,
            amount: self.amount.max(0) as u32,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct PlanRecord {
    id: Uuid,
    name: String,
    attempts: i32,
    price_sar: f64,
}
impl PlanRecord {
    fn to_domain(self) -> Plan {
        Plan {
            id: self.id,
            name: self.name,
            attempts: self.attempts.max(0) as u32,
            price_sar: self.price_sar,
        }
    }
}

const SESSION_COLUMNS: &str = "id, user_id, guest_token, kind, topic, suggested_path, status, \
     strengths, weaknesses, recommendation, overall_score, created_at";

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    user_id: Option<Uuid>,
    guest_token: Option<String>,
    kind: String,
    topic: String,
    suggested_path: Option<String>,
    status: String,
    strengths: Option<String>,
    weaknesses: Option<String>,
    recommendation: Option<String>,
    overall_score: Option<f64>,
    created_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> PortResult<Session> {
        let owner = match (self.user_id, self.guest_token) {
            (Some(user_id), _) => Owner::User(user_id),
            (None, Some(token)) => Owner::Guest(token),
            (None, None) => return Err(corrupt("owner", "none")),
        };
        let kind = SessionKind::parse(&self.kind).ok_or_else(|| corrupt("kind", &self.kind))?;
        let status =
            SessionStatus::parse(&self.status).ok_or_else(|| corrupt("status", &self.status))?;
        let summary = match status {
            SessionStatus::Finished => Some(SessionSummary {
                strengths: self.strengths.unwrap_or_default(),
                weaknesses: self.weaknesses.unwrap_or_default(),
                recommendation: self.recommendation.unwrap_or_default(),
                overall_score: self.overall_score,
            }),
            SessionStatus::Running => None,
        };
        Ok(Session {
            id: self.id,
            owner,
            kind,
            topic: self.topic,
            suggested_path: self.suggested_path,
            status,
            summary,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct QuestionRecord {
    id: Uuid,
    session_id: Uuid,
    position: i32,
    text: String,
    phase: i32,
}
impl QuestionRecord {
    fn to_domain(self) -> Question {
        Question {
            id: self.id,
            session_id: self.session_id,
            order: self.position.max(0) as u32,
            text: self.text,
            phase: Phase::from_i32(self.phase),
        }
    }
}

const ANSWER_COLUMNS: &str =
    "id, session_id, question_id, content, strengths, weaknesses, score, created_at";

#[derive(FromRow)]
struct AnswerRecord {
    id: Uuid,
    session_id: Uuid,
    question_id: Uuid,
    content: String,
    strengths: Option<String>,
    weaknesses: Option<String>,
    score: Option<i16>,
    created_at: DateTime<Utc>,
}
impl AnswerRecord {
    fn to_domain(self) -> Answer {
        let feedback = if self.strengths.is_some() || self.weaknesses.is_some() || self.score.is_some() {
            Some(AnswerFeedback {
                strengths: self.strengths.unwrap_or_default(),
                weaknesses: self.weaknesses.unwrap_or_default(),
                score: self.score.and_then(|s| u8::try_from(s).ok()),
            })
        } else {
            None
        };
        Answer {
            id: self.id,
            session_id: self.session_id,
            question_id: self.question_id,
            content: self.content,
            feedback,
            created_at: self.created_at,
        }
    }
}

const CONSULTATION_COLUMNS: &str =
    "id, student_id, expert_id, kind, title, description, status, created_at, updated_at";

#[derive(FromRow)]
struct ConsultationRecord {
    id: Uuid,
    student_id: Uuid,
    expert_id: Option<Uuid>,
    kind: String,
    title: String,
    description: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ConsultationRecord {
    fn to_domain(self) -> PortResult<Consultation> {
        let kind = ConsultationType::parse(&self.kind).ok_or_else(|| corrupt("kind", &self.kind))?;
        let status = ConsultationStatus::parse(&self.status)
            .ok_or_else(|| corrupt("status", &self.status))?;
        Ok(Consultation {
            id: self.id,
            student_id: self.student_id,
            expert_id: self.expert_id,
            kind,
            title: self.title,
            description: self.description,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ChatMessageRecord {
    id: Uuid,
    consultation_id: Uuid,
    sender_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
}
impl ChatMessageRecord {
    fn to_domain(self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            consultation_id: self.consultation_id,
            sender_id: self.sender_id,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct AttachmentRecord {
    id: Uuid,
    consultation_id: Uuid,
    uploaded_by: Uuid,
    file_ref: String,
    created_at: DateTime<Utc>,
}
impl AttachmentRecord {
    fn to_domain(self) -> Attachment {
        Attachment {
            id: self.id,
            consultation_id: self.consultation_id,
            uploaded_by: self.uploaded_by,
            file_ref: self.file_ref,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct RatingRecord {
    consultation_id: Uuid,
    stars: i16,
    comment: String,
    created_at: DateTime<Utc>,
}
impl RatingRecord {
    fn to_domain(self) -> Rating {
        Rating {
            consultation_id: self.consultation_id,
            stars: u8::try_from(self.stars).unwrap_or(0),
            comment: self.comment,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// Shared Transaction Steps
//=========================================================================================

/// Conditional decrement plus usage log. Returns `false` when the balance is short.
async fn consume_in(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: u32,
    product_code: &str,
) -> Result<bool, sqlx::Error> {
    let amount = amount as i32;
    let updated = sqlx::query(
        "UPDATE wallets SET total_attempts = total_attempts - $2, updated_at = NOW() \
         WHERE user_id = $1 AND total_attempts >= $2",
    )
    .bind(user_id)
    .bind(amount)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    if updated == 0 {
        return Ok(false);
    }
    sqlx::query("INSERT INTO usage_logs (id, user_id, product_code, amount) VALUES ($1, $2, $3, $4)")
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(product_code)
        .bind(amount)
        .execute(&mut *conn)
        .await?;
    Ok(true)
}

async fn charge_in(conn: &mut PgConnection, charge: &Charge) -> Result<bool, sqlx::Error> {
    match charge {
        Charge::Wallet {
            user_id,
            product_code,
        } => consume_in(conn, *user_id, 1, product_code).await,
        Charge::GuestTrial {
            token,
            product_code,
        } => {
            let inserted = sqlx::query(
                "INSERT INTO guest_trials (guest_token, product_code) VALUES ($1, $2) \
                 ON CONFLICT (guest_token, product_code) DO NOTHING",
            )
            .bind(token)
            .bind(product_code)
            .execute(&mut *conn)
            .await?
            .rows_affected();
            Ok(inserted == 1)
        }
    }
}

async fn insert_questions(
    conn: &mut PgConnection,
    session_id: Uuid,
    first_position: u32,
    phase: Phase,
    questions: Vec<String>,
) -> Result<(), sqlx::Error> {
    for (i, text) in questions.into_iter().enumerate() {
        sqlx::query(
            "INSERT INTO wizard_questions (id, session_id, position, text, phase) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind((first_position + i as u32) as i32)
        .bind(text)
        .bind(phase as i32)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- User Management ---

    async fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
        role: Role,
    ) -> PortResult<User> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password, display_name, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING user_id, email, display_name, role",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .bind(display_name)
        .bind(role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        sqlx::query("INSERT INTO wallets (user_id) VALUES ($1)")
            .bind(record.user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;

        record.to_domain()
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email, display_name, role FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("User {}", user_id)))?
        .to_domain()
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("User {}", email)))?;

        Ok(UserCredentials {
            user_id: record.user_id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn list_users_by_role(&self, role: Role) -> PortResult<Vec<User>> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email, display_name, role FROM users WHERE role = $1 \
             ORDER BY display_name ASC",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(UserRecord::to_domain)
        .collect()
    }

    // --- Auth Methods ---

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<AuthSession> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3) \
             RETURNING id, user_id, expires_at",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(AuthSession {
            id: record.id,
            user_id: record.user_id,
            expires_at: record.expires_at,
        })
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT id, user_id, expires_at FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => unexpected(e),
        })?;
        Ok(record.user_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Wallet & Plans ---

    async fn wallet_balance(&self, user_id: Uuid) -> PortResult<u32> {
        let (balance,): (i32,) = sqlx::query_as(
            "INSERT INTO wallets (user_id) VALUES ($1) \
             ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id \
             RETURNING total_attempts",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(balance.max(0) as u32)
    }

    async fn consume_attempts(
        &self,
        user_id: Uuid,
        amount: u32,
        product_code: &str,
    ) -> PortResult<bool> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let spent = consume_in(&mut tx, user_id, amount, product_code)
            .await
            .map_err(unexpected)?;
        if spent {
            tx.commit().await.map_err(unexpected)?;
        } else {
            tx.rollback().await.map_err(unexpected)?;
        }
        Ok(spent)
    }

    async fn grant_attempts(&self, user_id: Uuid, amount: u32) -> PortResult<u32> {
        let (balance,): (i32,) = sqlx::query_as(
            "INSERT INTO wallets (user_id, total_attempts) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE \
             SET total_attempts = wallets.total_attempts + EXCLUDED.total_attempts, updated_at = NOW() \
             RETURNING total_attempts",
        )
        .bind(user_id)
        .bind(amount as i32)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(balance.max(0) as u32)
    }

    async fn usage_logs(&self, user_id: Uuid) -> PortResult<Vec<UsageLog>> {
        let records = sqlx::query_as::<_, UsageLogRecord>(
            "SELECT id, user_id, product_code, amount, created_at FROM usage_logs \
             WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_plan(&self, name: &str, attempts: u32, price_sar: f64) -> PortResult<Plan> {
        let record = sqlx::query_as::<_, PlanRecord>(
            "INSERT INTO plans (id, name, attempts, price_sar) VALUES ($1, $2, $3, $4) \
             RETURNING id, name, attempts, price_sar",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(attempts as i32)
        .bind(price_sar)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_plans(&self) -> PortResult<Vec<Plan>> {
        let records = sqlx::query_as::<_, PlanRecord>(
            "SELECT id, name, attempts, price_sar FROM plans ORDER BY price_sar ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_plan(&self, plan_id: Uuid) -> PortResult<Plan> {
        let record = sqlx::query_as::<_, PlanRecord>(
            "SELECT id, name, attempts, price_sar FROM plans WHERE id = $1",
        )
        .bind(plan_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("Plan {}", plan_id)))?;
        Ok(record.to_domain())
    }

    async fn guest_trial_used(&self, token: &str, product_code: &str) -> PortResult<bool> {
        let (used,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM guest_trials WHERE guest_token = $1 AND product_code = $2)",
        )
        .bind(token)
        .bind(product_code)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(used)
    }

    // --- Wizard Sessions ---

    async fn start_session(
        &self,
        new_session: NewSession,
        questions: Vec<String>,
        charge: Charge,
    ) -> PortResult<Option<Session>> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        if !charge_in(&mut tx, &charge).await.map_err(unexpected)? {
            tx.rollback().await.map_err(unexpected)?;
            return Ok(None);
        }

        let (user_id, guest_token) = match &new_session.owner {
            Owner::User(id) => (Some(*id), None),
            Owner::Guest(token) => (None, Some(token.clone())),
        };
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "INSERT INTO wizard_sessions (id, user_id, guest_token, kind, topic) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(guest_token)
        .bind(new_session.kind.as_str())
        .bind(&new_session.topic)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        insert_questions(&mut tx, record.id, 1, Phase::General, questions)
            .await
            .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;

        record.to_domain().map(Some)
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<Session> {
        sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM wizard_sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("Session {}", session_id)))?
        .to_domain()
    }

    async fn list_sessions_for_user(&self, user_id: Uuid) -> PortResult<Vec<Session>> {
        sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM wizard_sessions WHERE user_id = $1 ORDER BY created_at DESC",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(SessionRecord::to_domain)
        .collect()
    }

    async fn get_questions(&self, session_id: Uuid) -> PortResult<Vec<Question>> {
        let records = sqlx::query_as::<_, QuestionRecord>(
            "SELECT id, session_id, position, text, phase FROM wizard_questions \
             WHERE session_id = $1 ORDER BY position ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_answers(&self, session_id: Uuid) -> PortResult<Vec<Answer>> {
        let records = sqlx::query_as::<_, AnswerRecord>(&format!(
            "SELECT {} FROM wizard_answers WHERE session_id = $1 ORDER BY created_at ASC",
            ANSWER_COLUMNS
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn upsert_answer(
        &self,
        session_id: Uuid,
        question_id: Uuid,
        content: &str,
    ) -> PortResult<Answer> {
        let record = sqlx::query_as::<_, AnswerRecord>(&format!(
            "INSERT INTO wizard_answers (id, session_id, question_id, content) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (session_id, question_id) DO UPDATE SET content = EXCLUDED.content \
             RETURNING {}",
            ANSWER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(question_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn append_specialized_questions(
        &self,
        session_id: Uuid,
        existing_count: u32,
        suggested_path: &str,
        questions: Vec<String>,
    ) -> PortResult<bool> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Row lock serializes concurrent expansions of the same session.
        sqlx::query("SELECT id FROM wizard_sessions WHERE id = $1 FOR UPDATE")
            .bind(session_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(not_found_or_unexpected(format!("Session {}", session_id)))?;

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM wizard_questions WHERE session_id = $1")
                .bind(session_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(unexpected)?;
        if count != existing_count as i64 {
            tx.rollback().await.map_err(unexpected)?;
            return Ok(false);
        }

        sqlx::query("UPDATE wizard_sessions SET suggested_path = $2 WHERE id = $1")
            .bind(session_id)
            .bind(suggested_path)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        insert_questions(&mut tx, session_id, existing_count + 1, Phase::Specialized, questions)
            .await
            .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;
        Ok(true)
    }

    async fn finalize_session(
        &self,
        session_id: Uuid,
        feedback: Vec<QuestionFeedback>,
        summary: SessionSummary,
    ) -> PortResult<bool> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let flipped = sqlx::query(
            "UPDATE wizard_sessions SET status = 'FINISHED', strengths = $2, weaknesses = $3, \
             recommendation = $4, overall_score = $5 WHERE id = $1 AND status = 'RUNNING'",
        )
        .bind(session_id)
        .bind(&summary.strengths)
        .bind(&summary.weaknesses)
        .bind(&summary.recommendation)
        .bind(summary.overall_score)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?
        .rows_affected();
        if flipped == 0 {
            tx.rollback().await.map_err(unexpected)?;
            return Ok(false);
        }

        for item in feedback {
            sqlx::query(
                "INSERT INTO wizard_answers (id, session_id, question_id, content, strengths, weaknesses, score) \
                 VALUES ($1, $2, $3, '', $4, $5, $6) \
                 ON CONFLICT (session_id, question_id) DO UPDATE \
                 SET strengths = EXCLUDED.strengths, weaknesses = EXCLUDED.weaknesses, score = EXCLUDED.score",
            )
            .bind(Uuid::new_v4())
            .bind(session_id)
            .bind(item.question_id)
            .bind(&item.feedback.strengths)
            .bind(&item.feedback.weaknesses)
            .bind(item.feedback.score.map(i16::from))
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(true)
    }

    // --- Consultations ---

    async fn create_consultation(
        &self,
        new_consultation: NewConsultation,
        attachments: Vec<String>,
    ) -> PortResult<Consultation> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let record = sqlx::query_as::<_, ConsultationRecord>(&format!(
            "INSERT INTO consultations (id, student_id, expert_id, kind, title, description, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            CONSULTATION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new_consultation.student_id)
        .bind(new_consultation.expert_id)
        .bind(new_consultation.kind.as_str())
        .bind(&new_consultation.title)
        .bind(&new_consultation.description)
        .bind(ConsultationStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        for file_ref in attachments {
            sqlx::query(
                "INSERT INTO attachments (id, consultation_id, uploaded_by, file_ref) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(record.id)
            .bind(record.student_id)
            .bind(file_ref)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_consultation(&self, consultation_id: Uuid) -> PortResult<Consultation> {
        sqlx::query_as::<_, ConsultationRecord>(&format!(
            "SELECT {} FROM consultations WHERE id = $1",
            CONSULTATION_COLUMNS
        ))
        .bind(consultation_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("Consultation {}", consultation_id)))?
        .to_domain()
    }

    async fn list_consultations_for_student(
        &self,
        student_id: Uuid,
    ) -> PortResult<Vec<Consultation>> {
        sqlx::query_as::<_, ConsultationRecord>(&format!(
            "SELECT {} FROM consultations WHERE student_id = $1 ORDER BY updated_at DESC",
            CONSULTATION_COLUMNS
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(ConsultationRecord::to_domain)
        .collect()
    }

    async fn list_consultations_for_expert(
        &self,
        expert_id: Uuid,
    ) -> PortResult<Vec<Consultation>> {
        sqlx::query_as::<_, ConsultationRecord>(&format!(
            "SELECT {} FROM consultations WHERE expert_id = $1 ORDER BY updated_at DESC",
            CONSULTATION_COLUMNS
        ))
        .bind(expert_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(ConsultationRecord::to_domain)
        .collect()
    }

    async fn transition_consultation(
        &self,
        consultation_id: Uuid,
        from: ConsultationStatus,
        to: ConsultationStatus,
    ) -> PortResult<bool> {
        let updated = sqlx::query(
            "UPDATE consultations SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(consultation_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?
        .rows_affected();
        if updated == 0 {
            // Distinguish a lost race from a missing row.
            self.get_consultation(consultation_id).await?;
            return Ok(false);
        }
        Ok(true)
    }

    async fn add_chat_message(
        &self,
        consultation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> PortResult<ChatMessage> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let record = sqlx::query_as::<_, ChatMessageRecord>(
            "INSERT INTO chat_messages (id, consultation_id, sender_id, content) \
             VALUES ($1, $2, $3, $4) RETURNING id, consultation_id, sender_id, content, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(consultation_id)
        .bind(sender_id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;
        sqlx::query("UPDATE consultations SET updated_at = NOW() WHERE id = $1")
            .bind(consultation_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_chat_messages(&self, consultation_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        let records = sqlx::query_as::<_, ChatMessageRecord>(
            "SELECT id, consultation_id, sender_id, content, created_at FROM chat_messages \
             WHERE consultation_id = $1 ORDER BY created_at ASC",
        )
        .bind(consultation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn add_attachment(
        &self,
        consultation_id: Uuid,
        uploaded_by: Uuid,
        file_ref: &str,
    ) -> PortResult<Attachment> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let record = sqlx::query_as::<_, AttachmentRecord>(
            "INSERT INTO attachments (id, consultation_id, uploaded_by, file_ref) \
             VALUES ($1, $2, $3, $4) RETURNING id, consultation_id, uploaded_by, file_ref, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(consultation_id)
        .bind(uploaded_by)
        .bind(file_ref)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;
        sqlx::query("UPDATE consultations SET updated_at = NOW() WHERE id = $1")
            .bind(consultation_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_attachments(&self, consultation_id: Uuid) -> PortResult<Vec<Attachment>> {
        let records = sqlx::query_as::<_, AttachmentRecord>(
            "SELECT id, consultation_id, uploaded_by, file_ref, created_at FROM attachments \
             WHERE consultation_id = $1 ORDER BY created_at ASC",
        )
        .bind(consultation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn rate_consultation(
        &self,
        consultation_id: Uuid,
        stars: u8,
        comment: &str,
    ) -> PortResult<Rating> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let completed = sqlx::query(
            "UPDATE consultations SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(consultation_id)
        .bind(ConsultationStatus::Completed.as_str())
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?
        .rows_affected();
        if completed == 0 {
            return Err(PortError::NotFound(format!(
                "Consultation {} not found",
                consultation_id
            )));
        }

        let record = sqlx::query_as::<_, RatingRecord>(
            "INSERT INTO consultation_ratings (consultation_id, stars, comment) VALUES ($1, $2, $3) \
             ON CONFLICT (consultation_id) DO UPDATE \
             SET stars = EXCLUDED.stars, comment = EXCLUDED.comment, created_at = NOW() \
             RETURNING consultation_id, stars, comment, created_at",
        )
        .bind(consultation_id)
        .bind(i16::from(stars))
        .bind(comment)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_rating(&self, consultation_id: Uuid) -> PortResult<Option<Rating>> {
        let record = sqlx::query_as::<_, RatingRecord>(
            "SELECT consultation_id, stars, comment, created_at FROM consultation_ratings \
             WHERE consultation_id = $1",
        )
        .bind(consultation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }
}
