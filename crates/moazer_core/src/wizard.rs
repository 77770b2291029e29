//! crates/moazer_core/src/wizard.rs
//!
//! The linear question/answer wizard shared by the mock interview and the career-path
//! discovery features. A session moves one step per submitted answer, may expand into a
//! second, specialized phase, and finishes with a single oracle analysis.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{
    Answer, AnswerFeedback, Charge, NewSession, Owner, PathMode, Question, QuestionFeedback,
    Session, SessionKind, SessionStatus, SessionSummary, SCHOOL_PATH_LABELS,
};
use crate::error::{MoazerError, MoazerResult};
use crate::ports::{DatabaseService, Oracle, PathContext, PortResult, QaItem, QuestionBrief};

/// Where the caller should go after submitting an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Next { step: u32 },
    Finished,
}

/// Everything needed to show (or re-show) one step of a session.
#[derive(Debug, Clone)]
pub struct StepView {
    pub session: Session,
    pub question: Question,
    pub step: u32,
    /// Questions that currently exist.
    pub total: u32,
    /// Questions the session will have once every phase is generated.
    pub planned_total: u32,
    pub previous_answer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub question: Question,
    pub answer: Option<Answer>,
}

/// Read-only view of a session and its ordered question/answer log.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session: Session,
    pub entries: Vec<ReportEntry>,
}

#[derive(Clone)]
pub struct SessionWizard {
    db: Arc<dyn DatabaseService>,
    oracle: Arc<dyn Oracle>,
    oracle_timeout: Duration,
}

impl SessionWizard {
    pub fn new(db: Arc<dyn DatabaseService>, oracle: Arc<dyn Oracle>, oracle_timeout: Duration) -> Self {
        Self {
            db,
            oracle,
            oracle_timeout,
        }
    }

    /// Starts a session. The owner is charged only after the first question batch exists,
    /// so an oracle failure never costs an attempt.
    pub async fn start(&self, owner: Owner, kind: SessionKind, topic: &str) -> MoazerResult<Session> {
        let topic = topic.trim().to_string();
        let brief = match kind {
            SessionKind::Interview => {
                if topic.is_empty() {
                    return Err(MoazerError::Validation("job title is required".to_string()));
                }
                QuestionBrief::Interview {
                    job_title: topic.clone(),
                }
            }
            SessionKind::CareerPath(PathMode::Grad) => {
                if topic.is_empty() {
                    return Err(MoazerError::Validation("major is required".to_string()));
                }
                QuestionBrief::PathDiscovery {
                    mode: PathMode::Grad,
                    major: topic.clone(),
                }
            }
            SessionKind::CareerPath(PathMode::School) => QuestionBrief::PathDiscovery {
                mode: PathMode::School,
                major: String::new(),
            },
        };

        let product_code = kind.product_code().to_string();
        let charge = match &owner {
            Owner::User(user_id) => {
                if self.db.wallet_balance(*user_id).await? < 1 {
                    return Err(MoazerError::InsufficientAttempts);
                }
                Charge::Wallet {
                    user_id: *user_id,
                    product_code,
                }
            }
            Owner::Guest(token) => {
                if self.db.guest_trial_used(token, &product_code).await? {
                    return Err(MoazerError::GuestTrialUsed);
                }
                Charge::GuestTrial {
                    token: token.clone(),
                    product_code,
                }
            }
        };

        let wanted = kind.first_phase_len();
        let raw = self
            .call_oracle("generate_questions", self.oracle.generate_questions(&brief, wanted))
            .await?;
        let questions = normalize_batch(raw, wanted)?;

        let new_session = NewSession {
            owner: owner.clone(),
            kind,
            topic,
        };
        match self.db.start_session(new_session, questions, charge).await? {
            Some(session) => {
                info!(session_id = %session.id, kind = kind.as_str(), "Wizard session started");
                Ok(session)
            }
            None => {
                warn!(kind = kind.as_str(), "Session start refused at charge time");
                Err(match owner {
                    Owner::User(_) => MoazerError::InsufficientAttempts,
                    Owner::Guest(_) => MoazerError::GuestTrialUsed,
                })
            }
        }
    }

    /// Shows a step without mutating anything, pre-filled with any saved answer.
    pub async fn step(&self, owner: &Owner, session_id: Uuid, step: u32) -> MoazerResult<StepView> {
        let session = self.owned_session(owner, session_id).await?;
        let questions = self.db.get_questions(session.id).await?;
        let total = questions.len() as u32;
        let question = question_at(&questions, step)?.clone();

        let previous_answer = self
            .db
            .get_answers(session.id)
            .await?
            .into_iter()
            .find(|a| a.question_id == question.id)
            .map(|a| a.content);

        let planned_total =
            (session.kind.first_phase_len() + session.kind.second_phase_len().unwrap_or(0)) as u32;

        Ok(StepView {
            session,
            question,
            step,
            total,
            planned_total: planned_total.max(total),
            previous_answer,
        })
    }

    /// Saves the answer for `step` and advances the wizard.
    pub async fn submit_answer(
        &self,
        owner: &Owner,
        session_id: Uuid,
        step: u32,
        text: &str,
    ) -> MoazerResult<StepOutcome> {
        let session = self.owned_session(owner, session_id).await?;
        if session.status == SessionStatus::Finished {
            info!(%session_id, "Answer submitted to a finished session; nothing to do");
            return Ok(StepOutcome::Finished);
        }

        let questions = self.db.get_questions(session.id).await?;
        let total = questions.len() as u32;
        let question = question_at(&questions, step)?;
        self.db
            .upsert_answer(session.id, question.id, text.trim())
            .await?;

        if step < total {
            return Ok(StepOutcome::Next { step: step + 1 });
        }

        let first_len = session.kind.first_phase_len() as u32;
        if let (Some(second_len), Some(context)) =
            (session.kind.second_phase_len(), path_context(&session))
        {
            if step == first_len && total == first_len {
                self.expand(&session, &questions, context, second_len).await?;
                return Ok(StepOutcome::Next { step: step + 1 });
            }
        }

        self.finalize(&session, &questions).await?;
        Ok(StepOutcome::Finished)
    }

    pub async fn result(&self, owner: &Owner, session_id: Uuid) -> MoazerResult<SessionReport> {
        let session = self.owned_session(owner, session_id).await?;
        let questions = self.db.get_questions(session.id).await?;
        let mut answers = self.db.get_answers(session.id).await?;

        let entries = questions
            .into_iter()
            .map(|question| {
                let answer = answers
                    .iter()
                    .position(|a| a.question_id == question.id)
                    .map(|i| answers.swap_remove(i));
                ReportEntry { question, answer }
            })
            .collect();

        Ok(SessionReport { session, entries })
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> MoazerResult<Vec<Session>> {
        Ok(self.db.list_sessions_for_user(user_id).await?)
    }

    //-------------------------------------------------------------------------------------
    // Internals
    //-------------------------------------------------------------------------------------

    /// Fetches a session the caller owns. Foreign sessions look exactly like missing ones.
    async fn owned_session(&self, owner: &Owner, session_id: Uuid) -> MoazerResult<Session> {
        let session = self.db.get_session(session_id).await?;
        if !session.is_owned_by(owner) {
            warn!(%session_id, "Session requested by a non-owner");
            return Err(MoazerError::NotFound(format!("Session {} not found", session_id)));
        }
        Ok(session)
    }

    /// Classifies phase-1 answers and appends the specialized phase. Both oracle calls must
    /// succeed before anything is written.
    async fn expand(
        &self,
        session: &Session,
        questions: &[Question],
        context: PathContext,
        second_len: usize,
    ) -> MoazerResult<()> {
        let answers = self.db.get_answers(session.id).await?;
        let blob = answers_blob(questions, &answers);

        let label = self
            .call_oracle("classify", self.oracle.classify(&context, &blob))
            .await?;
        let path = normalize_label(&context, &label)?;

        let brief = QuestionBrief::PathSpecialization { path: path.clone() };
        let raw = self
            .call_oracle("generate_questions", self.oracle.generate_questions(&brief, second_len))
            .await?;
        let specialized = normalize_batch(raw, second_len)?;

        let appended = self
            .db
            .append_specialized_questions(session.id, questions.len() as u32, &path, specialized)
            .await?;
        if appended {
            info!(session_id = %session.id, path = %path, "Specialized phase appended");
        } else {
            warn!(session_id = %session.id, "Specialized phase already present; skipped append");
        }
        Ok(())
    }

    /// Runs the final analysis and stores it. The status flip happens in the same write as
    /// the feedback, so a failed analysis leaves the session RUNNING.
    async fn finalize(&self, session: &Session, questions: &[Question]) -> MoazerResult<()> {
        let answers = self.db.get_answers(session.id).await?;
        let items: Vec<QaItem> = questions
            .iter()
            .map(|q| QaItem {
                order: q.order,
                question: q.text.clone(),
                answer: answer_text(&answers, q.id).to_string(),
            })
            .collect();

        let topic = analysis_topic(session);
        let analysis = self
            .call_oracle("analyze_session", self.oracle.analyze_session(&topic, &items))
            .await?;

        if analysis.items.is_empty()
            && analysis.strengths.trim().is_empty()
            && analysis.weaknesses.trim().is_empty()
            && analysis.recommendation.trim().is_empty()
        {
            error!(session_id = %session.id, "Oracle returned an empty analysis");
            return Err(MoazerError::Oracle("the analysis came back empty".to_string()));
        }

        let feedback: Vec<QuestionFeedback> = questions
            .iter()
            .map(|q| {
                let item = analysis.items.iter().find(|i| i.order == q.order);
                QuestionFeedback {
                    question_id: q.id,
                    feedback: AnswerFeedback {
                        strengths: item.map(|i| i.strengths.clone()).unwrap_or_default(),
                        weaknesses: item.map(|i| i.weaknesses.clone()).unwrap_or_default(),
                        score: item.and_then(|i| i.score).filter(|s| (1..=5).contains(s)),
                    },
                }
            })
            .collect();

        let scores: Vec<u8> = feedback.iter().filter_map(|f| f.feedback.score).collect();
        let summary = SessionSummary {
            strengths: analysis.strengths,
            weaknesses: analysis.weaknesses,
            recommendation: analysis.recommendation,
            overall_score: overall_score(analysis.overall_score, &scores),
        };

        if self.db.finalize_session(session.id, feedback, summary).await? {
            info!(session_id = %session.id, "Wizard session finished");
        } else {
            warn!(session_id = %session.id, "Session was already finalized");
        }
        Ok(())
    }

    async fn call_oracle<T, F>(&self, operation: &str, call: F) -> MoazerResult<T>
    where
        F: Future<Output = PortResult<T>>,
    {
        match tokio::time::timeout(self.oracle_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(operation, "Oracle call failed: {}", e);
                Err(MoazerError::Oracle(e.to_string()))
            }
            Err(_) => {
                error!(operation, timeout = ?self.oracle_timeout, "Oracle call timed out");
                Err(MoazerError::Oracle(format!(
                    "{} timed out after {:?}",
                    operation, self.oracle_timeout
                )))
            }
        }
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

fn question_at(questions: &[Question], step: u32) -> MoazerResult<&Question> {
    if step == 0 || step as usize > questions.len() {
        return Err(MoazerError::Validation(format!(
            "step must be between 1 and {}",
            questions.len()
        )));
    }
    Ok(&questions[step as usize - 1])
}

fn path_context(session: &Session) -> Option<PathContext> {
    match session.kind {
        SessionKind::Interview => None,
        SessionKind::CareerPath(PathMode::School) => Some(PathContext::School),
        SessionKind::CareerPath(PathMode::Grad) => Some(PathContext::Grad {
            major: session.topic.clone(),
        }),
    }
}

fn analysis_topic(session: &Session) -> String {
    match session.kind {
        SessionKind::Interview => session.topic.clone(),
        SessionKind::CareerPath(_) => session
            .suggested_path
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| session.topic.clone()),
    }
}

fn answer_text(answers: &[Answer], question_id: Uuid) -> &str {
    answers
        .iter()
        .find(|a| a.question_id == question_id)
        .map(|a| a.content.as_str())
        .unwrap_or("")
}

fn answers_blob(questions: &[Question], answers: &[Answer]) -> String {
    questions
        .iter()
        .map(|q| format!("Q{}: {}", q.order, answer_text(answers, q.id)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Trims the batch, drops blanks and keeps exactly `wanted` questions.
fn normalize_batch(raw: Vec<String>, wanted: usize) -> MoazerResult<Vec<String>> {
    let mut questions: Vec<String> = raw
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();
    if questions.len() < wanted {
        return Err(MoazerError::Oracle(format!(
            "expected {} questions, got {}",
            wanted,
            questions.len()
        )));
    }
    questions.truncate(wanted);
    Ok(questions)
}

/// School paths must be one of the fixed labels; graduate sub-paths only need to be non-empty.
fn normalize_label(context: &PathContext, label: &str) -> MoazerResult<String> {
    let label = label.trim();
    if label.is_empty() {
        return Err(MoazerError::Oracle("empty path label".to_string()));
    }
    match context {
        PathContext::Grad { .. } => Ok(label.to_string()),
        PathContext::School => SCHOOL_PATH_LABELS
            .iter()
            .find(|known| known.eq_ignore_ascii_case(label))
            .map(|known| known.to_string())
            .ok_or_else(|| MoazerError::Oracle(format!("unknown path label '{}'", label))),
    }
}

/// The oracle's score when it is usable, otherwise the mean of the per-answer scores.
pub fn overall_score(reported: Option<f64>, scores: &[u8]) -> Option<f64> {
    if let Some(score) = reported.filter(|s| s.is_finite() && (1.0..=5.0).contains(s)) {
        return Some(round_one_decimal(score));
    }
    if scores.is_empty() {
        return None;
    }
    let sum: u32 = scores.iter().map(|s| *s as u32).sum();
    Some(round_one_decimal(sum as f64 / scores.len() as f64))
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reported_score_wins_when_in_range() {
        assert_eq!(overall_score(Some(4.26), &[1, 1]), Some(4.3));
    }

    #[test]
    fn out_of_range_score_falls_back_to_mean() {
        assert_eq!(overall_score(Some(9.0), &[3, 4, 4]), Some(3.7));
        assert_eq!(overall_score(Some(f64::NAN), &[5]), Some(5.0));
    }

    #[test]
    fn no_scores_means_no_overall_score() {
        assert_eq!(overall_score(None, &[]), None);
    }

    #[test]
    fn batch_is_trimmed_and_truncated() {
        let raw = vec![" a ".into(), "".into(), "b".into(), "c".into()];
        assert_eq!(normalize_batch(raw, 2).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn short_batch_is_an_oracle_failure() {
        let raw = vec!["a".into(), "  ".into()];
        assert!(matches!(normalize_batch(raw, 2), Err(MoazerError::Oracle(_))));
    }

    #[test]
    fn school_labels_are_canonicalized() {
        assert_eq!(normalize_label(&PathContext::School, " health ").unwrap(), "Health");
        assert!(normalize_label(&PathContext::School, "Astronaut").is_err());
        let grad = PathContext::Grad {
            major: "Computer Science".into(),
        };
        assert_eq!(normalize_label(&grad, "Cybersecurity").unwrap(), "Cybersecurity");
    }

    #[test]
    fn step_bounds_are_validated() {
        let questions: Vec<Question> = Vec::new();
        assert!(matches!(question_at(&questions, 1), Err(MoazerError::Validation(_))));
    }
}
