// tests/common/mod.rs: Shared fixtures: in-memory store plus a scripted oracle

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use moazer_core::domain::Role;
use moazer_core::ports::{
    ItemFeedback, PathContext, PortError, PortResult, QaItem, QuestionBrief, SessionAnalysis,
};
use moazer_core::{DatabaseService, InMemoryDatabase, Oracle, SessionWizard, User};

/// An oracle that answers deterministically and counts its calls. Each operation can
/// be switched to fail on its own.
pub struct ScriptedOracle {
    pub label: String,
    pub fail_generate: AtomicBool,
    pub fail_classify: AtomicBool,
    pub fail_analyze: AtomicBool,
    pub generate_calls: AtomicUsize,
    pub classify_calls: AtomicUsize,
    pub analyze_calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            fail_generate: AtomicBool::new(false),
            fail_classify: AtomicBool::new(false),
            fail_analyze: AtomicBool::new(false),
            generate_calls: AtomicUsize::new(0),
            classify_calls: AtomicUsize::new(0),
            analyze_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_generate.store(failing, Ordering::SeqCst);
        self.fail_classify.store(failing, Ordering::SeqCst);
        self.fail_analyze.store(failing, Ordering::SeqCst);
    }

    pub fn set_generate_failing(&self, failing: bool) {
        self.fail_generate.store(failing, Ordering::SeqCst);
    }

    pub fn set_classify_failing(&self, failing: bool) {
        self.fail_classify.store(failing, Ordering::SeqCst);
    }

    pub fn set_analyze_failing(&self, failing: bool) {
        self.fail_analyze.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> (usize, usize, usize) {
        (
            self.generate_calls.load(Ordering::SeqCst),
            self.classify_calls.load(Ordering::SeqCst),
            self.analyze_calls.load(Ordering::SeqCst),
        )
    }

    fn check(switch: &AtomicBool) -> PortResult<()> {
        if switch.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("oracle offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn generate_questions(&self, brief: &QuestionBrief, count: usize) -> PortResult<Vec<String>> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_generate)?;
        let prefix = match brief {
            QuestionBrief::Interview { job_title } => format!("[{}]", job_title),
            QuestionBrief::PathDiscovery { .. } => "[discovery]".to_string(),
            QuestionBrief::PathSpecialization { path } => format!("[{}]", path),
        };
        Ok((1..=count).map(|i| format!("{} question {}", prefix, i)).collect())
    }

    async fn classify(&self, _context: &PathContext, _answers: &str) -> PortResult<String> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_classify)?;
        Ok(self.label.clone())
    }

    async fn analyze_session(&self, _topic: &str, items: &[QaItem]) -> PortResult<SessionAnalysis> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_analyze)?;
        Ok(SessionAnalysis {
            items: items
                .iter()
                .map(|i| ItemFeedback {
                    order: i.order,
                    strengths: "clear".into(),
                    weaknesses: "brief".into(),
                    score: Some(4),
                })
                .collect(),
            strengths: "Communicates well".into(),
            weaknesses: "Needs more examples".into(),
            recommendation: "Practice STAR answers".into(),
            overall_score: None,
        })
    }
}

pub struct Fixture {
    pub db: Arc<InMemoryDatabase>,
    pub oracle: Arc<ScriptedOracle>,
    pub wizard: SessionWizard,
}

pub fn fixture(label: &str) -> Fixture {
    let db = Arc::new(InMemoryDatabase::new());
    let oracle = Arc::new(ScriptedOracle::new(label));
    let wizard = SessionWizard::new(db.clone(), oracle.clone(), Duration::from_secs(5));
    Fixture { db, oracle, wizard }
}

pub async fn user(db: &InMemoryDatabase, email: &str, role: Role) -> User {
    db.create_user(email, "hash", email, role)
        .await
        .expect("user should be created")
}
