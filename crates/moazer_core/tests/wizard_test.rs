// tests/wizard_test.rs: Integration test: interview and career-path wizards with a scripted oracle

mod common;

use pretty_assertions::assert_eq;

use moazer_core::domain::{PathMode, Phase, Role, SessionStatus, PRODUCT_AI_INTERVIEW};
use moazer_core::wizard::StepOutcome;
use moazer_core::{DatabaseService, MoazerError, Owner, SessionKind};

#[tokio::test]
async fn interview_charges_once_and_finishes_after_five_answers() {
    let fx = common::fixture("Technical");
    let user = common::user(&fx.db, "sara@example.com", Role::Student).await;
    fx.db.grant_attempts(user.user_id, 3).await.unwrap();
    let owner = Owner::User(user.user_id);

    let session = fx
        .wizard
        .start(owner.clone(), SessionKind::Interview, "Backend Engineer")
        .await
        .unwrap();
    assert_eq!(fx.db.wallet_balance(user.user_id).await.unwrap(), 2);
    assert_eq!(fx.db.get_questions(session.id).await.unwrap().len(), 5);

    for step in 1..=4 {
        let outcome = fx
            .wizard
            .submit_answer(&owner, session.id, step, "an answer")
            .await
            .unwrap();
        assert_eq!(outcome, StepOutcome::Next { step: step + 1 });
    }
    let outcome = fx
        .wizard
        .submit_answer(&owner, session.id, 5, "last answer")
        .await
        .unwrap();
    assert_eq!(outcome, StepOutcome::Finished);

    let report = fx.wizard.result(&owner, session.id).await.unwrap();
    assert_eq!(report.session.status, SessionStatus::Finished);
    assert_eq!(report.entries.len(), 5);
    assert!(report.entries.iter().all(|e| e.answer.is_some()));
    let summary = report.session.summary.expect("summary should be stored");
    assert_eq!(summary.overall_score, Some(4.0));

    assert_eq!(fx.db.wallet_balance(user.user_id).await.unwrap(), 2);
    let logs = fx.db.usage_logs(user.user_id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].product_code, PRODUCT_AI_INTERVIEW);
}

#[tokio::test]
async fn final_submit_is_idempotent() {
    let fx = common::fixture("Technical");
    let user = common::user(&fx.db, "sara@example.com", Role::Student).await;
    fx.db.grant_attempts(user.user_id, 1).await.unwrap();
    let owner = Owner::User(user.user_id);

    let session = fx
        .wizard
        .start(owner.clone(), SessionKind::Interview, "Designer")
        .await
        .unwrap();
    for step in 1..=5 {
        fx.wizard
            .submit_answer(&owner, session.id, step, "answer")
            .await
            .unwrap();
    }
    let again = fx
        .wizard
        .submit_answer(&owner, session.id, 5, "answer")
        .await
        .unwrap();

    assert_eq!(again, StepOutcome::Finished);
    assert_eq!(fx.oracle.calls().2, 1);
}

#[tokio::test]
async fn empty_wallet_blocks_the_start_before_the_oracle() {
    let fx = common::fixture("Technical");
    let user = common::user(&fx.db, "sara@example.com", Role::Student).await;

    let err = fx
        .wizard
        .start(Owner::User(user.user_id), SessionKind::Interview, "Nurse")
        .await
        .unwrap_err();

    assert!(matches!(err, MoazerError::InsufficientAttempts));
    assert_eq!(fx.oracle.calls().0, 0);
}

#[tokio::test]
async fn oracle_failure_creates_nothing_and_charges_nothing() {
    let fx = common::fixture("Technical");
    let user = common::user(&fx.db, "sara@example.com", Role::Student).await;
    fx.db.grant_attempts(user.user_id, 3).await.unwrap();
    fx.oracle.set_failing(true);

    let err = fx
        .wizard
        .start(Owner::User(user.user_id), SessionKind::Interview, "Nurse")
        .await
        .unwrap_err();

    assert!(matches!(err, MoazerError::Oracle(_)));
    assert_eq!(fx.db.wallet_balance(user.user_id).await.unwrap(), 3);
    assert!(fx.db.list_sessions_for_user(user.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_job_title_is_rejected() {
    let fx = common::fixture("Technical");
    let err = fx
        .wizard
        .start(Owner::Guest("g1".into()), SessionKind::Interview, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, MoazerError::Validation(_)));
}

#[tokio::test]
async fn guest_school_path_expands_into_a_specialized_phase() {
    let fx = common::fixture("health");
    let owner = Owner::Guest("guest-token".into());

    let session = fx
        .wizard
        .start(owner.clone(), SessionKind::CareerPath(PathMode::School), "")
        .await
        .unwrap();
    assert_eq!(fx.db.get_questions(session.id).await.unwrap().len(), 10);

    for step in 1..=9 {
        fx.wizard
            .submit_answer(&owner, session.id, step, "I like helping people")
            .await
            .unwrap();
    }
    let outcome = fx
        .wizard
        .submit_answer(&owner, session.id, 10, "Biology")
        .await
        .unwrap();
    assert_eq!(outcome, StepOutcome::Next { step: 11 });

    let questions = fx.db.get_questions(session.id).await.unwrap();
    assert_eq!(questions.len(), 20);
    assert_eq!(questions[10].phase, Phase::Specialized);
    assert_eq!(questions[10].order, 11);
    assert!(questions[10].text.starts_with("[Health]"));

    let view = fx.wizard.step(&owner, session.id, 11).await.unwrap();
    assert_eq!(view.session.suggested_path.as_deref(), Some("Health"));
    assert_eq!(view.total, 20);

    for step in 11..=19 {
        fx.wizard
            .submit_answer(&owner, session.id, step, "yes")
            .await
            .unwrap();
    }
    let outcome = fx
        .wizard
        .submit_answer(&owner, session.id, 20, "done")
        .await
        .unwrap();
    assert_eq!(outcome, StepOutcome::Finished);

    let report = fx.wizard.result(&owner, session.id).await.unwrap();
    assert_eq!(report.session.status, SessionStatus::Finished);
    assert_eq!(report.entries.len(), 20);
    assert_eq!(fx.oracle.calls(), (2, 1, 1));
}

#[tokio::test]
async fn resubmitting_step_ten_does_not_expand_twice() {
    let fx = common::fixture("Engineering");
    let owner = Owner::Guest("guest-token".into());
    let session = fx
        .wizard
        .start(owner.clone(), SessionKind::CareerPath(PathMode::School), "")
        .await
        .unwrap();
    for step in 1..=10 {
        fx.wizard
            .submit_answer(&owner, session.id, step, "answer")
            .await
            .unwrap();
    }

    let outcome = fx
        .wizard
        .submit_answer(&owner, session.id, 10, "changed my mind")
        .await
        .unwrap();

    assert_eq!(outcome, StepOutcome::Next { step: 11 });
    assert_eq!(fx.db.get_questions(session.id).await.unwrap().len(), 20);
    assert_eq!(fx.oracle.calls().1, 1);
}

#[tokio::test]
async fn failed_classification_keeps_phase_one_intact() {
    let fx = common::fixture("Health");
    let owner = Owner::Guest("guest-token".into());
    let session = fx
        .wizard
        .start(owner.clone(), SessionKind::CareerPath(PathMode::School), "")
        .await
        .unwrap();
    for step in 1..=9 {
        fx.wizard
            .submit_answer(&owner, session.id, step, "answer")
            .await
            .unwrap();
    }

    fx.oracle.set_classify_failing(true);
    let err = fx
        .wizard
        .submit_answer(&owner, session.id, 10, "answer")
        .await
        .unwrap_err();
    assert!(matches!(err, MoazerError::Oracle(_)));
    assert_eq!(fx.db.get_questions(session.id).await.unwrap().len(), 10);
    assert_eq!(fx.oracle.calls(), (1, 1, 0));

    fx.oracle.set_classify_failing(false);
    let outcome = fx
        .wizard
        .submit_answer(&owner, session.id, 10, "answer")
        .await
        .unwrap();
    assert_eq!(outcome, StepOutcome::Next { step: 11 });
}

#[tokio::test]
async fn failed_specialized_generation_appends_nothing() {
    let fx = common::fixture("Business/Administration");
    let owner = Owner::Guest("guest-token".into());
    let session = fx
        .wizard
        .start(owner.clone(), SessionKind::CareerPath(PathMode::School), "")
        .await
        .unwrap();
    for step in 1..=9 {
        fx.wizard
            .submit_answer(&owner, session.id, step, "answer")
            .await
            .unwrap();
    }

    fx.oracle.set_generate_failing(true);
    let err = fx
        .wizard
        .submit_answer(&owner, session.id, 10, "answer")
        .await
        .unwrap_err();
    assert!(matches!(err, MoazerError::Oracle(_)));
    assert_eq!(fx.oracle.calls(), (2, 1, 0));
    assert_eq!(fx.db.get_questions(session.id).await.unwrap().len(), 10);
    let stored = fx.db.get_session(session.id).await.unwrap();
    assert_eq!(stored.suggested_path, None);
    assert_eq!(stored.status, SessionStatus::Running);

    fx.oracle.set_generate_failing(false);
    let outcome = fx
        .wizard
        .submit_answer(&owner, session.id, 10, "answer")
        .await
        .unwrap();
    assert_eq!(outcome, StepOutcome::Next { step: 11 });
    let stored = fx.db.get_session(session.id).await.unwrap();
    assert_eq!(stored.suggested_path.as_deref(), Some("Business/Administration"));
    assert_eq!(fx.db.get_questions(session.id).await.unwrap().len(), 20);
}

#[tokio::test]
async fn failed_final_analysis_keeps_the_session_running() {
    let fx = common::fixture("Technical");
    let user = common::user(&fx.db, "sara@example.com", Role::Student).await;
    fx.db.grant_attempts(user.user_id, 1).await.unwrap();
    let owner = Owner::User(user.user_id);

    let session = fx
        .wizard
        .start(owner.clone(), SessionKind::Interview, "Data Analyst")
        .await
        .unwrap();
    for step in 1..=4 {
        fx.wizard
            .submit_answer(&owner, session.id, step, "answer")
            .await
            .unwrap();
    }

    fx.oracle.set_analyze_failing(true);
    let err = fx
        .wizard
        .submit_answer(&owner, session.id, 5, "last answer")
        .await
        .unwrap_err();
    assert!(matches!(err, MoazerError::Oracle(_)));
    let stored = fx.db.get_session(session.id).await.unwrap();
    assert_eq!(stored.status, SessionStatus::Running);
    assert!(stored.summary.is_none());

    fx.oracle.set_analyze_failing(false);
    let outcome = fx
        .wizard
        .submit_answer(&owner, session.id, 5, "last answer")
        .await
        .unwrap();
    assert_eq!(outcome, StepOutcome::Finished);
    assert_eq!(fx.oracle.calls().2, 2);

    let report = fx.wizard.result(&owner, session.id).await.unwrap();
    assert_eq!(report.session.status, SessionStatus::Finished);
    assert!(report.session.summary.is_some());
    assert_eq!(fx.db.wallet_balance(user.user_id).await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_school_label_is_an_oracle_failure() {
    let fx = common::fixture("Astronaut");
    let owner = Owner::Guest("guest-token".into());
    let session = fx
        .wizard
        .start(owner.clone(), SessionKind::CareerPath(PathMode::School), "")
        .await
        .unwrap();
    for step in 1..=9 {
        fx.wizard
            .submit_answer(&owner, session.id, step, "answer")
            .await
            .unwrap();
    }

    let err = fx
        .wizard
        .submit_answer(&owner, session.id, 10, "answer")
        .await
        .unwrap_err();
    assert!(matches!(err, MoazerError::Oracle(_)));
}

#[tokio::test]
async fn grad_path_requires_a_major_and_keeps_free_labels() {
    let fx = common::fixture("Data Engineering");
    let user = common::user(&fx.db, "omar@example.com", Role::Student).await;
    fx.db.grant_attempts(user.user_id, 1).await.unwrap();
    let owner = Owner::User(user.user_id);

    let err = fx
        .wizard
        .start(owner.clone(), SessionKind::CareerPath(PathMode::Grad), "")
        .await
        .unwrap_err();
    assert!(matches!(err, MoazerError::Validation(_)));

    let session = fx
        .wizard
        .start(owner.clone(), SessionKind::CareerPath(PathMode::Grad), "Computer Science")
        .await
        .unwrap();
    for step in 1..=10 {
        fx.wizard
            .submit_answer(&owner, session.id, step, "answer")
            .await
            .unwrap();
    }
    let view = fx.wizard.step(&owner, session.id, 11).await.unwrap();
    assert_eq!(view.session.suggested_path.as_deref(), Some("Data Engineering"));
}

#[tokio::test]
async fn guest_trial_is_single_use_per_product() {
    let fx = common::fixture("Technical");
    let owner = Owner::Guest("guest-token".into());

    fx.wizard
        .start(owner.clone(), SessionKind::Interview, "Teacher")
        .await
        .unwrap();
    let err = fx
        .wizard
        .start(owner.clone(), SessionKind::Interview, "Teacher")
        .await
        .unwrap_err();
    assert!(matches!(err, MoazerError::GuestTrialUsed));

    fx.wizard
        .start(owner, SessionKind::CareerPath(PathMode::School), "")
        .await
        .unwrap();
}

#[tokio::test]
async fn sessions_are_invisible_to_other_owners() {
    let fx = common::fixture("Technical");
    let owner = Owner::Guest("first".into());
    let stranger = Owner::Guest("second".into());
    let session = fx
        .wizard
        .start(owner.clone(), SessionKind::Interview, "Pilot")
        .await
        .unwrap();

    let err = fx.wizard.step(&stranger, session.id, 1).await.unwrap_err();
    assert!(matches!(err, MoazerError::NotFound(_)));
    let err = fx
        .wizard
        .submit_answer(&stranger, session.id, 1, "hijack")
        .await
        .unwrap_err();
    assert!(matches!(err, MoazerError::NotFound(_)));
    assert!(fx.db.get_answers(session.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn step_view_prefills_the_saved_answer_and_checks_bounds() {
    let fx = common::fixture("Technical");
    let owner = Owner::Guest("guest".into());
    let session = fx
        .wizard
        .start(owner.clone(), SessionKind::Interview, "Chef")
        .await
        .unwrap();
    fx.wizard
        .submit_answer(&owner, session.id, 1, "  knife skills ")
        .await
        .unwrap();

    let view = fx.wizard.step(&owner, session.id, 1).await.unwrap();
    assert_eq!(view.previous_answer.as_deref(), Some("knife skills"));
    assert_eq!(view.planned_total, 5);

    let err = fx.wizard.step(&owner, session.id, 6).await.unwrap_err();
    assert!(matches!(err, MoazerError::Validation(_)));
}
