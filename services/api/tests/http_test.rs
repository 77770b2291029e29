// tests/http_test.rs: In-process HTTP tests: axum router over the in-memory store and a fake oracle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use api_lib::build_router;
use api_lib::config::Config;
use api_lib::web::AppState;
use moazer_core::ports::{
    DatabaseService, ItemFeedback, Oracle, PathContext, PortError, PortResult, QaItem,
    QuestionBrief, SessionAnalysis,
};
use moazer_core::InMemoryDatabase;

/// A fake oracle with an off switch.
#[derive(Default)]
struct FakeOracle {
    down: AtomicBool,
}

impl FakeOracle {
    fn check(&self) -> PortResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Oracle for FakeOracle {
    async fn generate_questions(&self, _brief: &QuestionBrief, count: usize) -> PortResult<Vec<String>> {
        self.check()?;
        Ok((1..=count).map(|i| format!("Question {}?", i)).collect())
    }

    async fn classify(&self, _context: &PathContext, _answers: &str) -> PortResult<String> {
        self.check()?;
        Ok("Technical".into())
    }

    async fn analyze_session(&self, _topic: &str, items: &[QaItem]) -> PortResult<SessionAnalysis> {
        self.check()?;
        Ok(SessionAnalysis {
            items: items
                .iter()
                .map(|i| ItemFeedback {
                    order: i.order,
                    strengths: "focused".into(),
                    weaknesses: "short".into(),
                    score: Some(3),
                })
                .collect(),
            strengths: "Clear thinking".into(),
            weaknesses: "Few examples".into(),
            recommendation: "Prepare stories".into(),
            overall_score: Some(3.4),
        })
    }
}

struct TestApp {
    router: Router,
    db: Arc<InMemoryDatabase>,
    oracle: Arc<FakeOracle>,
}

async fn test_app() -> TestApp {
    let config = Config::from_lookup(|name| match name {
        "STORAGE_BACKEND" => Some("memory".to_string()),
        "ORACLE_TIMEOUT_SECS" => Some("5".to_string()),
        _ => None,
    })
    .expect("memory config should load");
    let db = Arc::new(InMemoryDatabase::new());
    db.create_plan("Starter", 3, 29.0).await.unwrap();
    let oracle = Arc::new(FakeOracle::default());
    let state = Arc::new(AppState::new(db.clone(), oracle.clone(), Arc::new(config)));
    TestApp {
        router: build_router(state),
        db,
        oracle,
    }
}

/// Sends one request and returns status, the first Set-Cookie pair and the JSON body.
async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Option<String>, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.router.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, set_cookie, json)
}

async fn signup(app: &TestApp, email: &str, role: &str) -> (String, String) {
    let (status, cookie, body) = send(
        app,
        "POST",
        "/auth/signup",
        None,
        Some(json!({"email": email, "password": "secret-pass", "display_name": email, "role": role})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = body["user_id"].as_str().unwrap().to_string();
    (cookie.expect("signup sets the session cookie"), user_id)
}

#[tokio::test]
async fn paid_interview_end_to_end() {
    let app = test_app().await;
    let (cookie, _) = signup(&app, "sara@example.com", "STUDENT").await;

    let (_, _, plans) = send(&app, "GET", "/plans", None, None).await;
    let plan_id = plans[0]["id"].as_str().unwrap().to_string();
    let (status, _, body) = send(
        &app,
        "POST",
        &format!("/plans/{}/subscribe", plan_id),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remaining_attempts"], 3);

    let (status, _, started) = send(
        &app,
        "POST",
        "/interviews",
        Some(&cookie),
        Some(json!({"job_title": "Data Analyst"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(started["total_questions"], 5);
    let session_id = started["session_id"].as_str().unwrap().to_string();

    let (_, _, wallet) = send(&app, "GET", "/wallet", Some(&cookie), None).await;
    assert_eq!(wallet["remaining_attempts"], 2);

    let (status, _, step) = send(
        &app,
        "GET",
        &format!("/sessions/{}/steps/1", session_id),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(step["question"], "Question 1?");

    let mut last = Value::Null;
    for n in 1..=5 {
        let (status, _, body) = send(
            &app,
            "POST",
            &format!("/sessions/{}/steps/{}", session_id, n),
            Some(&cookie),
            Some(json!({"answer": format!("answer {}", n)})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        last = body;
    }
    assert_eq!(last["finished"], true);

    let (status, _, result) = send(
        &app,
        "GET",
        &format!("/sessions/{}/result", session_id),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["session"]["status"], "FINISHED");
    assert_eq!(result["session"]["overall_score"], 3.4);
    assert_eq!(result["entries"].as_array().unwrap().len(), 5);
    assert_eq!(result["entries"][0]["score"], 3);

    let (_, _, sessions) = send(&app, "GET", "/sessions", Some(&cookie), None).await;
    assert_eq!(sessions.as_array().unwrap().len(), 1);
    let (_, _, wallet) = send(&app, "GET", "/wallet", Some(&cookie), None).await;
    assert_eq!(wallet["remaining_attempts"], 2);
}

#[tokio::test]
async fn empty_wallet_points_to_plans() {
    let app = test_app().await;
    let (cookie, _) = signup(&app, "sara@example.com", "STUDENT").await;

    let (status, _, body) = send(
        &app,
        "POST",
        "/interviews",
        Some(&cookie),
        Some(json!({"job_title": "Nurse"})),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["purchase_url"], "/plans");
}

#[tokio::test]
async fn guest_gets_a_cookie_and_a_single_trial() {
    let app = test_app().await;

    let (status, guest_cookie, _) = send(
        &app,
        "POST",
        "/career-paths",
        None,
        Some(json!({"mode": "SCHOOL"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let guest_cookie = guest_cookie.expect("a guest token is issued");
    assert!(guest_cookie.starts_with("guest="));

    let (status, _, body) = send(
        &app,
        "POST",
        "/career-paths",
        Some(&guest_cookie),
        Some(json!({"mode": "SCHOOL"})),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["purchase_url"], "/plans");
}

#[tokio::test]
async fn guest_sessions_are_private() {
    let app = test_app().await;
    let (_, owner_cookie, started) = send(
        &app,
        "POST",
        "/interviews",
        None,
        Some(json!({"job_title": "Pilot"})),
    )
    .await;
    let session_id = started["session_id"].as_str().unwrap().to_string();
    let owner_cookie = owner_cookie.unwrap();

    let (status, _, _) = send(
        &app,
        "GET",
        &format!("/sessions/{}/steps/1", session_id),
        Some(&owner_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(
        &app,
        "GET",
        &format!("/sessions/{}/steps/1", session_id),
        Some("guest=0123456789abcdef0123456789abcdef"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_guest_cookie_is_replaced() {
    let app = test_app().await;

    let (status, issued, started) = send(
        &app,
        "POST",
        "/interviews",
        Some("guest=../../admin"),
        Some(json!({"job_title": "Pilot"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let issued = issued.expect("a fresh guest token replaces the forged one");
    let token = issued.trim_start_matches("guest=");
    assert_eq!(token.len(), 32);
    assert!(token.bytes().all(|b| b.is_ascii_hexdigit()));

    let session_id = started["session_id"].as_str().unwrap().to_string();
    let (status, reissued, _) = send(
        &app,
        "GET",
        &format!("/sessions/{}/steps/1", session_id),
        Some(&issued),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(reissued.is_none());
}

#[tokio::test]
async fn oracle_outage_is_retryable_and_free() {
    let app = test_app().await;
    let (cookie, user_id) = signup(&app, "sara@example.com", "STUDENT").await;
    app.db
        .grant_attempts(user_id.parse().unwrap(), 1)
        .await
        .unwrap();
    app.oracle.down.store(true, Ordering::SeqCst);

    let (status, _, body) = send(
        &app,
        "POST",
        "/interviews",
        Some(&cookie),
        Some(json!({"job_title": "Chef"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["retryable"], true);

    let (_, _, wallet) = send(&app, "GET", "/wallet", Some(&cookie), None).await;
    assert_eq!(wallet["remaining_attempts"], 1);
}

#[tokio::test]
async fn protected_routes_require_login() {
    let app = test_app().await;
    let (status, _, _) = send(&app, "GET", "/wallet", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, _) = send(&app, "GET", "/consultations", Some("session=bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_and_logout_cycle() {
    let app = test_app().await;
    signup(&app, "sara@example.com", "STUDENT").await;

    let (status, _, _) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"email": "sara@example.com", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, cookie, _) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"email": "sara@example.com", "password": "secret-pass"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let cookie = cookie.unwrap();

    let (status, _, _) = send(&app, "POST", "/auth/logout", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, "GET", "/wallet", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_signup_is_rejected() {
    let app = test_app().await;
    signup(&app, "sara@example.com", "STUDENT").await;
    let (status, _, _) = send(
        &app,
        "POST",
        "/auth/signup",
        None,
        Some(json!({"email": "SARA@example.com", "password": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn consultation_reject_then_accept_conflicts() {
    let app = test_app().await;
    let (student, _) = signup(&app, "student@example.com", "STUDENT").await;
    let (expert, expert_id) = signup(&app, "expert@example.com", "EXPERT").await;

    let (_, _, experts) = send(&app, "GET", "/experts", None, None).await;
    assert_eq!(experts[0]["user_id"], expert_id.as_str());

    let (status, _, created) = send(
        &app,
        "POST",
        "/consultations",
        Some(&student),
        Some(json!({
            "expert_id": expert_id,
            "kind": "CAREER_PATH",
            "title": "Which track?",
            "description": "Torn between health and engineering"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "PENDING");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _, _) = send(
        &app,
        "POST",
        &format!("/consultations/{}/actions/accept", id),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = send(
        &app,
        "POST",
        &format!("/consultations/{}/actions/reject", id),
        Some(&expert),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["consultation"]["status"], "CLOSED");

    let (status, _, _) = send(
        &app,
        "POST",
        &format!("/consultations/{}/actions/accept", id),
        Some(&expert),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, _, detail) = send(&app, "GET", &format!("/consultations/{}", id), Some(&student), None).await;
    assert_eq!(detail["consultation"]["status"], "CLOSED");
    assert_eq!(detail["viewer"], "STUDENT");
}

#[tokio::test]
async fn consultation_chat_end_and_rate() {
    let app = test_app().await;
    let (student, _) = signup(&app, "student@example.com", "STUDENT").await;
    let (expert, expert_id) = signup(&app, "expert@example.com", "EXPERT").await;
    let (outsider, _) = signup(&app, "other@example.com", "STUDENT").await;

    let (_, _, created) = send(
        &app,
        "POST",
        "/consultations",
        Some(&student),
        Some(json!({"expert_id": expert_id, "kind": "CV_REVIEW", "title": "My CV"})),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    send(&app, "POST", &format!("/consultations/{}/actions/accept", id), Some(&expert), None).await;
    let (status, _, _) = send(
        &app,
        "POST",
        &format!("/consultations/{}/messages", id),
        Some(&expert),
        Some(json!({"content": "Please share the PDF"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _, _) = send(
        &app,
        "POST",
        &format!("/consultations/{}/attachments", id),
        Some(&student),
        Some(json!({"file_ref": "uploads/cv.pdf"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, _) = send(&app, "GET", &format!("/consultations/{}/messages", id), Some(&outsider), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, _, ended) = send(
        &app,
        "POST",
        &format!("/consultations/{}/actions/student_end", id),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(ended["rating_required"], true);
    assert_eq!(ended["consultation"]["status"], "ACTIVE");

    let (status, _, _) = send(
        &app,
        "POST",
        &format!("/consultations/{}/rating", id),
        Some(&student),
        Some(json!({"stars": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &app,
        "POST",
        &format!("/consultations/{}/rating", id),
        Some(&student),
        Some(json!({"stars": 5, "comment": "Great advice"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, _, detail) = send(&app, "GET", &format!("/consultations/{}", id), Some(&expert), None).await;
    assert_eq!(detail["consultation"]["status"], "COMPLETED");
    assert_eq!(detail["messages"].as_array().unwrap().len(), 1);
    assert_eq!(detail["attachments"].as_array().unwrap().len(), 1);
    assert_eq!(detail["rating"]["stars"], 5);
}
