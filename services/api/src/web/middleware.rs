//! services/api/src/web/middleware.rs
//!
//! Identity middleware: authenticated users for protected routes, and
//! user-or-guest owners for the wizard routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use moazer_core::domain::Owner;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

pub const SESSION_COOKIE: &str = "session";
pub const GUEST_COOKIE: &str = "guest";

/// One year; the guest token must outlive any single wizard.
const GUEST_COOKIE_MAX_AGE: i64 = 60 * 60 * 24 * 365;

/// Reads one cookie value out of the `Cookie` header.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            let (key, value) = c.trim().split_once('=')?;
            (key == name && !value.is_empty()).then_some(value)
        })
}

/// Guest tokens are issued as `Uuid::simple`, so anything else was not issued here.
pub fn is_issued_guest_token(token: &str) -> bool {
    token.len() == 32 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Parse session ID from cookie
    let auth_session_id = cookie_value(req.headers(), SESSION_COOKIE)
        .ok_or_else(|| ApiError::Unauthorized("login required".to_string()))?
        .to_string();

    // 2. Validate auth session in database, get user_id
    let user_id = state
        .db
        .validate_auth_session(&auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to validate auth session: {:?}", e);
            ApiError::Unauthorized("session expired".to_string())
        })?;

    // 3. Insert user_id into request extensions and continue
    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}

/// Middleware that resolves who owns wizard sessions for this request.
///
/// A logged-in user wins. Otherwise the `guest` cookie is used, and a fresh guest
/// token is issued (and set on the response) when there is none or it is malformed.
pub async fn resolve_owner(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let mut issued: Option<String> = None;

    let user_id = match cookie_value(req.headers(), SESSION_COOKIE).map(str::to_string) {
        Some(id) => state.db.validate_auth_session(&id).await.ok(),
        None => None,
    };

    let owner = match user_id {
        Some(user_id) => {
            req.extensions_mut().insert(user_id);
            Owner::User(user_id)
        }
        None => match cookie_value(req.headers(), GUEST_COOKIE).filter(|t| is_issued_guest_token(t)) {
            Some(token) => Owner::Guest(token.to_ascii_lowercase()),
            None => {
                let token = Uuid::new_v4().simple().to_string();
                info!("Issued a new guest token");
                issued = Some(token.clone());
                Owner::Guest(token)
            }
        },
    };
    req.extensions_mut().insert(owner);

    let mut response = next.run(req).await;
    if let Some(token) = issued {
        let cookie = format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            GUEST_COOKIE, token, GUEST_COOKIE_MAX_AGE
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => error!("Failed to build guest cookie: {}", e),
        }
    }
    response
}
