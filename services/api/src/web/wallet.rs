//! services/api/src/web/wallet.rs
//!
//! Plan catalog and wallet endpoints.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use moazer_core::domain::Plan;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct PlanResponse {
    pub id: Uuid,
    pub name: String,
    pub attempts: u32,
    pub price_sar: f64,
}

impl From<Plan> for PlanResponse {
    fn from(plan: Plan) -> Self {
        Self {
            id: plan.id,
            name: plan.name,
            attempts: plan.attempts,
            price_sar: plan.price_sar,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct WalletResponse {
    pub remaining_attempts: u32,
}

#[derive(Serialize, ToSchema)]
pub struct SubscribeResponse {
    pub plan: PlanResponse,
    pub remaining_attempts: u32,
}

/// GET /plans - The plan catalog, cheapest first
#[utoipa::path(
    get,
    path = "/plans",
    responses((status = 200, description = "Available plans", body = [PlanResponse]))
)]
pub async fn list_plans_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let plans: Vec<PlanResponse> = state
        .wallet
        .list_plans()
        .await?
        .into_iter()
        .map(PlanResponse::from)
        .collect();
    Ok(Json(plans))
}

/// POST /plans/{id}/subscribe - Grant the plan's attempts to the caller
#[utoipa::path(
    post,
    path = "/plans/{id}/subscribe",
    params(("id" = Uuid, Path, description = "Plan id")),
    responses(
        (status = 200, description = "Attempts granted", body = SubscribeResponse),
        (status = 401, description = "Login required"),
        (status = 404, description = "Unknown plan")
    )
)]
pub async fn subscribe_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(plan_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (plan, remaining_attempts) = state.wallet.subscribe(user_id, plan_id).await?;
    Ok(Json(SubscribeResponse {
        plan: plan.into(),
        remaining_attempts,
    }))
}

/// GET /wallet - Remaining attempts of the caller
#[utoipa::path(
    get,
    path = "/wallet",
    responses(
        (status = 200, description = "Current balance", body = WalletResponse),
        (status = 401, description = "Login required")
    )
)]
pub async fn wallet_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let remaining_attempts = state.wallet.get_remaining(user_id).await?;
    Ok(Json(WalletResponse { remaining_attempts }))
}
