//! crates/moazer_core/src/wallet.rs
//!
//! The attempts ledger. Every paid AI feature passes through `consume` before it starts.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::Plan;
use crate::error::{MoazerError, MoazerResult};
use crate::ports::DatabaseService;

#[derive(Clone)]
pub struct WalletService {
    db: Arc<dyn DatabaseService>,
}

impl WalletService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    /// Current balance. The wallet row is created on first access.
    pub async fn get_remaining(&self, user_id: Uuid) -> MoazerResult<u32> {
        Ok(self.db.wallet_balance(user_id).await?)
    }

    /// Spends `amount` attempts. An empty wallet is an expected outcome, reported as `false`.
    pub async fn consume(&self, user_id: Uuid, amount: u32, product_code: &str) -> MoazerResult<bool> {
        if amount == 0 {
            return Err(MoazerError::Validation("amount must be positive".to_string()));
        }
        let spent = self.db.consume_attempts(user_id, amount, product_code).await?;
        if spent {
            info!(%user_id, amount, product_code, "Consumed wallet attempts");
        } else {
            warn!(%user_id, amount, product_code, "Wallet balance too low");
        }
        Ok(spent)
    }

    /// Adds attempts with no upper bound. Returns the new balance.
    pub async fn grant(&self, user_id: Uuid, amount: u32) -> MoazerResult<u32> {
        let balance = self.db.grant_attempts(user_id, amount).await?;
        info!(%user_id, amount, balance, "Granted wallet attempts");
        Ok(balance)
    }

    pub async fn list_plans(&self) -> MoazerResult<Vec<Plan>> {
        Ok(self.db.list_plans().await?)
    }

    /// Looks up a plan in the catalog and grants its attempts. No payment is taken.
    pub async fn subscribe(&self, user_id: Uuid, plan_id: Uuid) -> MoazerResult<(Plan, u32)> {
        let plan = self.db.get_plan(plan_id).await?;
        let balance = self.grant(user_id, plan.attempts).await?;
        Ok((plan, balance))
    }
}
