// tests/wallet_test.rs: Integration test: the attempts ledger over the in-memory store

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;

use moazer_core::domain::{Role, PRODUCT_AI_INTERVIEW};
use moazer_core::{DatabaseService, InMemoryDatabase, MoazerError, WalletService};

#[tokio::test]
async fn new_wallet_starts_empty_and_grants_accumulate() {
    let db = Arc::new(InMemoryDatabase::new());
    let wallet = WalletService::new(db.clone());
    let user = common::user(&db, "sara@example.com", Role::Student).await;

    assert_eq!(wallet.get_remaining(user.user_id).await.unwrap(), 0);
    assert_eq!(wallet.grant(user.user_id, 3).await.unwrap(), 3);
    assert_eq!(wallet.grant(user.user_id, 10).await.unwrap(), 13);
}

#[tokio::test]
async fn consume_decrements_and_logs_usage() {
    let db = Arc::new(InMemoryDatabase::new());
    let wallet = WalletService::new(db.clone());
    let user = common::user(&db, "sara@example.com", Role::Student).await;
    wallet.grant(user.user_id, 2).await.unwrap();

    assert!(wallet.consume(user.user_id, 1, PRODUCT_AI_INTERVIEW).await.unwrap());
    assert_eq!(wallet.get_remaining(user.user_id).await.unwrap(), 1);

    let logs = db.usage_logs(user.user_id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].product_code, PRODUCT_AI_INTERVIEW);
    assert_eq!(logs[0].amount, 1);
}

#[tokio::test]
async fn short_balance_is_refused_without_side_effects() {
    let db = Arc::new(InMemoryDatabase::new());
    let wallet = WalletService::new(db.clone());
    let user = common::user(&db, "sara@example.com", Role::Student).await;
    wallet.grant(user.user_id, 1).await.unwrap();

    assert!(!wallet.consume(user.user_id, 2, PRODUCT_AI_INTERVIEW).await.unwrap());
    assert_eq!(wallet.get_remaining(user.user_id).await.unwrap(), 1);
    assert!(db.usage_logs(user.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn zero_amount_is_a_validation_error() {
    let db = Arc::new(InMemoryDatabase::new());
    let wallet = WalletService::new(db.clone());
    let user = common::user(&db, "sara@example.com", Role::Student).await;

    let err = wallet.consume(user.user_id, 0, PRODUCT_AI_INTERVIEW).await.unwrap_err();
    assert!(matches!(err, MoazerError::Validation(_)));
}

#[tokio::test]
async fn concurrent_consumes_never_overdraw() {
    let db = Arc::new(InMemoryDatabase::new());
    let wallet = WalletService::new(db.clone());
    let user = common::user(&db, "sara@example.com", Role::Student).await;
    wallet.grant(user.user_id, 5).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let wallet = wallet.clone();
        let user_id = user.user_id;
        handles.push(tokio::spawn(async move {
            wallet.consume(user_id, 1, PRODUCT_AI_INTERVIEW).await.unwrap()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 5);
    assert_eq!(wallet.get_remaining(user.user_id).await.unwrap(), 0);
    assert_eq!(db.usage_logs(user.user_id).await.unwrap().len(), 5);
}

#[tokio::test]
async fn subscribing_grants_the_plan_attempts() {
    let db = Arc::new(InMemoryDatabase::new());
    let wallet = WalletService::new(db.clone());
    let user = common::user(&db, "sara@example.com", Role::Student).await;
    let premium = db.create_plan("Premium", 10, 99.0).await.unwrap();
    db.create_plan("Basic", 3, 29.0).await.unwrap();

    let plans = wallet.list_plans().await.unwrap();
    assert_eq!(plans[0].name, "Basic");
    assert_eq!(plans[1].name, "Premium");

    let (plan, balance) = wallet.subscribe(user.user_id, premium.id).await.unwrap();
    assert_eq!(plan.attempts, 10);
    assert_eq!(balance, 10);
}

#[tokio::test]
async fn unknown_plan_is_not_found() {
    let db = Arc::new(InMemoryDatabase::new());
    let wallet = WalletService::new(db.clone());
    let user = common::user(&db, "sara@example.com", Role::Student).await;

    let err = wallet.subscribe(user.user_id, uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, MoazerError::NotFound(_)));
}
