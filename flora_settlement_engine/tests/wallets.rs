//! Wallet accessor tests: lazy creation, atomic balance arithmetic, overdraft rejection and
//! ledger/balance consistency.

use flora_settlement_engine::{
    db_types::WalletEntryType,
    traits::WalletApiError,
    WalletApi,
};
use fpg_common::Vnd;

mod support;

use support::new_test_db;

#[tokio::test]
async fn wallets_are_created_lazily_and_accumulate() {
    let db = new_test_db().await;
    let api = WalletApi::new(db.clone());

    assert!(api.wallet("tulip-farm").await.expect("fetch").is_none());

    let wallet = api.credit("tulip-farm", Vnd::from(100_000), "First sale", None).await.expect("credit");
    assert_eq!(wallet.balance, Vnd::from(100_000));

    let wallet = api.credit("tulip-farm", Vnd::from(50_000), "Second sale", None).await.expect("credit");
    assert_eq!(wallet.balance, Vnd::from(150_000));
    assert_eq!(wallet.total_earned, Vnd::from(150_000));
}

#[tokio::test]
async fn debits_reduce_the_balance_and_append_to_the_ledger() {
    let db = new_test_db().await;
    let api = WalletApi::new(db.clone());
    api.credit("tulip-farm", Vnd::from(200_000), "Sale", None).await.expect("credit");

    let wallet = api.debit("tulip-farm", Vnd::from(80_000), "Payout to bank", None).await.expect("debit");
    assert_eq!(wallet.balance, Vnd::from(120_000));
    // total_earned tracks lifetime credits only.
    assert_eq!(wallet.total_earned, Vnd::from(200_000));

    let entries = api.entries("tulip-farm").await.expect("entries");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].entry_type, WalletEntryType::Credit);
    assert_eq!(entries[1].entry_type, WalletEntryType::Debit);
    assert_eq!(entries[1].amount, Vnd::from(80_000));
}

#[tokio::test]
async fn overdrafts_are_rejected_not_clamped() {
    let db = new_test_db().await;
    let api = WalletApi::new(db.clone());
    api.credit("tulip-farm", Vnd::from(50_000), "Sale", None).await.expect("credit");

    let err = api.debit("tulip-farm", Vnd::from(50_001), "Payout", None).await.expect_err("overdraft");
    match err {
        WalletApiError::InsufficientBalance { balance, requested, .. } => {
            assert_eq!(balance, Vnd::from(50_000));
            assert_eq!(requested, Vnd::from(50_001));
        },
        other => panic!("expected InsufficientBalance, got {other}"),
    }

    // Balance and ledger are untouched.
    let wallet = api.wallet("tulip-farm").await.expect("fetch").expect("wallet");
    assert_eq!(wallet.balance, Vnd::from(50_000));
    assert_eq!(api.entries("tulip-farm").await.expect("entries").len(), 1);
}

#[tokio::test]
async fn debiting_a_missing_wallet_fails_cleanly() {
    let db = new_test_db().await;
    let api = WalletApi::new(db);
    let err = api.debit("nobody", Vnd::from(1), "Payout", None).await.expect_err("no wallet");
    assert!(matches!(err, WalletApiError::WalletNotFound(_)));
}

#[tokio::test]
async fn non_positive_mutations_are_rejected() {
    let db = new_test_db().await;
    let api = WalletApi::new(db);
    assert!(matches!(
        api.credit("tulip-farm", Vnd::from(0), "zero", None).await,
        Err(WalletApiError::NonPositiveAmount(_))
    ));
    assert!(matches!(
        api.credit("tulip-farm", Vnd::from(-5), "negative", None).await,
        Err(WalletApiError::NonPositiveAmount(_))
    ));
}

#[tokio::test]
async fn cached_balance_always_matches_ledger_replay() {
    let db = new_test_db().await;
    let api = WalletApi::new(db.clone());
    api.credit("tulip-farm", Vnd::from(300_000), "Sale 1", None).await.expect("credit");
    api.credit("tulip-farm", Vnd::from(120_000), "Sale 2", None).await.expect("credit");
    api.debit("tulip-farm", Vnd::from(250_000), "Payout", None).await.expect("debit");

    let audit = api.audit("tulip-farm").await.expect("audit");
    assert!(audit.is_consistent());
    assert_eq!(audit.cached, Vnd::from(170_000));
    assert_eq!(audit.replayed, Vnd::from(170_000));

    // A write that bypasses the accessor is exactly what the audit exists to catch.
    sqlx::query("UPDATE farmer_wallets SET balance = balance + 999 WHERE farmer_id = 'tulip-farm'")
        .execute(db.pool())
        .await
        .expect("rogue update");
    let audit = api.audit("tulip-farm").await.expect("audit");
    assert!(!audit.is_consistent());
}
