mod common;

use anyhow::Result;
use common::{assert_consistent, db_path, reopen, test_service, ALICE, TEAM};
use rust_decimal_macros::dec;
use sqlx::SqlitePool;
use tally::application::AppError;

#[tokio::test]
async fn test_state_survives_reopen() -> Result<()> {
    let (mut service, temp) = test_service().await?;
    service.add_income(ALICE, dec!(100), "alice", "salary").await?;
    service.add_expense(ALICE, dec!(40), "alice", "food").await?;
    service.add_expense(ALICE, dec!(15), "alice", "books").await?;
    service.delete(ALICE, 2).await?;
    service.update_settings(ALICE, Some("EUR".into()), Some(25)).await?;
    let before = service.list(ALICE).await?;
    service.close().await;

    let mut service = reopen(&temp).await?;
    assert_eq!(service.list(ALICE).await?, before);
    assert_eq!(service.balance(ALICE).await?, dec!(85));

    let settings = service.settings(ALICE).await?;
    assert_eq!(settings.currency.as_deref(), Some("EUR"));
    assert_eq!(settings.salary_day, Some(25));
    assert_consistent(&mut service, ALICE).await?;

    Ok(())
}

#[tokio::test]
async fn test_reset_is_persisted() -> Result<()> {
    let (mut service, temp) = test_service().await?;
    service.add_income(TEAM, dec!(50), "bob", "refund").await?;
    service.reset(TEAM).await?;
    service.close().await;

    let mut service = reopen(&temp).await?;
    assert!(service.list(TEAM).await?.is_empty());
    assert_eq!(service.balance(TEAM).await?, dec!(0));
    assert_eq!(service.account_keys().await?, vec![TEAM.to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_storage_failure_leaves_state_unchanged() -> Result<()> {
    let (mut service, _temp) = test_service().await?;
    service.add_income(ALICE, dec!(100), "alice", "salary").await?;
    service.add_expense(ALICE, dec!(40), "alice", "food").await?;
    let before = service.list(ALICE).await?;

    service.close().await;

    let err = service
        .add_expense(ALICE, dec!(5), "alice", "coffee")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StorageUnavailable(_)));

    let err = service.edit_amount(ALICE, 1, dec!(1)).await.unwrap_err();
    assert!(matches!(err, AppError::StorageUnavailable(_)));

    let err = service.delete(ALICE, 2).await.unwrap_err();
    assert!(matches!(err, AppError::StorageUnavailable(_)));

    let err = service.reset(ALICE).await.unwrap_err();
    assert!(matches!(err, AppError::StorageUnavailable(_)));

    assert_eq!(service.list(ALICE).await?, before);
    assert_eq!(service.balance(ALICE).await?, dec!(60));

    Ok(())
}

#[tokio::test]
async fn test_storage_failure_on_new_account() -> Result<()> {
    let (mut service, _temp) = test_service().await?;
    service.close().await;

    let err = service
        .add_income(TEAM, dec!(10), "bob", "found")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StorageUnavailable(_)));
    assert!(err.to_string().starts_with("Storage unavailable"));

    Ok(())
}

#[tokio::test]
async fn test_stale_stored_balance_is_repaired_on_load() -> Result<()> {
    let (mut service, temp) = test_service().await?;
    service.add_income(ALICE, dec!(100), "alice", "salary").await?;
    service.add_expense(ALICE, dec!(40), "alice", "food").await?;
    service.close().await;

    // Corrupt the cached balance behind the service's back
    let pool = SqlitePool::connect(&format!("sqlite:{}", db_path(&temp))).await?;
    sqlx::query("UPDATE accounts SET balance = '999' WHERE account_key = ?")
        .bind(ALICE)
        .execute(&pool)
        .await?;
    pool.close().await;

    let mut service = reopen(&temp).await?;
    assert_eq!(service.balance(ALICE).await?, dec!(60));

    let report = service.verify(ALICE).await?;
    assert_eq!(report.cached, dec!(60));
    assert_eq!(report.stored, Some(dec!(999)));
    assert_eq!(report.recomputed, dec!(60));
    assert!(!report.is_consistent());

    // The next save writes the repaired balance back
    service.add_income(ALICE, dec!(1), "alice", "tips").await?;
    let report = service.verify(ALICE).await?;
    assert_eq!(report.stored, Some(dec!(61)));
    assert!(report.is_consistent());

    Ok(())
}

#[tokio::test]
async fn test_connect_requires_existing_database() -> Result<()> {
    let temp = tempfile::TempDir::new()?;
    let missing = temp.path().join("missing.db");

    let result = tally::application::LedgerService::connect(missing.to_str().unwrap()).await;

    assert!(matches!(result, Err(AppError::StorageUnavailable(_))));
    Ok(())
}
