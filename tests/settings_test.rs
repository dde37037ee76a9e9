mod common;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use common::{reopen, test_service, ALICE};
use rust_decimal_macros::dec;
use tally::application::{AppError, CLEAR_SALARY_DAY};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[tokio::test]
async fn test_settings_default_and_update() -> Result<()> {
    let (mut service, _temp) = test_service().await?;

    let settings = service.settings(ALICE).await?;
    assert_eq!(settings.currency, None);
    assert_eq!(settings.salary_day, None);

    let settings = service
        .update_settings(ALICE, Some(" EUR ".into()), Some(10))
        .await?;
    assert_eq!(settings.currency.as_deref(), Some("EUR"));
    assert_eq!(settings.salary_day, Some(10));

    // Fields left out are kept, an empty currency clears it
    let settings = service.update_settings(ALICE, Some("".into()), None).await?;
    assert_eq!(settings.currency, None);
    assert_eq!(settings.salary_day, Some(10));

    Ok(())
}

#[tokio::test]
async fn test_invalid_salary_day_is_rejected() -> Result<()> {
    let (mut service, _temp) = test_service().await?;
    service.update_settings(ALICE, None, Some(5)).await?;

    for day in [32, 40] {
        let err = service
            .update_settings(ALICE, None, Some(day))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidSalaryDay(d) if d == day));
    }
    assert_eq!(service.settings(ALICE).await?.salary_day, Some(5));

    Ok(())
}

#[tokio::test]
async fn test_period_summary_of_current_month() -> Result<()> {
    let (mut service, _temp) = test_service().await?;
    service.add_income(ALICE, dec!(100), "alice", "salary").await?;
    service.add_expense(ALICE, dec!(30), "alice", "food").await?;

    let today = Utc::now().date_naive();
    let summary = service.period_summary(ALICE, today).await?;

    assert!(summary.start <= today);
    assert_eq!(summary.entries.len(), 2);
    assert_eq!(summary.entries[1].0, 2);
    assert_eq!(summary.totals.income, dec!(100));
    assert_eq!(summary.totals.expense, dec!(30));
    assert_eq!(summary.totals.net(), dec!(70));

    Ok(())
}

#[tokio::test]
async fn test_period_follows_salary_day() -> Result<()> {
    let (mut service, _temp) = test_service().await?;
    let csv = "Type,Amount,Category,Timestamp\n\
               Income,2000,salary,2024-02-25\n\
               Expense,500,rent,2024-03-01\n\
               Expense,50,food,2024-03-20\n\
               Income,2000,salary,2024-03-25\n\
               Expense,10,food,2024-03-26\n";
    service
        .import_csv(ALICE, csv, Default::default())
        .await?;
    service.update_settings(ALICE, None, Some(25)).await?;

    let summary = service.period_summary(ALICE, date("2024-03-24")).await?;
    assert_eq!(summary.start, date("2024-02-25"));
    // Entries dated after `today` are still part of the ledger since the start
    assert_eq!(summary.entries.len(), 5);

    let summary = service.period_summary(ALICE, date("2024-03-30")).await?;
    assert_eq!(summary.start, date("2024-03-25"));
    let positions: Vec<usize> = summary.entries.iter().map(|(p, _)| *p).collect();
    assert_eq!(positions, vec![4, 5]);
    assert_eq!(summary.totals.net(), dec!(1990));

    Ok(())
}

#[tokio::test]
async fn test_salary_day_can_be_cleared() -> Result<()> {
    let (mut service, temp) = test_service().await?;
    service
        .update_settings(ALICE, Some("EUR".into()), Some(25))
        .await?;
    assert_eq!(
        service.period_summary(ALICE, date("2024-03-10")).await?.start,
        date("2024-02-25")
    );

    let settings = service
        .update_settings(ALICE, None, Some(CLEAR_SALARY_DAY))
        .await?;
    assert_eq!(settings.salary_day, None);
    assert_eq!(settings.currency.as_deref(), Some("EUR"));
    assert_eq!(
        service.period_summary(ALICE, date("2024-03-10")).await?.start,
        date("2024-03-01")
    );
    service.close().await;

    let mut service = reopen(&temp).await?;
    assert_eq!(service.settings(ALICE).await?.salary_day, None);

    Ok(())
}
