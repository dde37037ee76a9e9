// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tally::application::LedgerService;
use tempfile::TempDir;

pub const ALICE: &str = "chat-alice";
pub const TEAM: &str = "chat-team";

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = LedgerService::init(&db_path(&temp_dir)).await?;
    Ok((service, temp_dir))
}

/// Open a second service on the database of an earlier `test_service`
pub async fn reopen(temp_dir: &TempDir) -> Result<LedgerService> {
    Ok(LedgerService::connect(&db_path(temp_dir)).await?)
}

pub fn db_path(temp_dir: &TempDir) -> String {
    temp_dir.path().join("test.db").to_str().unwrap().to_string()
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Assert that the cached balance equals a full recomputation
pub async fn assert_consistent(service: &mut LedgerService, key: &str) -> Result<Decimal> {
    let report = service.verify(key).await?;
    assert!(report.is_consistent(), "inconsistent account: {:?}", report);
    Ok(report.recomputed)
}
