use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::domain::{Account, AccountKey, AccountSettings, Amount, Transaction};

/// Column names written to, and recognised by, the CSV format.
pub const CSV_HEADER: [&str; 5] = ["Type", "Amount", "Author", "Category", "Timestamp"];

/// Snapshot of one account for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub account: AccountKey,
    pub balance: Amount,
    pub settings: AccountSettings,
    pub transactions: Vec<Transaction>,
}

impl AccountSnapshot {
    pub fn of(account: &Account) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            account: account.key.clone(),
            balance: account.balance,
            settings: account.settings.clone(),
            transactions: account.ledger.entries().to_vec(),
        }
    }
}

/// Write transactions as CSV in ledger order. Returns the number of rows.
///
/// Amounts keep their full precision so that re-importing the file yields the
/// same balance.
pub fn export_csv<W: Write>(transactions: &[Transaction], writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(CSV_HEADER)?;

    for transaction in transactions {
        let amount = transaction.amount.to_string();
        let timestamp = transaction.timestamp.to_rfc3339();
        csv_writer.write_record([
            transaction.kind.as_str(),
            amount.as_str(),
            transaction.author.as_str(),
            transaction.category.as_str(),
            timestamp.as_str(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(transactions.len())
}

/// Write a pretty-printed JSON snapshot of an account.
pub fn export_json<W: Write>(account: &Account, mut writer: W) -> Result<AccountSnapshot> {
    let snapshot = AccountSnapshot::of(account);

    let json = serde_json::to_string_pretty(&snapshot)?;
    writer.write_all(json.as_bytes())?;
    writer.flush()?;

    Ok(snapshot)
}
